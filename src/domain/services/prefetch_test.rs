use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;

use super::PrefetchEngine;
use super::PrefetchProgress;
use super::Resolution;
use crate::domain::models::GameOption;
use crate::domain::models::GameState;
use crate::domain::models::GameStatus;
use crate::domain::models::Message;
use crate::domain::models::TurnResult;
use crate::domain::models::TurnServiceBox;
use crate::infrastructure::backends::scripted::drain_tasks;
use crate::infrastructure::backends::scripted::wait_until;
use crate::infrastructure::backends::scripted::ScriptedTurnService;

fn cell_options() -> Vec<GameOption> {
    return vec![
        GameOption::new("a", "Push the door"),
        GameOption::new("b", "Call out"),
        GameOption::with_status("c", "Check chains", GameStatus::Death),
    ];
}

fn transcript() -> Vec<Message> {
    return vec![
        Message::user("I want to start a dungeon adventure."),
        Message::assistant("You wake in a cell.", None),
    ];
}

fn scripted() -> ScriptedTurnService {
    return ScriptedTurnService::new()
        .reply(
            "Push the door",
            TurnResult::new(
                "The door creaks open.",
                vec![GameOption::new("a", "Step into the corridor")],
            ),
        )
        .reply(
            "Call out",
            TurnResult::new("A guard grunts.", vec![GameOption::new("a", "Bribe the guard")]),
        )
        .reply(
            "Check chains",
            TurnResult::new("The chains bite.", vec![GameOption::new("a", "Bleed")]),
        );
}

fn engine(service: &Arc<ScriptedTurnService>) -> PrefetchEngine {
    let service: TurnServiceBox = service.clone();
    return PrefetchEngine::new(service, true);
}

#[tokio::test]
async fn it_speculates_every_option() {
    let service = Arc::new(scripted());
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    assert_eq!(
        engine.progress(),
        PrefetchProgress {
            pending: 3,
            resolved: 0
        }
    );

    wait_until(|| return engine.progress().resolved == 3).await;

    assert_eq!(service.calls("Push the door"), 1);
    assert_eq!(service.calls("Call out"), 1);
    assert_eq!(service.calls("Check chains"), 1);
    assert!(engine.is_resolved("a"));
    assert!(engine.is_resolved("b"));
    assert!(engine.is_resolved("c"));
}

#[tokio::test]
async fn it_sends_extended_transcript_with_current_state() {
    let service = Arc::new(scripted());
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options()[..1], &transcript(), Some(&state));
    wait_until(|| return engine.is_resolved("a")).await;

    let (sent_transcript, sent_state) = service.last_request("Push the door").unwrap();
    assert_eq!(sent_transcript.len(), 3);
    assert_eq!(sent_transcript[..2], transcript()[..]);
    assert_eq!(sent_transcript[2], Message::user("Push the door"));
    assert_eq!(sent_state, Some(state));
}

#[tokio::test]
async fn it_never_duplicates_work_for_cached_options() {
    let service = Arc::new(scripted().hold("Push the door"));
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    wait_until(|| return engine.progress().resolved == 2).await;

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    drain_tasks().await;

    assert_eq!(service.calls("Push the door"), 1);
    assert_eq!(service.calls("Call out"), 1);
    assert_eq!(service.calls("Check chains"), 1);
    assert_eq!(
        engine.progress(),
        PrefetchProgress {
            pending: 1,
            resolved: 2
        }
    );
}

#[tokio::test]
async fn it_hits_and_clears_the_cache() -> Result<()> {
    let service = Arc::new(scripted());
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    wait_until(|| return engine.progress().resolved == 3).await;

    let prefetched = match engine.resolve(&cell_options()[1]) {
        Resolution::Hit(prefetched) => prefetched,
        _ => bail!("Expected a hit"),
    };

    assert_eq!(prefetched.option_id, "b");
    assert_eq!(prefetched.result.narrated_state, "A guard grunts.");
    assert_eq!(prefetched.game_state.episode_counter, 2);
    assert_eq!(prefetched.game_state.history[1].action, "Call out");
    assert_eq!(engine.progress(), PrefetchProgress::default());
    assert!(!engine.is_resolved("a"));

    return Ok(());
}

#[tokio::test]
async fn it_reduces_terminal_choice() -> Result<()> {
    let service = Arc::new(scripted());
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    wait_until(|| return engine.is_resolved("c")).await;

    let prefetched = match engine.resolve(&cell_options()[2]) {
        Resolution::Hit(prefetched) => prefetched,
        _ => bail!("Expected a hit"),
    };
    assert_eq!(prefetched.game_state.status, GameStatus::Death);

    return Ok(());
}

#[tokio::test]
async fn it_defers_to_in_flight_speculation() -> Result<()> {
    let service = Arc::new(scripted().hold("Push the door"));
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    drain_tasks().await;

    let speculation = match engine.resolve(&cell_options()[0]) {
        Resolution::Deferred(speculation) => speculation,
        _ => bail!("Expected a deferral"),
    };

    service.release("Push the door");
    let prefetched = speculation.await?;

    assert_eq!(prefetched.result.narrated_state, "The door creaks open.");
    assert_eq!(service.calls("Push the door"), 1);

    return Ok(());
}

#[tokio::test]
async fn it_evicts_failed_speculation() {
    let service = Arc::new(scripted().fail("Call out", "connection reset"));
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    wait_until(|| return engine.progress().resolved == 2).await;
    drain_tasks().await;

    assert_eq!(
        engine.progress(),
        PrefetchProgress {
            pending: 0,
            resolved: 2
        }
    );
    assert!(matches!(
        engine.resolve(&cell_options()[1]),
        Resolution::MustFetch
    ));

    // Evicted options can be speculated again.
    engine.begin_prefetch(&cell_options(), &transcript(), Some(&state));
    drain_tasks().await;
    assert_eq!(service.calls("Call out"), 2);
    assert_eq!(service.calls("Push the door"), 1);
}

#[tokio::test]
async fn it_drops_results_arriving_after_invalidation() {
    let service = Arc::new(scripted().hold("Push the door").hold("Call out"));
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options()[..2], &transcript(), Some(&state));
    drain_tasks().await;

    engine.invalidate();
    service.release("Push the door");
    service.release("Call out");
    drain_tasks().await;

    assert_eq!(engine.progress(), PrefetchProgress::default());
    assert_eq!(engine.epoch(), 1);
    assert!(matches!(
        engine.resolve(&cell_options()[0]),
        Resolution::MustFetch
    ));
}

#[tokio::test]
async fn it_ignores_stale_completion_for_reused_id() -> Result<()> {
    let service = Arc::new(
        scripted().hold("Push the door").reply(
            "Climb out the window",
            TurnResult::new("You squeeze through the bars.", vec![]),
        ),
    );
    let engine = engine(&service);
    let state = GameState::opening("You wake in a cell.");

    engine.begin_prefetch(&cell_options()[..1], &transcript(), Some(&state));
    drain_tasks().await;
    engine.invalidate();

    let next_turn = vec![GameOption::new("a", "Climb out the window")];
    engine.begin_prefetch(&next_turn, &transcript(), Some(&state));
    wait_until(|| return engine.is_resolved("a")).await;

    service.release("Push the door");
    drain_tasks().await;

    let prefetched = match engine.resolve(&next_turn[0]) {
        Resolution::Hit(prefetched) => prefetched,
        _ => bail!("Expected a hit"),
    };
    assert_eq!(prefetched.result.narrated_state, "You squeeze through the bars.");

    return Ok(());
}

#[tokio::test]
async fn it_passes_through_when_disabled() {
    let service = Arc::new(scripted());
    let boxed: TurnServiceBox = service.clone();
    let engine = PrefetchEngine::new(boxed, false);

    engine.begin_prefetch(&cell_options(), &transcript(), None);
    drain_tasks().await;

    assert_eq!(service.total_calls(), 0);
    assert!(matches!(
        engine.resolve(&cell_options()[0]),
        Resolution::MustFetch
    ));
}
