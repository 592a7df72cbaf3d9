#[cfg(test)]
#[path = "game_state_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::first_terminal_status;
use super::GameOption;
use super::GameStatus;

pub const OPENING_ACTION: &str = "start";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryEntry {
    pub episode: u32,
    pub description: String,
    pub action: String,
}

/// Persisted snapshot of a playthrough. Only ever replaced wholesale by
/// `reduce`, never edited in place.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameState {
    #[serde(rename = "currentEpisode")]
    pub episode_counter: u32,
    pub history: Vec<HistoryEntry>,
    #[serde(rename = "gameStatus")]
    pub status: GameStatus,
}

impl GameState {
    /// What the backend assumes when a request carries no snapshot.
    pub fn initial() -> GameState {
        return GameState::default();
    }

    /// Snapshot after the opening narration. Option statuses are not looked
    /// at because nothing has been chosen yet.
    pub fn opening(narrated_state: &str) -> GameState {
        return GameState {
            episode_counter: 1,
            history: vec![HistoryEntry {
                episode: 0,
                description: narrated_state.to_string(),
                action: OPENING_ACTION.to_string(),
            }],
            status: GameStatus::Active,
        };
    }

    pub fn is_terminal(&self) -> bool {
        return self.status.is_terminal();
    }
}

/// Computes the snapshot that follows `previous` once `narrated_state` has been
/// produced in answer to `chosen_action`.
///
/// The status turns terminal when any of the freshly produced `options` is
/// terminal; with several terminal options the first one in order wins. A
/// terminal status is never reverted.
pub fn reduce(
    previous: Option<&GameState>,
    chosen_action: &str,
    narrated_state: &str,
    options: &[GameOption],
) -> GameState {
    let previous = match previous {
        Some(previous) => previous,
        None => return GameState::opening(narrated_state),
    };

    let mut history = previous.history.clone();
    history.push(HistoryEntry {
        episode: previous.episode_counter,
        description: narrated_state.to_string(),
        action: chosen_action.to_string(),
    });

    let status = if previous.is_terminal() {
        previous.status
    } else {
        first_terminal_status(options).unwrap_or(GameStatus::Active)
    };

    return GameState {
        episode_counter: previous.episode_counter + 1,
        history,
        status,
    };
}

/// `reduce` for a turn triggered by picking an offered option. A still active
/// result adopts the chosen option's own terminal status.
pub fn reduce_choice(
    previous: Option<&GameState>,
    chosen: &GameOption,
    narrated_state: &str,
    options: &[GameOption],
) -> GameState {
    let mut next = reduce(previous, &chosen.action, narrated_state, options);
    if previous.is_some() && !next.is_terminal() && chosen.resulting_status.is_terminal() {
        next.status = chosen.resulting_status;
    }

    return next;
}
