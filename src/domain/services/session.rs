#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::Mutex;

use super::PrefetchEngine;
use super::PrefetchProgress;
use super::Resolution;
use crate::domain::models::reduce;
use crate::domain::models::reduce_choice;
use crate::domain::models::GameOption;
use crate::domain::models::GameState;
use crate::domain::models::Message;
use crate::domain::models::Phase;
use crate::domain::models::SessionError;
use crate::domain::models::TurnFetchFailed;
use crate::domain::models::TurnResult;
use crate::domain::models::TurnServiceBox;
use crate::domain::models::OPENING_ACTION;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub phase: Phase,
    pub transcript: Vec<Message>,
    pub game_state: Option<GameState>,
    pub current_turn: Option<TurnResult>,
    pub pending_option: Option<String>,
    pub loading: bool,
    /// Bumped on every applied turn and on reset. Network results captured
    /// under an older epoch are dropped.
    pub epoch: u64,
}

impl SessionState {
    pub fn options(&self) -> &[GameOption] {
        match &self.current_turn {
            Some(turn) => return &turn.options,
            None => return &[],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A new turn is on display, the session now sits in the given phase.
    Applied(Phase),
    /// Blank free text. Nothing happened.
    Ignored,
    /// The result arrived after the session moved on and was thrown away.
    Discarded,
}

/// Turn orchestrator. Cloning yields another handle to the same session; all
/// transitions lock briefly and never hold the lock across a network call.
#[derive(Clone)]
pub struct Session {
    service: TurnServiceBox,
    prefetch: PrefetchEngine,
    state: Arc<Mutex<SessionState>>,
    opening_prompt: String,
}

impl Session {
    pub fn new(service: TurnServiceBox, opening_prompt: &str, prefetch: bool) -> Session {
        return Session {
            prefetch: PrefetchEngine::new(service.clone(), prefetch),
            service,
            state: Arc::new(Mutex::new(SessionState::default())),
            opening_prompt: opening_prompt.to_string(),
        };
    }

    pub async fn snapshot(&self) -> SessionState {
        return self.state.lock().await.clone();
    }

    pub fn prefetch_progress(&self) -> PrefetchProgress {
        return self.prefetch.progress();
    }

    pub fn is_option_ready(&self, option_id: &str) -> bool {
        return self.prefetch.is_resolved(option_id);
    }

    pub async fn start(&self) -> Result<TurnOutcome, SessionError> {
        let (transcript, epoch) = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Idle {
                return Err(SessionError::invalid_transition("start", state.phase));
            }

            state.transcript = vec![Message::user(&self.opening_prompt)];
            state.phase = Phase::AwaitingTurn;
            state.loading = true;

            (state.transcript.clone(), state.epoch)
        };

        let res = self.service.advance(&transcript, None).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::warn!(epoch, current = state.epoch, "Dropping opening turn after reset");
            return Ok(TurnOutcome::Discarded);
        }

        match res {
            Ok(reply) => {
                let game_state = reduce(
                    None,
                    OPENING_ACTION,
                    &reply.result.narrated_state,
                    &reply.result.options,
                );
                return Ok(self.apply_turn(&mut state, reply.result, game_state));
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to start session");
                state.transcript.clear();
                state.phase = Phase::Idle;
                state.loading = false;
                return Err(err.into());
            }
        }
    }

    /// Sends player typed text. Free text is never speculated, so the current
    /// speculation round is thrown away before asking.
    pub async fn submit_free_text(&self, text: &str) -> Result<TurnOutcome, SessionError> {
        if text.trim().is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let (transcript, previous, epoch, restore_len) = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::PresentingOptions {
                return Err(SessionError::invalid_transition(
                    "submit free text",
                    state.phase,
                ));
            }

            self.prefetch.invalidate();
            let restore_len = state.transcript.len();
            state.transcript.push(Message::user(text));
            state.phase = Phase::AwaitingTurn;
            state.loading = true;

            (
                state.transcript.clone(),
                state.game_state.clone(),
                state.epoch,
                restore_len,
            )
        };

        let res = self.service.advance(&transcript, previous.as_ref()).await;

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            tracing::warn!(epoch, current = state.epoch, "Dropping free text turn");
            return Ok(TurnOutcome::Discarded);
        }

        match res {
            Ok(reply) => {
                let game_state = reduce(
                    previous.as_ref(),
                    text,
                    &reply.result.narrated_state,
                    &reply.result.options,
                );
                return Ok(self.apply_turn(&mut state, reply.result, game_state));
            }
            Err(err) => {
                tracing::error!(error = %err, "Free text turn failed");
                state.transcript.truncate(restore_len);
                state.phase = Phase::PresentingOptions;
                state.loading = false;

                let options = state.options().to_vec();
                self.prefetch
                    .begin_prefetch(&options, &state.transcript, state.game_state.as_ref());

                return Err(err.into());
            }
        }
    }

    /// Picks one of the offered options. Served from speculation when possible,
    /// otherwise fetched directly. Only one choice may be outstanding.
    pub async fn select_option(&self, option_id: &str) -> Result<TurnOutcome, SessionError> {
        let (option, transcript, previous, epoch, restore_len) = {
            let mut state = self.state.lock().await;
            if state.phase == Phase::AwaitingChoice || state.pending_option.is_some() {
                return Err(SessionError::InvalidSelection(
                    "a choice is already pending".to_string(),
                ));
            }
            if state.phase != Phase::PresentingOptions {
                return Err(SessionError::invalid_transition(
                    "select an option",
                    state.phase,
                ));
            }

            let option = match state
                .current_turn
                .as_ref()
                .and_then(|turn| return turn.option(option_id))
            {
                Some(option) => option.clone(),
                None => {
                    return Err(SessionError::InvalidSelection(format!(
                        "no option {option_id} in the current turn"
                    )));
                }
            };

            let restore_len = state.transcript.len();
            state.transcript.push(Message::user(&option.action));
            state.phase = Phase::AwaitingChoice;
            state.pending_option = Some(option.id.to_string());
            state.loading = true;

            (
                option,
                state.transcript.clone(),
                state.game_state.clone(),
                state.epoch,
                restore_len,
            )
        };

        let res = match self.prefetch.resolve(&option) {
            Resolution::Hit(prefetched) => Ok((prefetched.result, prefetched.game_state)),
            Resolution::Deferred(speculation) => match speculation.await {
                Ok(prefetched) => Ok((prefetched.result, prefetched.game_state)),
                Err(err) => {
                    tracing::warn!(
                        option_id = option.id.as_str(),
                        error = %err,
                        "Speculation failed, fetching directly"
                    );
                    self.fetch_choice(&option, &transcript, previous.as_ref())
                        .await
                }
            },
            Resolution::MustFetch => {
                self.fetch_choice(&option, &transcript, previous.as_ref())
                    .await
            }
        };

        let mut state = self.state.lock().await;
        if state.epoch != epoch || state.pending_option.as_deref() != Some(option.id.as_str()) {
            tracing::warn!(
                option_id = option.id.as_str(),
                epoch,
                current = state.epoch,
                "Dropping superseded choice"
            );
            return Ok(TurnOutcome::Discarded);
        }

        match res {
            Ok((result, game_state)) => {
                return Ok(self.apply_turn(&mut state, result, game_state));
            }
            Err(err) => {
                tracing::error!(option_id = option.id.as_str(), error = %err, "Choice failed");
                state.transcript.truncate(restore_len);
                state.phase = Phase::PresentingOptions;
                state.pending_option = None;
                state.loading = false;
                return Err(err.into());
            }
        }
    }

    /// Drops everything and returns to `Idle`. Valid from any phase.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        self.prefetch.invalidate();

        let epoch = state.epoch + 1;
        *state = SessionState {
            epoch,
            ..SessionState::default()
        };

        tracing::debug!(epoch, "Session reset");
    }

    async fn fetch_choice(
        &self,
        option: &GameOption,
        transcript: &[Message],
        previous: Option<&GameState>,
    ) -> Result<(TurnResult, GameState), TurnFetchFailed> {
        let reply = self.service.advance(transcript, previous).await?;
        let game_state = reduce_choice(
            previous,
            option,
            &reply.result.narrated_state,
            &reply.result.options,
        );

        return Ok((reply.result, game_state));
    }

    fn apply_turn(
        &self,
        state: &mut SessionState,
        result: TurnResult,
        game_state: GameState,
    ) -> TurnOutcome {
        self.prefetch.invalidate();

        state.epoch += 1;
        state
            .transcript
            .push(Message::assistant(&result.narrated_state, result.image.clone()));
        state.pending_option = None;
        state.loading = false;
        state.phase = if game_state.is_terminal() {
            Phase::GameOver
        } else if result.options.is_empty() {
            Phase::Stuck
        } else {
            Phase::PresentingOptions
        };

        tracing::debug!(
            episode = game_state.episode_counter,
            status = %game_state.status,
            options = result.options.len(),
            phase = %state.phase,
            "Turn applied"
        );

        state.game_state = Some(game_state);
        state.current_turn = Some(result);

        if state.phase == Phase::PresentingOptions {
            let options = state.options().to_vec();
            self.prefetch
                .begin_prefetch(&options, &state.transcript, state.game_state.as_ref());
        }

        return TurnOutcome::Applied(state.phase);
    }
}
