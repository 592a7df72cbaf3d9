use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Semaphore;

use crate::domain::models::GameState;
use crate::domain::models::Message;
use crate::domain::models::Role;
use crate::domain::models::TurnFetchFailed;
use crate::domain::models::TurnReply;
use crate::domain::models::TurnResult;
use crate::domain::models::TurnService;

/// Replays canned turns keyed by the last user message of the transcript.
/// Held prompts block until `release` is called once per request.
#[derive(Default)]
pub struct ScriptedTurnService {
    replies: DashMap<String, Result<TurnResult, TurnFetchFailed>>,
    gates: DashMap<String, Arc<Semaphore>>,
    calls: DashMap<String, usize>,
    requests: DashMap<String, (Vec<Message>, Option<GameState>)>,
}

fn prompt_of(transcript: &[Message]) -> String {
    return transcript
        .iter()
        .rev()
        .find(|message| return message.role == Role::User)
        .map(|message| return message.content.to_string())
        .unwrap_or_default();
}

impl ScriptedTurnService {
    pub fn new() -> ScriptedTurnService {
        return ScriptedTurnService::default();
    }

    pub fn reply(self, prompt: &str, result: TurnResult) -> ScriptedTurnService {
        self.set_reply(prompt, result);
        return self;
    }

    pub fn fail(self, prompt: &str, reason: &str) -> ScriptedTurnService {
        self.replies
            .insert(prompt.to_string(), Err(TurnFetchFailed::new(reason)));
        return self;
    }

    pub fn hold(self, prompt: &str) -> ScriptedTurnService {
        self.gates
            .insert(prompt.to_string(), Arc::new(Semaphore::new(0)));
        return self;
    }

    pub fn set_reply(&self, prompt: &str, result: TurnResult) {
        self.replies.insert(prompt.to_string(), Ok(result));
    }

    /// Lets one held request for `prompt` through.
    pub fn release(&self, prompt: &str) {
        if let Some(gate) = self.gates.get(prompt) {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self, prompt: &str) -> usize {
        return self.calls.get(prompt).map_or(0, |count| return *count);
    }

    pub fn total_calls(&self) -> usize {
        return self.calls.iter().map(|count| return *count).sum();
    }

    pub fn last_request(&self, prompt: &str) -> Option<(Vec<Message>, Option<GameState>)> {
        return self.requests.get(prompt).map(|request| return request.clone());
    }
}

#[async_trait]
impl TurnService for ScriptedTurnService {
    async fn advance(
        &self,
        transcript: &[Message],
        game_state: Option<&GameState>,
    ) -> Result<TurnReply, TurnFetchFailed> {
        let prompt = prompt_of(transcript);
        *self.calls.entry(prompt.to_string()).or_insert(0) += 1;
        self.requests.insert(
            prompt.to_string(),
            (transcript.to_vec(), game_state.cloned()),
        );

        let gate = self.gates.get(&prompt).map(|gate| return gate.clone());
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| return TurnFetchFailed::new("gate closed"))?;
            permit.forget();
        }

        let reply = self.replies.get(&prompt).map(|reply| return reply.clone());
        let result = match reply {
            Some(reply) => reply?,
            None => return Err(TurnFetchFailed::new(&format!("nothing scripted for {prompt}"))),
        };

        return Ok(TurnReply {
            result,
            game_state: game_state.cloned().unwrap_or_else(GameState::initial),
        });
    }
}

/// Yields to spawned tasks until `condition` holds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }

    panic!("condition never became true");
}

/// Gives every runnable task a chance to finish its current step.
pub async fn drain_tasks() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
