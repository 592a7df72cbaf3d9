use std::sync::Arc;

use async_trait::async_trait;

use super::GameOption;
use super::GameState;
use super::Message;
use super::TurnFetchFailed;

/// One narrated scene and the actions offered after it. The backend promises
/// between one and four options, nothing here relies on that.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnResult {
    pub narrated_state: String,
    pub options: Vec<GameOption>,
    pub image: Option<Vec<u8>>,
    pub image_prompt: Option<String>,
}

impl TurnResult {
    pub fn new(narrated_state: &str, options: Vec<GameOption>) -> TurnResult {
        return TurnResult {
            narrated_state: narrated_state.to_string(),
            options,
            image: None,
            image_prompt: None,
        };
    }

    pub fn option(&self, id: &str) -> Option<&GameOption> {
        return self.options.iter().find(|option| return option.id == id);
    }
}

/// Everything a single service call hands back. `game_state` is the
/// backend's own view and is informational only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub result: TurnResult,
    pub game_state: GameState,
}

#[async_trait]
pub trait TurnService {
    /// Performs exactly one request against the generation backend.
    ///
    /// `game_state` is `None` only on the opening turn of a session, in which
    /// case the backend starts from a fresh snapshot. Implementations must not
    /// retry; callers own the retry policy.
    async fn advance(
        &self,
        transcript: &[Message],
        game_state: Option<&GameState>,
    ) -> Result<TurnReply, TurnFetchFailed>;
}

pub type TurnServiceBox = Arc<dyn TurnService + Send + Sync>;
