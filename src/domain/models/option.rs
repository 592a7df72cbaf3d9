#[cfg(test)]
#[path = "option_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use strum::EnumVariantNames;

#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, EnumVariantNames, strum::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    Active,
    Victory,
    Death,
}

impl GameStatus {
    /// Victory and death both end the play loop.
    pub fn is_terminal(&self) -> bool {
        return *self != GameStatus::Active;
    }
}

/// A single action offered during a turn. Ids are only unique within the turn
/// that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameOption {
    pub id: String,
    pub action: String,
    pub resulting_status: GameStatus,
}

impl GameOption {
    pub fn new(id: &str, action: &str) -> GameOption {
        return GameOption::with_status(id, action, GameStatus::Active);
    }

    pub fn with_status(id: &str, action: &str, resulting_status: GameStatus) -> GameOption {
        return GameOption {
            id: id.to_string(),
            action: action.to_string(),
            resulting_status,
        };
    }

    /// Builds an option from loosely typed backend fields. A missing id falls
    /// back to the option's position and a missing status means the game goes on.
    pub fn from_parts(
        position: usize,
        id: Option<String>,
        action: &str,
        status: Option<GameStatus>,
    ) -> GameOption {
        let id = match id {
            Some(id) if !id.trim().is_empty() => id,
            _ => format!("option-{position}"),
        };

        return GameOption::with_status(&id, action, status.unwrap_or_default());
    }
}

/// First non-active status in iteration order, if any option carries one.
pub fn first_terminal_status(options: &[GameOption]) -> Option<GameStatus> {
    return options
        .iter()
        .map(|option| return option.resulting_status)
        .find(|status| return status.is_terminal());
}
