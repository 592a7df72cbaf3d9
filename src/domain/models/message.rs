#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub image: Option<Vec<u8>>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Message {
        return Message {
            role,
            content: content.to_string(),
            image: None,
        };
    }

    pub fn user(content: &str) -> Message {
        return Message::new(Role::User, content);
    }

    /// Narration returned by the backend, optionally carrying the scene image.
    pub fn assistant(content: &str, image: Option<Vec<u8>>) -> Message {
        return Message {
            role: Role::Assistant,
            content: content.to_string(),
            image,
        };
    }

    pub fn has_image(&self) -> bool {
        return self.image.as_ref().map_or(false, |image| {
            return !image.is_empty();
        });
    }
}

/// Copies `transcript` and appends a user message with `text`. The original
/// transcript is left untouched.
pub fn extend_transcript(transcript: &[Message], text: &str) -> Vec<Message> {
    let mut extended = transcript.to_vec();
    extended.push(Message::user(text));

    return extended;
}
