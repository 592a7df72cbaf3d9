#[cfg(test)]
#[path = "http_test.rs"]
mod tests;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::domain::models::GameOption;
use crate::domain::models::GameState;
use crate::domain::models::GameStatus;
use crate::domain::models::Message;
use crate::domain::models::TurnFetchFailed;
use crate::domain::models::TurnReply;
use crate::domain::models::TurnResult;
use crate::domain::models::TurnService;

fn fetch_failed<E: fmt::Display>(context: &str, err: E) -> TurnFetchFailed {
    let reason = format!("{context}: {err}");
    tracing::error!(reason = reason.as_str(), "Turn request failed");
    return TurnFetchFailed::new(&reason);
}

/// Accepts raw base64 as well as `data:image/png;base64,...` URLs.
fn decode_image(data: &str) -> Result<Option<Vec<u8>>, TurnFetchFailed> {
    let encoded = match data.split_once(";base64,") {
        Some((_, encoded)) => encoded,
        None => data,
    };

    if encoded.trim().is_empty() {
        return Ok(None);
    }

    let image = STANDARD
        .decode(encoded.trim())
        .map_err(|err| return fetch_failed("Image data is not valid base64", err))?;

    return Ok(Some(image));
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_data: Option<String>,
}

impl MessageRequest {
    fn from_message(message: &Message) -> MessageRequest {
        return MessageRequest {
            role: message.role.to_string(),
            content: message.content.to_string(),
            image_data: match &message.image {
                Some(image) if message.has_image() => Some(STANDARD.encode(image)),
                _ => None,
            },
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnRequest {
    messages: Vec<MessageRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    game_state: Option<GameState>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionResponse {
    id: Option<String>,
    action: String,
    game_status: Option<GameStatus>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SceneResponse {
    state: String,
    options: Vec<OptionResponse>,
    image_prompt: Option<String>,
    image_data: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TurnResponse {
    response: SceneResponse,
    game_state: Option<GameState>,
}

impl TurnResponse {
    fn into_reply(self) -> Result<TurnReply, TurnFetchFailed> {
        let scene = self.response;
        let options = scene
            .options
            .into_iter()
            .enumerate()
            .map(|(position, option)| {
                return GameOption::from_parts(
                    position,
                    option.id,
                    &option.action,
                    option.game_status,
                );
            })
            .collect::<Vec<GameOption>>();

        let image = match scene.image_data {
            Some(data) => decode_image(&data)?,
            None => None,
        };

        let mut result = TurnResult::new(&scene.state, options);
        result.image = image;
        result.image_prompt = scene.image_prompt;

        return Ok(TurnReply {
            result,
            game_state: self.game_state.unwrap_or_else(GameState::initial),
        });
    }
}

/// Talks to a generation backend exposing `POST /api/chat`.
pub struct HttpTurnService {
    url: String,
    timeout: String,
}

impl HttpTurnService {
    pub fn new(url: &str, timeout: &str) -> HttpTurnService {
        return HttpTurnService {
            url: url.trim_end_matches('/').to_string(),
            timeout: timeout.to_string(),
        };
    }
}

#[async_trait]
impl TurnService for HttpTurnService {
    #[allow(clippy::implicit_return)]
    async fn advance(
        &self,
        transcript: &[Message],
        game_state: Option<&GameState>,
    ) -> Result<TurnReply, TurnFetchFailed> {
        let timeout = self
            .timeout
            .parse::<u64>()
            .map_err(|err| return fetch_failed("Invalid request timeout", err))?;

        let req = TurnRequest {
            messages: transcript.iter().map(MessageRequest::from_message).collect(),
            game_state: game_state.cloned(),
        };
        tracing::debug!(
            messages = req.messages.len(),
            episode = game_state.map(|state| return state.episode_counter),
            "Turn request"
        );

        let res = reqwest::Client::new()
            .post(format!("{url}/api/chat", url = self.url))
            .timeout(Duration::from_millis(timeout))
            .json(&req)
            .send()
            .await
            .map_err(|err| return fetch_failed("Backend is not reachable", err))?;

        if !res.status().is_success() {
            return Err(fetch_failed(
                "Backend rejected the turn request",
                res.status().as_u16(),
            ));
        }

        let body = res
            .json::<TurnResponse>()
            .await
            .map_err(|err| return fetch_failed("Backend returned a malformed turn", err))?;
        tracing::debug!(
            state = body.response.state.as_str(),
            options = body.response.options.len(),
            image = body.response.image_data.is_some(),
            backend_episode = body
                .game_state
                .as_ref()
                .map(|state| return state.episode_counter),
            "Turn response"
        );

        return body.into_reply();
    }
}
