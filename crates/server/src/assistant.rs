//! Anthropic Messages API client for free-form assistant replies.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use taskflow_api::ChatTurn;

use crate::config::AssistantConfig;

const MESSAGES_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
/// Prior turns forwarded with each request.
const MAX_HISTORY: usize = 20;

#[derive(Debug, Clone, Error)]
pub enum AssistantError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("empty response")]
    Empty,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: Client,
    api_key: String,
    model: String,
}

impl AssistantClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// `None` when no API key is configured.
    pub fn from_config(config: &AssistantConfig) -> Result<Option<Self>, AssistantError> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("taskflow-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AssistantError::Transport(e.to_string()))?;
        Ok(Some(Self {
            http,
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }))
    }

    /// Ask for a reply to `message` given the system prompt and prior turns.
    pub async fn reply(
        &self,
        system: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AssistantError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: build_messages(history, message),
        };

        let res = self
            .http
            .post(MESSAGES_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let body = res
                    .json::<MessagesResponse>()
                    .await
                    .map_err(|e| AssistantError::Serde(e.to_string()))?;
                let text: String = body
                    .content
                    .into_iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text),
                        ContentBlock::Other => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                if text.trim().is_empty() {
                    Err(AssistantError::Empty)
                } else {
                    Ok(text)
                }
            }
            StatusCode::UNAUTHORIZED => Err(AssistantError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(AssistantError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(AssistantError::Http { status, body })
            }
        }
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AssistantError {
    if e.is_timeout() {
        AssistantError::Timeout
    } else {
        AssistantError::Transport(e.to_string())
    }
}

/// Recent history plus the new message. Unknown roles are dropped, and the
/// list always opens with a user turn as the API requires.
fn build_messages(history: &[ChatTurn], message: &str) -> Vec<Message> {
    let start = history.len().saturating_sub(MAX_HISTORY);
    let mut messages: Vec<Message> = history[start..]
        .iter()
        .filter_map(|turn| {
            let role = match turn.role.as_str() {
                "user" => "user",
                "assistant" => "assistant",
                _ => return None,
            };
            Some(Message {
                role,
                content: turn.content.clone(),
            })
        })
        .skip_while(|m| m.role != "user")
        .collect();
    messages.push(Message {
        role: "user",
        content: message.to_string(),
    });
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_build_messages_trims_history() {
        let history = vec![
            turn("assistant", "hello!"),
            turn("system", "ignored"),
            turn("user", "what is due?"),
            turn("assistant", "nothing"),
        ];
        let messages = build_messages(&history, "thanks");
        let roles: Vec<_> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["user", "assistant", "user"]);
        assert_eq!(messages[2].content, "thanks");
    }

    #[test]
    fn test_build_messages_caps_length() {
        let history: Vec<_> = (0..50)
            .map(|i| turn(if i % 2 == 0 { "user" } else { "assistant" }, "x"))
            .collect();
        assert!(build_messages(&history, "q").len() <= MAX_HISTORY + 1);
    }

    #[test]
    fn test_no_key_means_no_client() {
        let config = AssistantConfig {
            api_key: None,
            model: None,
        };
        assert!(AssistantClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_response_text_blocks_parse() {
        let body: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hi"},{"type":"tool_use","id":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(body.content.len(), 2);
        assert!(matches!(&body.content[0], ContentBlock::Text { text } if text == "Hi"));
    }
}
