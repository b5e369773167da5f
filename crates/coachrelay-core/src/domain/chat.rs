//! Chat domain types.
//!
//! `ChatRequest::parse` is the single validation point for inbound relay
//! bodies. It distinguishes malformed JSON from a missing or empty
//! `messages` array so the adapter can report each with its own reason.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

/// Model used when the client does not name one.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Sampling temperature used when the client does not send one.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    /// Parse a role from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Convert role to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single role-tagged message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }
}

/// Values substituted for fields the client leaves out.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDefaults {
    pub model: String,
    pub temperature: f64,
    pub stream: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            stream: false,
        }
    }
}

/// A validated chat request with every default resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Non-empty, in conversation order.
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f64,
    /// Effective mode after applying the deployment default.
    pub stream: bool,
}

impl ChatRequest {
    /// Parse and validate a raw request body.
    ///
    /// `null` and absent optional fields both take the default. A body that is
    /// valid JSON but not an object is treated as having no `messages`.
    pub fn parse(body: &[u8], defaults: &RequestDefaults) -> Result<Self, RelayError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| RelayError::InvalidJson(e.to_string()))?;
        Self::from_value(&value, defaults)
    }

    /// Validate an already-decoded JSON body.
    pub fn from_value(value: &Value, defaults: &RequestDefaults) -> Result<Self, RelayError> {
        let raw_messages = match value.get("messages") {
            Some(Value::Array(items)) if !items.is_empty() => items,
            _ => return Err(RelayError::MessagesRequired),
        };

        let messages = raw_messages
            .iter()
            .enumerate()
            .map(|(index, item)| {
                ChatMessage::deserialize(item).map_err(|e| RelayError::InvalidMessage {
                    index,
                    detail: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let model = match value.get("model") {
            None | Some(Value::Null) => defaults.model.clone(),
            Some(Value::String(m)) if m.trim().is_empty() => defaults.model.clone(),
            Some(Value::String(m)) => m.clone(),
            Some(other) => {
                return Err(RelayError::InvalidField {
                    field: "model",
                    detail: format!("expected a string, got {other}"),
                });
            }
        };

        let temperature = match value.get("temperature") {
            None | Some(Value::Null) => defaults.temperature,
            Some(Value::Number(n)) => n.as_f64().filter(|t| t.is_finite()).ok_or_else(|| {
                RelayError::InvalidField {
                    field: "temperature",
                    detail: format!("{n} is not a finite number"),
                }
            })?,
            Some(other) => {
                return Err(RelayError::InvalidField {
                    field: "temperature",
                    detail: format!("expected a number, got {other}"),
                });
            }
        };

        let stream = match value.get("stream") {
            None | Some(Value::Null) => defaults.stream,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(RelayError::InvalidField {
                    field: "stream",
                    detail: format!("expected a boolean, got {other}"),
                });
            }
        };

        Ok(Self {
            messages,
            model,
            temperature,
            stream,
        })
    }

    /// Build the body forwarded upstream with an explicit streaming flag.
    #[must_use]
    pub fn to_upstream_body(&self, stream: bool) -> UpstreamChatBody {
        UpstreamChatBody {
            model: self.model.clone(),
            messages: self.messages.clone(),
            temperature: self.temperature,
            stream,
        }
    }
}

/// JSON body sent to the upstream chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamChatBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub stream: bool,
}
