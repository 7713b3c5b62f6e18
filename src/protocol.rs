//! Wire types: events pushed to SSE listeners and the JSON bodies accepted
//! by the ingest and callback endpoints.

use serde::{Deserialize, Serialize};

use crate::types::{MessageId, SessionId};

/// Error code for a webhook that could not be reached (network error or timeout)
pub const AUTOMATION_UNREACHABLE: &str = "AUTOMATION_UNREACHABLE";
/// Error code for a webhook that answered with a non-success status
pub const AUTOMATION_FAILED: &str = "AUTOMATION_FAILED";
/// Error code for a fault inside the relay itself
pub const RELAY_INTERNAL: &str = "RELAY_INTERNAL";

/// Author of a response payload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
}

/// Event delivered to every stream of a session.
///
/// Serialized as `{"event": <kind>, "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Processing of a turn has started
    Typing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
    },
    /// Partial response payload
    Chunk {
        role: Role,
        content: String,
        message_id: MessageId,
    },
    /// Complete response payload
    Final {
        role: Role,
        content: String,
        message_id: MessageId,
    },
    Error {
        code: String,
        detail: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
    },
    /// Liveness heartbeat, carries an empty data object
    Ping {},
}

impl RelayEvent {
    pub fn error(code: &str, detail: impl Into<String>, message_id: Option<MessageId>) -> Self {
        Self::Error {
            code: code.to_string(),
            detail: detail.into(),
            message_id,
        }
    }

    /// Wire name of the event kind, used for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Typing { .. } => "typing",
            Self::Chunk { .. } => "chunk",
            Self::Final { .. } => "final",
            Self::Error { .. } => "error",
            Self::Ping {} => "ping",
        }
    }
}

/// Body of `POST /ingest`.
///
/// Every field is optional at the type level so that a missing field is
/// reported as a validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestRequest {
    pub session_id: Option<String>,
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub message_id: Option<String>,
}

/// Body of `POST /n8n-callback`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackRequest {
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    /// A string is used as-is, any other JSON value is stringified
    #[serde(default)]
    pub content: serde_json::Value,
    /// Emit a `chunk` instead of a `final` event
    #[serde(default)]
    pub partial: bool,
}

impl CallbackRequest {
    /// Content as text, or `None` when absent, null or blank
    pub fn content_text(&self) -> Option<String> {
        match &self.content {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => present(Some(s.clone())),
            other => Some(other.to_string()),
        }
    }
}

/// Turn forwarded to the automation webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundTurn {
    pub session_id: SessionId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<usize>,
}

impl StatusResponse {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
            recipients: None,
        }
    }

    pub fn sent_to_client(recipients: usize) -> Self {
        Self {
            status: "sent_to_client".to_string(),
            recipients: Some(recipients),
        }
    }
}

/// Drop a client-supplied string that is blank. Non-blank values are kept
/// exactly as sent.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
