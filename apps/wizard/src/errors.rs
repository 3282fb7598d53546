use thiserror::Error;

use crate::messages::{text, Language, MessageKey};

/// Client-level error type.
/// Every explicit action funnels its failure through `user_message` so the
/// notification shown to the user is uniform across operations.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (status {status}): {}", .detail.as_deref().unwrap_or("<no detail>"))]
    Api { status: u16, detail: Option<String> },

    #[error("Response parse error: {0}")]
    Parse(String),

    #[error("Required questions unresolved: {}", .0.join(", "))]
    UnresolvedQuestions(Vec<String>),

    #[error("No active session")]
    NoSession,

    #[error("No files selected")]
    NoFilesSelected,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Parse(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Storage(e.to_string())
    }
}

impl ClientError {
    /// True when the server no longer knows the session (unknown or expired).
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, ClientError::Api { status: 404 | 410, .. })
    }

    /// Human-readable notification text for this error.
    /// Server-provided details are surfaced verbatim.
    pub fn user_message(&self, language: Language) -> String {
        match self {
            ClientError::Api {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            ClientError::Api { .. } | ClientError::Transport(_) | ClientError::Parse(_) => {
                text(language, MessageKey::RequestFailed).to_string()
            }
            ClientError::UnresolvedQuestions(ids) => format!(
                "{}: {}",
                text(language, MessageKey::RequiredUnresolved),
                ids.join(", ")
            ),
            ClientError::NoSession => text(language, MessageKey::StartSessionFirst).to_string(),
            ClientError::NoFilesSelected => {
                text(language, MessageKey::SelectFilesFirst).to_string()
            }
            ClientError::Storage(_) => text(language, MessageKey::ActionFailed).to_string(),
        }
    }
}
