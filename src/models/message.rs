//! Frames exchanged with WebSocket clients.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};

use crate::models::job::{JobKey, JobStatus};

/// Client → server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Subscribe to status updates for a job key. The key is validated by the gateway.
    MonitorTranslation(String),
}

/// Server → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    TranslationStatus(StatusUpdate),
    TranslationError(ErrorNotice),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub urn: JobKey,
    #[serde(flatten)]
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub urn: Option<String>,
    pub message: String,
}

impl ServerMessage {
    pub fn status(urn: &JobKey, status: JobStatus) -> Self {
        Self::TranslationStatus(StatusUpdate {
            urn: urn.clone(),
            status,
        })
    }

    pub fn error(urn: Option<&str>, message: impl Into<String>) -> Self {
        Self::TranslationError(ErrorNotice {
            urn: urn.map(str::to_string),
            message: message.into(),
        })
    }

    /// The status carried by a `translation-status` frame.
    pub fn as_status(&self) -> Option<&JobStatus> {
        match self {
            Self::TranslationStatus(update) => Some(&update.status),
            Self::TranslationError(_) => None,
        }
    }
}
