use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Longest job key accepted from a client.
pub const MAX_JOB_KEY_LEN: usize = 1024;

/// Opaque identifier of one translation job, derived from the stored
/// artifact's object id (raw or base64-encoded urn).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    /// Validate a client-supplied key. Surrounding whitespace is stripped.
    pub fn parse(raw: &str) -> Result<Self, InvalidJobKey> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidJobKey::Empty);
        }
        if trimmed.len() > MAX_JOB_KEY_LEN {
            return Err(InvalidJobKey::TooLong(trimmed.len()));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(InvalidJobKey::ControlCharacter);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidJobKey {
    #[error("job key is missing or empty")]
    Empty,

    #[error("job key is {0} bytes long (limit {limit})", limit = MAX_JOB_KEY_LEN)]
    TooLong(usize),

    #[error("job key contains control characters")]
    ControlCharacter,
}

/// Status vocabulary of a translation job as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TranslationState {
    Pending,
    Inprogress,
    Success,
    Failed,
    Timeout,
    Error,
    Notfound,
}

impl TranslationState {
    /// States reported by the provider after which polling stops.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Timeout)
    }
}

/// Snapshot of a translation job's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub status: TranslationState,
    pub progress: String,
    /// Urn of the produced derivative. Only set on `success`.
    pub result_handle: Option<String>,
}

impl JobStatus {
    pub fn new(status: TranslationState, progress: impl Into<String>) -> Self {
        Self {
            status,
            progress: progress.into(),
            result_handle: None,
        }
    }

    pub fn with_result(mut self, handle: impl Into<String>) -> Self {
        if self.status == TranslationState::Success {
            self.result_handle = Some(handle.into());
        }
        self
    }

    /// Synthetic status broadcast when a probe fails.
    pub fn polling_error(attempt: u32) -> Self {
        Self::new(TranslationState::Error, format!("Error polling ({attempt})"))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
