use async_trait::async_trait;

use crate::models::job::{JobKey, JobStatus};

/// Read-only lookup of a translation job's current status.
///
/// Implementations are stateless between calls apart from credential caching.
#[async_trait]
pub trait StatusProber: Send + Sync {
    async fn probe(&self, key: &JobKey) -> Result<JobStatus, ProbeError>;
}

/// Why a probe did not yield a status. The monitor counts every variant
/// against the same consecutive-failure budget.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("transient probe failure: {0}")]
    Transient(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("permanent probe failure: {0}")]
    Permanent(String),
}

impl ProbeError {
    /// Classify an HTTP status returned by the provider.
    pub fn from_status(status: reqwest::StatusCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if status == reqwest::StatusCode::NOT_FOUND {
            Self::NotFound(detail)
        } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::Transient(detail)
        } else {
            Self::Permanent(detail)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient(_) => "transient",
            Self::NotFound(_) => "not_found",
            Self::Permanent(_) => "permanent",
        }
    }
}
