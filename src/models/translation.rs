use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::job::JobStatus;

/// Request to start translating an object already stored in the bucket.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[garde(length(min = 1, max = 255))]
    pub object_name: String,
}

/// Response after a translation job was accepted by the provider.
#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    /// Key to pass to `monitor-translation`.
    pub urn: String,
    pub result: String,
    pub message: String,
}

/// Response for a one-off status query.
#[derive(Debug, Serialize)]
pub struct TranslationStatusResponse {
    pub urn: String,
    #[serde(flatten)]
    pub status: JobStatus,
}
