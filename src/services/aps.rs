//! Autodesk Platform Services client
//!
//! Thin adapter over the Model Derivative API: submit a translation job for a
//! stored object and read back its manifest. Every request carries a bearer
//! token from [`TokenProvider`].

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::job::{JobKey, JobStatus, TranslationState};
use crate::services::auth::{AuthError, TokenProvider};
use crate::services::prober::{ProbeError, StatusProber};

const OBJECT_URN_PREFIX: &str = "urn:adsk.objects:os.object:";

/// `OBJECT_URN_PREFIX` after url-safe base64 encoding.
const ENCODED_OBJECT_URN_PREFIX: &str = "dXJuOmFkc2sub2JqZWN0czpvcy5vYmplY3Q6";

const IFC_OUTPUT: &str = "ifc";

/// Encode an object urn for use in Model Derivative paths.
/// Already-encoded urns are passed through.
pub fn encode_urn(urn: &str) -> String {
    if urn.starts_with(ENCODED_OBJECT_URN_PREFIX) {
        return urn.to_string();
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(urn)
}

/// Overall translation manifest returned by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub status: String,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub derivatives: Vec<Derivative>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Derivative {
    pub output_type: String,
    pub status: String,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub children: Vec<DerivativeChild>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DerivativeChild {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub urn: Option<String>,
}

/// Provider acknowledgement of a submitted job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub result: String,
    pub urn: String,
}

/// Map a manifest onto the subscriber-facing status.
///
/// The IFC derivative drives the status when present; otherwise the
/// manifest-level status is reported.
pub fn status_from_manifest(manifest: &Manifest) -> Result<JobStatus, ProbeError> {
    let ifc = manifest
        .derivatives
        .iter()
        .find(|d| d.output_type.eq_ignore_ascii_case(IFC_OUTPUT));

    let (raw_status, progress) = match ifc {
        Some(derivative) => (
            derivative.status.as_str(),
            derivative.progress.clone().unwrap_or_else(|| "0%".to_string()),
        ),
        None => (manifest.status.as_str(), manifest.progress.clone()),
    };

    let state: TranslationState = raw_status
        .parse()
        .map_err(|_| ProbeError::Permanent(format!("unrecognized manifest status '{raw_status}'")))?;

    let mut status = JobStatus::new(state, progress);
    if let Some(handle) = ifc.and_then(ifc_resource_urn) {
        status = status.with_result(handle);
    }
    Ok(status)
}

fn ifc_resource_urn(derivative: &Derivative) -> Option<String> {
    derivative
        .children
        .iter()
        .find(|c| {
            c.role.as_deref() == Some(IFC_OUTPUT)
                || c.urn.as_deref().is_some_and(|u| u.ends_with(".ifc"))
        })
        .and_then(|c| c.urn.clone())
}

/// Client for the Model Derivative translation API.
pub struct ApsClient {
    http: Client,
    base_url: String,
    bucket_key: String,
    tokens: TokenProvider,
}

impl ApsClient {
    pub fn new(
        base_url: &str,
        bucket_key: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &str,
        timeout: Duration,
    ) -> Result<Self, ApsError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cad-translate-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApsError::Http)?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let tokens = TokenProvider::new(http.clone(), &base_url, client_id, client_secret, scopes);

        Ok(Self {
            http,
            base_url,
            bucket_key: bucket_key.to_string(),
            tokens,
        })
    }

    /// Object urn of `object_name` inside the configured bucket.
    pub fn object_urn(&self, object_name: &str) -> String {
        format!("{}{}/{}", OBJECT_URN_PREFIX, self.bucket_key, object_name)
    }

    /// Start an IFC + SVF2 translation of a stored artifact.
    pub async fn submit_job(&self, artifact_key: &str) -> Result<JobInfo, ApsError> {
        let encoded = encode_urn(artifact_key);
        let url = format!("{}/modelderivative/v2/designdata/job", self.base_url);

        let payload = serde_json::json!({
            "input": { "urn": encoded },
            "output": {
                "formats": [
                    { "type": IFC_OUTPUT },
                    { "type": "svf2", "views": ["2d", "3d"] }
                ]
            }
        });

        tracing::info!(urn = %encoded, "Submitting translation job");

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(ApsError::Http)?;

        let response = self.check_status(response).await?;
        let job: JobInfo = response.json().await.map_err(ApsError::Http)?;

        tracing::info!(urn = %job.urn, result = %job.result, "Translation job accepted");
        Ok(job)
    }

    /// Fetch the translation manifest of an artifact.
    pub async fn get_manifest(&self, artifact_key: &str) -> Result<Manifest, ApsError> {
        let encoded = encode_urn(artifact_key);
        let url = format!(
            "{}/modelderivative/v2/designdata/{}/manifest",
            self.base_url, encoded
        );

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApsError::Http)?;

        let response = self.check_status(response).await?;
        response.json().await.map_err(ApsError::Http)
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, ApsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApsError::Status { status, body })
    }
}

#[async_trait]
impl StatusProber for ApsClient {
    async fn probe(&self, key: &JobKey) -> Result<JobStatus, ProbeError> {
        let manifest = self.get_manifest(key.as_str()).await?;
        let status = status_from_manifest(&manifest)?;
        tracing::debug!(
            job_key = %key,
            manifest_status = %manifest.status,
            status = %status.status,
            progress = %status.progress,
            "Manifest fetched"
        );
        Ok(status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Provider responded with {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl From<ApsError> for ProbeError {
    fn from(err: ApsError) -> Self {
        match err {
            ApsError::Http(e) if e.is_decode() => ProbeError::Permanent(e.to_string()),
            ApsError::Http(e) => ProbeError::Transient(e.to_string()),
            ApsError::Auth(e) => e.into(),
            ApsError::Status { status, body } => ProbeError::from_status(status, body),
        }
    }
}
