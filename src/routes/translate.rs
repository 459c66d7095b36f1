use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::job::JobKey;
use crate::models::translation::{TranslateRequest, TranslateResponse, TranslationStatusResponse};
use crate::services::aps::encode_urn;
use crate::services::prober::ProbeError;

/// POST /api/v1/translate: Start translating an uploaded object.
pub async fn submit_translation(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<(StatusCode, Json<TranslateResponse>), StatusCode> {
    request.validate().map_err(|report| {
        tracing::warn!(error = %report, "Rejected translate request");
        StatusCode::UNPROCESSABLE_ENTITY
    })?;

    let object_urn = state.aps.object_urn(&request.object_name);
    let job = state.aps.submit_job(&object_urn).await.map_err(|e| {
        tracing::error!(object = %request.object_name, error = %e, "Translation start failed");
        StatusCode::BAD_GATEWAY
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(TranslateResponse {
            urn: encode_urn(&object_urn),
            result: job.result,
            message: "Translation job started successfully.".to_string(),
        }),
    ))
}

/// GET /api/v1/translate/{urn}/status: One-off status lookup.
pub async fn get_translation_status(
    State(state): State<AppState>,
    Path(urn): Path<String>,
) -> Result<Json<TranslationStatusResponse>, StatusCode> {
    let key = JobKey::parse(&urn).map_err(|_| StatusCode::BAD_REQUEST)?;

    let status = state.prober.probe(&key).await.map_err(|e| {
        tracing::warn!(job_key = %key, error = %e, "Status lookup failed");
        match e {
            ProbeError::NotFound(_) => StatusCode::NOT_FOUND,
            ProbeError::Transient(_) | ProbeError::Permanent(_) => StatusCode::BAD_GATEWAY,
        }
    })?;

    Ok(Json(TranslationStatusResponse {
        urn: key.as_str().to_string(),
        status,
    }))
}
