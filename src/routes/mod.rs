use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod health;
pub mod metrics;
pub mod translate;
pub mod ws;

/// Application routes that share [`AppState`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ws", get(ws::ws_handler))
        .route("/api/v1/translate", post(translate::submit_translation))
        .route(
            "/api/v1/translate/{urn}/status",
            get(translate::get_translation_status),
        )
        .with_state(state)
}
