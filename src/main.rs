use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cad_translate_monitor::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{aps::ApsClient, prober::StatusProber},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Missing or invalid configuration (APS_CLIENT_ID, APS_CLIENT_SECRET, APS_BUCKET_KEY)");
            std::process::exit(1);
        }
    };

    tracing::info!("Initializing cad-translate-monitor server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("translation_polls_total", "Status probes issued by job monitors");
    metrics::describe_counter!(
        "translation_poll_failures_total",
        "Status probes that failed, by error kind"
    );
    metrics::describe_counter!("translation_monitors_started_total", "Job monitors started");
    metrics::describe_counter!(
        "translation_monitors_stopped_total",
        "Job monitors stopped, by reason"
    );
    metrics::describe_gauge!("translation_active_monitors", "Jobs currently being polled");
    metrics::describe_gauge!("translation_ws_connections", "Open subscriber connections");

    // Initialize translation provider client
    tracing::info!(base_url = %config.aps_base_url, bucket = %config.aps_bucket_key, "Initializing APS client");
    let aps = Arc::new(
        ApsClient::new(
            &config.aps_base_url,
            &config.aps_bucket_key,
            &config.aps_client_id,
            &config.aps_client_secret,
            &config.aps_scopes,
            config.http_timeout(),
        )
        .expect("Failed to initialize APS client"),
    );

    // Create shared application state
    let monitor_config = config.monitor_config();
    tracing::info!(
        poll_interval_ms = monitor_config.poll_interval.as_millis() as u64,
        max_failures = monitor_config.max_failures,
        "Job monitor configured"
    );
    let prober: Arc<dyn StatusProber> = aps.clone();
    let state = AppState::new(aps, prober, monitor_config);

    let app = Router::new()
        .merge(routes::router(state.clone()))
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, config.shutdown_grace()))
        .await
        .expect("Server error");

    tracing::info!("HTTP server closed");
}

/// Resolve on SIGINT/SIGTERM after stopping every job monitor. A watchdog
/// forces exit if connections do not drain within `grace`.
async fn shutdown_signal(state: AppState, grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down gracefully"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully"),
    }

    state.registry.stop_all();
    state.hub.close_all();

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        tracing::error!(grace_secs = grace.as_secs(), "Could not close connections in time, forcing shutdown");
        std::process::exit(1);
    });
}
