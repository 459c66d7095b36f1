//! Test helper utilities for monitor and gateway tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use cad_translate_monitor::{
    app_state::AppState,
    models::job::{JobKey, JobStatus, TranslationState},
    models::message::ServerMessage,
    routes,
    services::{
        aps::ApsClient,
        fanout::{ConnectionId, SubscriptionHub},
        monitor::{MonitorConfig, MonitorRegistry},
        prober::{ProbeError, StatusProber},
    },
};

pub type Outcome = Result<JobStatus, ProbeError>;

/// Prober that replays scripted outcomes per job key, then repeats a fallback.
pub struct ScriptedProber {
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    fallback: Outcome,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::with_fallback(Ok(status(TranslationState::Inprogress, "50%")))
    }

    pub fn with_fallback(fallback: Outcome) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            delay: Duration::ZERO,
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make each probe take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn script(&self, key: &str, outcomes: Vec<Outcome>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(key.to_string(), outcomes.into());
    }

    pub fn calls_for(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of probes that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusProber for ScriptedProber {
    async fn probe(&self, key: &JobKey) -> Result<JobStatus, ProbeError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(key.as_str().to_string())
            .or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let outcome = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(key.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

pub fn key(raw: &str) -> JobKey {
    JobKey::parse(raw).unwrap()
}

pub fn status(state: TranslationState, progress: &str) -> JobStatus {
    JobStatus::new(state, progress)
}

pub fn transient() -> Outcome {
    Err(ProbeError::Transient("503 Service Unavailable".to_string()))
}

pub fn config(poll_interval: Duration, max_failures: u32) -> MonitorConfig {
    MonitorConfig {
        poll_interval,
        max_failures,
    }
}

/// Registry wired to a fresh hub.
pub fn harness(prober: Arc<ScriptedProber>, config: MonitorConfig) -> (MonitorRegistry, Arc<SubscriptionHub>) {
    let hub = Arc::new(SubscriptionHub::new());
    let registry = MonitorRegistry::new(prober, Arc::clone(&hub), config);
    (registry, hub)
}

/// Connect a subscriber and join it to `key`'s group.
pub fn subscribe(hub: &SubscriptionHub, key: &JobKey) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
    let conn = ConnectionId::new();
    let rx = hub.connect(conn);
    hub.join(key, conn);
    (conn, rx)
}

/// Next status frame for a subscriber, failing the test after a minute.
pub async fn next_status(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> JobStatus {
    let msg = tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for status")
        .expect("subscriber channel closed");
    msg.as_status().cloned().expect("expected a translation-status frame")
}

/// Assert that nothing arrives for `window`.
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<ServerMessage>, window: Duration) {
    if let Ok(Some(msg)) = tokio::time::timeout(window, rx.recv()).await {
        panic!("unexpected message: {msg:?}");
    }
}

/// Serve the application routes on an ephemeral port. The APS client points
/// at a closed port; use [`spawn_app_with_aps`] when a handler calls it.
pub async fn spawn_app(prober: Arc<ScriptedProber>, config: MonitorConfig) -> (SocketAddr, AppState) {
    spawn_app_with_aps("http://127.0.0.1:9", prober, config).await
}

/// Serve the application routes with the APS client aimed at `aps_base_url`.
pub async fn spawn_app_with_aps(
    aps_base_url: &str,
    prober: Arc<ScriptedProber>,
    config: MonitorConfig,
) -> (SocketAddr, AppState) {
    let aps = ApsClient::new(
        aps_base_url,
        "cad-uploads",
        "client-id",
        "client-secret",
        "data:read",
        Duration::from_secs(1),
    )
    .expect("Failed to build APS client");

    let state = AppState::new(Arc::new(aps), prober, config);
    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });

    (addr, state)
}
