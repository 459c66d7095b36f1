use std::sync::Arc;

use crate::services::{
    aps::ApsClient,
    fanout::SubscriptionHub,
    gateway::Gateway,
    monitor::{MonitorConfig, MonitorRegistry},
    prober::StatusProber,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub aps: Arc<ApsClient>,
    pub prober: Arc<dyn StatusProber>,
    pub hub: Arc<SubscriptionHub>,
    pub registry: MonitorRegistry,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    /// `prober` is usually `aps` itself; it is separate so status lookups can
    /// be served by another implementation.
    pub fn new(aps: Arc<ApsClient>, prober: Arc<dyn StatusProber>, monitor: MonitorConfig) -> Self {
        let hub = Arc::new(SubscriptionHub::new());
        let registry = MonitorRegistry::new(Arc::clone(&prober), Arc::clone(&hub), monitor);
        let gateway = Arc::new(Gateway::new(Arc::clone(&hub), registry.clone()));

        Self {
            aps,
            prober,
            hub,
            registry,
            gateway,
        }
    }
}
