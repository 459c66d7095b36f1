use serde::Deserialize;
use std::time::Duration;

use crate::services::monitor::MonitorConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Autodesk Platform Services client ID
    pub aps_client_id: String,

    /// Autodesk Platform Services client secret
    pub aps_client_secret: String,

    /// OSS bucket holding uploaded CAD files
    pub aps_bucket_key: String,

    /// APS API root
    #[serde(default = "default_aps_base_url")]
    pub aps_base_url: String,

    /// Space-separated scopes requested for the two-legged token
    #[serde(default = "default_aps_scopes")]
    pub aps_scopes: String,

    /// Delay between status probes of one job, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive probe failures before a job monitor gives up
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: u32,

    /// Seconds allowed for cleanup after a shutdown signal before forced exit
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Timeout for outbound provider requests, in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_aps_base_url() -> String {
    "https://developer.api.autodesk.com".to_string()
}

fn default_aps_scopes() -> String {
    "data:read data:write data:create bucket:read bucket:create code:all".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_poll_failures() -> u32 {
    3
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            max_failures: self.max_poll_failures.max(1),
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
