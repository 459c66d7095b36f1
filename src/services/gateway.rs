use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::job::{InvalidJobKey, JobKey};
use crate::models::message::{ClientMessage, ServerMessage};
use crate::services::fanout::{ConnectionId, SubscriptionHub};
use crate::services::monitor::{MonitorRegistry, MonitorStart};

/// Connection-facing facade over the subscription hub and monitor registry.
pub struct Gateway {
    hub: Arc<SubscriptionHub>,
    registry: MonitorRegistry,
}

impl Gateway {
    pub fn new(hub: Arc<SubscriptionHub>, registry: MonitorRegistry) -> Self {
        Self { hub, registry }
    }

    /// Register a new connection. Its single disconnect path is [`Gateway::disconnect`].
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let conn_id = ConnectionId::new();
        let rx = self.hub.connect(conn_id);
        tracing::info!(conn_id = %conn_id, "Client connected");
        (conn_id, rx)
    }

    /// Join `conn_id` to the job's group and make sure the job is being polled.
    /// Invalid keys, and any request after shutdown began, are rejected before
    /// any state is created.
    pub fn monitor(&self, conn_id: ConnectionId, raw_key: &str) -> Result<MonitorStart, GatewayError> {
        let key = JobKey::parse(raw_key).map_err(|reason| {
            tracing::warn!(conn_id = %conn_id, raw_key, %reason, "Invalid job key received");
            GatewayError::InvalidRequest(reason)
        })?;

        if self.registry.is_closed() {
            return Err(GatewayError::ShuttingDown);
        }

        if self.hub.join(&key, conn_id) {
            tracing::info!(conn_id = %conn_id, job_key = %key, "Client joined job group");
        }
        match self.registry.start_monitoring(&key, conn_id) {
            MonitorStart::Closed => Err(GatewayError::ShuttingDown),
            started => Ok(started),
        }
    }

    /// Dispatch one inbound message. Rejections are reported back to the sender.
    pub fn handle_message(&self, conn_id: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::MonitorTranslation(raw_key) => {
                if let Err(err) = self.monitor(conn_id, &raw_key) {
                    self.hub
                        .send_to(conn_id, ServerMessage::error(Some(&raw_key), err.to_string()));
                }
            }
        }
    }

    /// Report an inbound frame that could not be decoded.
    pub fn reject_frame(&self, conn_id: ConnectionId, reason: &str) {
        tracing::warn!(conn_id = %conn_id, reason, "Malformed client frame");
        self.hub
            .send_to(conn_id, ServerMessage::error(None, format!("malformed message: {reason}")));
    }

    /// Remove the connection from every group. Polling is unaffected.
    pub fn disconnect(&self, conn_id: ConnectionId) {
        let groups = self.hub.leave(conn_id);
        tracing::info!(conn_id = %conn_id, groups, "Client disconnected");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidJobKey),

    #[error("server is shutting down")]
    ShuttingDown,
}
