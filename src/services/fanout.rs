use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::job::JobKey;
use crate::models::message::ServerMessage;

/// Identifier of one client connection, assigned when it is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Channel sender half for pushing messages to a connection.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, MessageSender>,
    groups: HashMap<JobKey, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<JobKey>>,
}

/// Per-job broadcast groups over the set of live connections.
///
/// All operations are synchronous: sends go into unbounded channels drained
/// by each connection's writer task.
pub struct SubscriptionHub {
    state: RwLock<HubState>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HubState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HubState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HubState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a connection and return the receiver for its outbound messages.
    pub fn connect(&self, conn_id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.write();
        state.connections.insert(conn_id, tx);
        metrics::gauge!("translation_ws_connections").set(state.connections.len() as f64);
        rx
    }

    /// Add a connection to the group for `key`. Returns `false` if it was
    /// already a member.
    pub fn join(&self, key: &JobKey, conn_id: ConnectionId) -> bool {
        let mut state = self.write();
        let added = state.groups.entry(key.clone()).or_default().insert(conn_id);
        if added {
            state.memberships.entry(conn_id).or_default().insert(key.clone());
        }
        added
    }

    /// Remove a connection from every group and drop its sender.
    /// Returns the number of groups it was removed from.
    pub fn leave(&self, conn_id: ConnectionId) -> usize {
        let mut state = self.write();
        state.connections.remove(&conn_id);
        let keys = state.memberships.remove(&conn_id).unwrap_or_default();

        for key in &keys {
            if let Some(members) = state.groups.get_mut(key) {
                members.remove(&conn_id);
                if members.is_empty() {
                    state.groups.remove(key);
                }
            }
        }

        metrics::gauge!("translation_ws_connections").set(state.connections.len() as f64);
        keys.len()
    }

    /// Deliver `message` once to every current member of the group.
    /// An absent or empty group is not an error. Returns the number of
    /// connections the message was handed to.
    pub fn broadcast(&self, key: &JobKey, message: &ServerMessage) -> usize {
        let state = self.read();
        let Some(members) = state.groups.get(key) else {
            return 0;
        };

        members
            .iter()
            .filter_map(|id| state.connections.get(id))
            .filter(|tx| tx.send(message.clone()).is_ok())
            .count()
    }

    /// Deliver `message` to a single connection.
    pub fn send_to(&self, conn_id: ConnectionId, message: ServerMessage) -> bool {
        self.read()
            .connections
            .get(&conn_id)
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    pub fn group_size(&self, key: &JobKey) -> usize {
        self.read().groups.get(key).map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    /// Drop every connection and group. Writer tasks observe their channel
    /// closing and shut the socket.
    pub fn close_all(&self) -> usize {
        let mut state = self.write();
        let count = state.connections.len();
        *state = HubState::default();
        metrics::gauge!("translation_ws_connections").set(0.0);
        tracing::info!(count, "Closed all subscriber connections");
        count
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new()
    }
}
