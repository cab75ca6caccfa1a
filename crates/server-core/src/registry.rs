//! Connection registry
//!
//! Arena-style bookkeeping for live channel connections: stable integer ids,
//! an identity index for rate-limit aggregation, and the identity-keyed
//! rate-limit buckets. Buckets live and die with the connections of their
//! identity; the registry owns both maps, the limiter only operates on
//! buckets it is handed.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::debug;

use crate::rate_limit::RateLimitBucket;

/// Unique connection identifier
pub type ConnectionId = u64;

/// WebSocket close code for policy violations.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Command pushed from the actor to a connection's socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Push the counter value as a text frame
    Count(u64),
    /// Close the socket with the given code and reason
    Close {
        code: u16,
        reason: &'static str,
    },
}

/// One live channel connection
#[derive(Debug)]
struct Connection {
    identity: String,
    sender: mpsc::UnboundedSender<Outbound>,
    connected_at: Instant,
    last_admitted: Option<Instant>,
}

/// Result of removing a connection
#[derive(Debug)]
pub struct RemovedConnection {
    /// Identity the connection belonged to
    pub identity: String,
    /// True when no other connection shares the identity; its bucket was dropped
    pub last_for_identity: bool,
    /// When the connection last contributed an admitted increment, if ever
    pub last_admitted: Option<Instant>,
}

/// Registry of live connections and per-identity rate-limit state
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
    by_identity: HashMap<String, HashSet<ConnectionId>>,
    buckets: HashMap<String, RateLimitBucket>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, returning its id
    pub fn insert(&mut self, identity: String, sender: mpsc::UnboundedSender<Outbound>) -> ConnectionId {
        self.next_id += 1;
        let id = self.next_id;

        self.by_identity
            .entry(identity.clone())
            .or_default()
            .insert(id);
        self.connections.insert(
            id,
            Connection {
                identity,
                sender,
                connected_at: Instant::now(),
                last_admitted: None,
            },
        );

        id
    }

    /// Remove a connection; drops the identity's bucket when it was the last
    pub fn remove(&mut self, id: ConnectionId) -> Option<RemovedConnection> {
        let connection = self.connections.remove(&id)?;
        let identity = connection.identity;

        let mut last_for_identity = false;
        if let Some(ids) = self.by_identity.get_mut(&identity) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_identity.remove(&identity);
                self.buckets.remove(&identity);
                last_for_identity = true;
            }
        }

        Some(RemovedConnection {
            identity,
            last_for_identity,
            last_admitted: connection.last_admitted,
        })
    }

    /// Identity that owns a connection
    pub fn identity_of(&self, id: ConnectionId) -> Option<&str> {
        self.connections.get(&id).map(|c| c.identity.as_str())
    }

    /// Bucket for an identity, created full on first use
    pub fn bucket_mut(&mut self, identity: &str, capacity: u32) -> &mut RateLimitBucket {
        self.buckets
            .entry(identity.to_string())
            .or_insert_with(|| RateLimitBucket::new(capacity))
    }

    /// Stamp a connection's last admitted increment
    pub fn mark_admitted(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_admitted = Some(Instant::now());
        }
    }

    /// Send a command to one connection. Failures mean the socket task is
    /// already gone and are ignored.
    pub fn send_to(&self, id: ConnectionId, command: Outbound) {
        if let Some(connection) = self.connections.get(&id) {
            let _ = connection.sender.send(command);
        }
    }

    /// Push the counter value to every live connection. A dead socket is the
    /// transport's problem, not the broadcaster's; failed sends are skipped.
    pub fn broadcast(&self, value: u64) -> usize {
        let mut delivered = 0;
        for connection in self.connections.values() {
            if connection.sender.send(Outbound::Count(value)).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Drop an identity's bucket and order every one of its connections
    /// closed for policy violation. Returns the number of closes sent.
    pub fn terminate_identity(&mut self, identity: &str, reason: &'static str) -> usize {
        self.buckets.remove(identity);

        let Some(ids) = self.by_identity.get(identity) else {
            return 0;
        };

        let mut closed = 0;
        for id in ids {
            if let Some(connection) = self.connections.get(id) {
                let sent = connection.sender.send(Outbound::Close {
                    code: CLOSE_POLICY_VIOLATION,
                    reason,
                });
                if sent.is_ok() {
                    closed += 1;
                }
            }
        }
        debug!(identity, closed, "terminated abusive identity");
        closed
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Seconds a connection has been open, for logging on disconnect
    pub fn connection_age(&self, id: ConnectionId) -> Option<std::time::Duration> {
        self.connections.get(&id).map(|c| c.connected_at.elapsed())
    }
}
