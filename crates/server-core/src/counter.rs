//! The counter actor
//!
//! Exactly one actor owns the counter value, the connection registry, and
//! both flush timers. All entry points serialize on a single mutex; storage
//! I/O awaits while holding it, which keeps the single-writer invariant even
//! though the I/O itself is asynchronous. A hung store therefore stalls the
//! actor instead of letting two mutations interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use tally_config::{FlushConfig, RateLimitConfig};
use tally_persistence::CounterRepository;
use tally_protocol::parse_increment;

use crate::coalesce::FlushState;
use crate::error::Result;
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::registry::{ConnectionId, ConnectionRegistry, Outbound};

/// Close reason sent to connections of an abusive identity.
const POLICY_CLOSE_REASON: &str = "rate limit exceeded";

/// Everything a socket task needs after registering a connection.
pub struct ConnectionHandle {
    /// Registry id, passed back on increment and disconnect
    pub id: ConnectionId,
    /// Commands from the actor: counter pushes and forced closes
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
}

/// Handle to the counter actor. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct CounterActor {
    inner: Arc<ActorInner>,
}

struct ActorInner {
    store: CounterRepository,
    limiter: RateLimiter,
    persist_interval: Duration,
    broadcast_interval: Duration,
    state: Mutex<ActorState>,
}

#[derive(Default)]
struct ActorState {
    /// None until the first access; loaded lazily from storage
    count: Option<u64>,
    registry: ConnectionRegistry,
    persist: FlushState,
    broadcast: FlushState,
}

impl CounterActor {
    pub fn new(store: CounterRepository, rate_limit: RateLimitConfig, flush: FlushConfig) -> Self {
        Self {
            inner: Arc::new(ActorInner {
                store,
                limiter: RateLimiter::new(rate_limit),
                persist_interval: Duration::from_millis(flush.persist_interval_ms),
                broadcast_interval: Duration::from_millis(flush.broadcast_interval_ms),
                state: Mutex::new(ActorState::default()),
            }),
        }
    }

    /// Register a new connection and queue the current value as its first
    /// frame. A genuine storage failure propagates; the caller should refuse
    /// the connection rather than show a wrong baseline.
    pub async fn connect(&self, identity: String) -> Result<ConnectionHandle> {
        let mut state = self.inner.state.lock().await;
        let value = self.inner.ensure_loaded(&mut state).await?;

        let (sender, outbound) = mpsc::unbounded_channel();
        // Queued under the lock, so no broadcast can slip in ahead of it.
        let _ = sender.send(Outbound::Count(value));
        let id = state.registry.insert(identity.clone(), sender);

        debug!(
            id,
            identity = %identity,
            connections = state.registry.len(),
            "connection registered"
        );

        Ok(ConnectionHandle { id, outbound })
    }

    /// Handle a raw channel message from a connection. Returns whether an
    /// increment was admitted; every failure mode is silent on the wire.
    pub async fn request_increment(&self, id: ConnectionId, payload: &str) -> bool {
        let amount = parse_increment(payload, self.inner.limiter.max_batch());
        if amount == 0 {
            // Protocol noise: unrecognized or non-positive. Not an error.
            return false;
        }

        let mut state = self.inner.state.lock().await;

        let Some(identity) = state.registry.identity_of(id).map(str::to_owned) else {
            return false;
        };

        let current = match self.inner.ensure_loaded(&mut state).await {
            Ok(value) => value,
            Err(err) => {
                // Not client-visible; the next access retries the load.
                warn!(error = %err, "dropping increment, counter value not loadable");
                return false;
            }
        };

        let capacity = self.inner.limiter.capacity();
        let bucket = state.registry.bucket_mut(&identity, capacity);
        match self.inner.limiter.check(bucket, amount) {
            RateLimitDecision::Admitted => {
                state.count = Some(current.saturating_add(amount));
                state.registry.mark_admitted(id);
                self.arm_persist(&mut state);
                self.arm_broadcast(&mut state);
                true
            }
            RateLimitDecision::Rejected => {
                debug!(id, identity = %identity, amount, "increment rejected");
                false
            }
            RateLimitDecision::Abusive => {
                warn!(identity = %identity, "abuse cutoff tripped, disconnecting identity");
                state.registry.terminate_identity(&identity, POLICY_CLOSE_REASON);
                false
            }
        }
    }

    /// Remove a connection; the identity's bucket goes with its last one.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut state = self.inner.state.lock().await;
        let age = state.registry.connection_age(id);
        if let Some(removed) = state.registry.remove(id) {
            debug!(
                id,
                identity = %removed.identity,
                bucket_dropped = removed.last_for_identity,
                contributed = removed.last_admitted.is_some(),
                age_secs = age.map(|a| a.as_secs()).unwrap_or(0),
                connections = state.registry.len(),
                "connection removed"
            );
        }
    }

    /// Current value, loading lazily. No rate-limit or timer side effects.
    pub async fn read_count(&self) -> Result<u64> {
        let mut state = self.inner.state.lock().await;
        self.inner.ensure_loaded(&mut state).await
    }

    /// Persist the current value immediately, bypassing the debouncer.
    /// Used on graceful shutdown.
    pub async fn flush_now(&self) -> Result<()> {
        let state = self.inner.state.lock().await;
        if let Some(value) = state.count {
            self.inner.store.save(value).await?;
            info!(value, "counter flushed to storage");
        }
        Ok(())
    }

    fn arm_persist(&self, state: &mut ActorState) {
        if state.persist.try_arm() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                ActorInner::persist_flush(inner).await;
            });
        }
    }

    fn arm_broadcast(&self, state: &mut ActorState) {
        if state.broadcast.try_arm() {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                ActorInner::broadcast_flush(inner).await;
            });
        }
    }
}

impl ActorInner {
    /// Load the counter on first access. Only an absent row defaults to
    /// zero; a real storage error surfaces to the caller.
    async fn ensure_loaded(&self, state: &mut ActorState) -> Result<u64> {
        if let Some(value) = state.count {
            return Ok(value);
        }

        let loaded = self.store.load().await?.unwrap_or(0);
        state.count = Some(loaded);
        info!(value = loaded, "counter value loaded from storage");
        Ok(loaded)
    }

    /// One-shot persist debounce: many increments inside one interval
    /// collapse into a single durable write of the final value.
    async fn persist_flush(inner: Arc<ActorInner>) {
        tokio::time::sleep(inner.persist_interval).await;

        let mut state = inner.state.lock().await;
        state.persist.begin_fire();
        if let Some(value) = state.count {
            match inner.store.save(value).await {
                Ok(()) => debug!(value, "counter value persisted"),
                Err(err) => warn!(error = %err, value, "failed to persist counter value"),
            }
        }
        state.persist.finish();
    }

    /// One-shot broadcast coalescer: all viewers get the newest value once
    /// per interval no matter how many increments landed within it.
    async fn broadcast_flush(inner: Arc<ActorInner>) {
        tokio::time::sleep(inner.broadcast_interval).await;

        let mut state = inner.state.lock().await;
        state.broadcast.begin_fire();
        if let Some(value) = state.count {
            let delivered = state.registry.broadcast(value);
            debug!(value, delivered, "counter value broadcast");
        }
        state.broadcast.finish();
    }
}
