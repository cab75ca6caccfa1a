//! Tally server core
//!
//! The single-instance counter actor and everything around it: per-identity
//! rate limiting, the connection registry, the persist/broadcast coalescers,
//! and the HTTP/WebSocket surface.

pub mod coalesce;
pub mod counter;
pub mod error;
pub mod logging;
pub mod rate_limit;
pub mod registry;
pub mod routes;
pub mod server;
pub mod ws;

pub use coalesce::FlushState;
pub use counter::{ConnectionHandle, CounterActor};
pub use error::{Result, ServerError};
pub use logging::init_logging;
pub use rate_limit::{RateLimitBucket, RateLimitDecision, RateLimiter};
pub use registry::{ConnectionId, ConnectionRegistry, Outbound, CLOSE_POLICY_VIOLATION};
pub use routes::build_router;
pub use server::ServerCore;
