//! Persistence layer for the tally server
//!
//! Provides database pool management and the repository for the single
//! durable datum this system has: the counter value.

pub mod database;
pub mod error;
pub mod repositories;

pub use database::{Database, DatabaseConfig};
pub use error::{PersistenceError, Result};
pub use repositories::CounterRepository;
