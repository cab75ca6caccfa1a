//! Tally channel protocol
//!
//! The realtime channel speaks plain text in both directions: clients request
//! increments with the grammar in [`increment`], the server pushes the counter
//! value as a bare decimal string.

pub mod increment;

pub use increment::{decode_payload, parse_increment, DEFAULT_MAX_BATCH};
