//! Per-identity rate limiting
//!
//! Two gates, both of which must pass. The token bucket bounds the steady
//! rate; the fixed 1-second window caps total requested cost independently of
//! bucket state, so an identity cannot exceed intended throughput by cycling
//! reconnects to get fresh buckets. Cost is the increment amount, not 1 per
//! message: the limiter charges proportionally to the value granted.

use std::time::{Duration, Instant};

use tally_config::RateLimitConfig;

/// Abuse cutoff relative to the refill rate: more than `1.5 * R` of requested
/// cost inside one window trips the cutoff.
const ABUSE_WINDOW_FACTOR: f64 = 1.5;

/// Fixed length of the abuse-detection window.
const ABUSE_WINDOW: Duration = Duration::from_secs(1);

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Tokens were deducted; apply the increment.
    Admitted,
    /// Not enough tokens; drop the message silently.
    Rejected,
    /// The identity blew through the window cutoff; drop its bucket and
    /// disconnect its connections.
    Abusive,
}

/// Token bucket plus abuse window for a single identity.
#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    /// Available tokens, never above the burst capacity
    tokens: f64,
    /// Last refill time
    last_refill: Instant,
    /// Start of the current abuse window
    window_start: Instant,
    /// Cost requested within the current window, admitted or not
    window_count: u64,
}

impl RateLimitBucket {
    /// A fresh bucket starts full.
    pub fn new(capacity: u32) -> Self {
        let now = Instant::now();
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
            window_start: now,
            window_count: 0,
        }
    }

    /// Remaining whole tokens (refill is applied lazily on `check`).
    pub fn available_tokens(&self) -> u64 {
        self.tokens.floor() as u64
    }
}

/// Pure admission policy. Owns configuration only; buckets are handed in by
/// the registry that owns them.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config }
    }

    /// Bucket capacity, for creating fresh buckets.
    pub fn capacity(&self) -> u32 {
        self.config.burst_capacity
    }

    /// Largest amount a single message may request.
    pub fn max_batch(&self) -> u64 {
        self.config.max_batch
    }

    /// Check whether `cost` may be admitted against `bucket`.
    pub fn check(&self, bucket: &mut RateLimitBucket, cost: u64) -> RateLimitDecision {
        let now = Instant::now();

        // Window gate first: rejected cost counts too, so a client hammering
        // an empty bucket still trips the cutoff.
        if now.duration_since(bucket.window_start) >= ABUSE_WINDOW {
            bucket.window_start = now;
            bucket.window_count = 0;
        }
        bucket.window_count = bucket.window_count.saturating_add(cost);

        let cutoff = ABUSE_WINDOW_FACTOR * f64::from(self.config.refill_rate);
        if bucket.window_count as f64 > cutoff {
            return RateLimitDecision::Abusive;
        }

        // Token bucket: refill for elapsed time, capped at the burst capacity.
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let refilled = elapsed * f64::from(self.config.refill_rate);
        bucket.tokens = (bucket.tokens + refilled).min(f64::from(self.config.burst_capacity));
        bucket.last_refill = now;

        if bucket.tokens >= cost as f64 {
            bucket.tokens -= cost as f64;
            RateLimitDecision::Admitted
        } else {
            RateLimitDecision::Rejected
        }
    }
}
