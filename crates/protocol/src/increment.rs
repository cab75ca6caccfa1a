//! Increment message parsing
//!
//! The grammar is deliberately tiered: a one-tap client sends an empty frame
//! or the literal `increment`, a batching client coalesces rapid taps into a
//! single `inc:<N>`. Anything else parses to zero and is ignored rather than
//! treated as an error.

/// Default cap on the amount a single message may request.
///
/// Batching clients coalesce at most this many taps into one frame; the
/// server enforces the same ceiling so one message cannot drain an entire
/// token bucket.
pub const DEFAULT_MAX_BATCH: u64 = 40;

/// Parse an increment request, returning the granted amount.
///
/// Returns 0 for anything that is not a well-formed increment request;
/// callers drop zero-amount messages silently.
pub fn parse_increment(text: &str, max_batch: u64) -> u64 {
    let text = text.trim();

    if text.is_empty() || text == "increment" {
        return 1;
    }

    if let Some(raw) = text.strip_prefix("inc:") {
        let parsed: f64 = match raw.parse() {
            Ok(value) => value,
            Err(_) => return 0,
        };
        if !parsed.is_finite() || parsed <= 0.0 {
            return 0;
        }
        return (parsed.floor() as u64).min(max_batch);
    }

    0
}

/// Decode a binary channel frame as UTF-8 text.
///
/// The channel is text-first; binary frames are accepted only as an encoding
/// accident and must still contain valid UTF-8 to mean anything.
pub fn decode_payload(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok()
}
