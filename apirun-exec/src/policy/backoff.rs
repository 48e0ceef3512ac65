use std::time::Duration;

use apirun_core::{duration_from_secs, RetryBackoff, MAX_BACKOFF_SECONDS};

/// Delay before retry number `attempt` (1-based); zero for attempt 0.
pub fn backoff_delay(attempt: u32, backoff: &RetryBackoff) -> Duration {
    backoff_delay_with(attempt, backoff, fastrand::f64)
}

/// Same as [`backoff_delay`] with an injectable `[0, 1)` source.
pub fn backoff_delay_with(attempt: u32, backoff: &RetryBackoff, rand_f64: impl FnOnce() -> f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let exp = 2f64.powi(attempt.saturating_sub(1).min(62) as i32);
    let base = (backoff.base_seconds * exp)
        .min(backoff.max_seconds)
        .min(MAX_BACKOFF_SECONDS)
        .max(0.0);
    let span = base * backoff.jitter_ratio.clamp(0.0, 1.0);
    let jitter = if span > 0.0 { rand_f64() * span } else { 0.0 };
    duration_from_secs(base + jitter)
}
