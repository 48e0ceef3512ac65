use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apirun_core::duration_from_secs;
use tokio::time::Instant;

/// Refills at `rate` tokens per second up to `capacity`.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    tokens: f64,
    updated_at: Instant,
}

impl TokenBucket {
    pub fn new(rate: f64, capacity: f64) -> Self {
        let capacity = if capacity > 0.0 { capacity } else { rate };
        Self {
            rate,
            capacity,
            tokens: capacity,
            updated_at: Instant::now(),
        }
    }

    /// Takes one token. Returns zero if one was available, otherwise the
    /// time until the deficit refills; the bucket is drained either way.
    pub fn consume(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.updated_at).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
            self.updated_at = now;
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Duration::ZERO;
        }
        let deficit = 1.0 - self.tokens;
        self.tokens = 0.0;
        duration_from_secs(deficit / self.rate)
    }
}

/// One token bucket per destination host.
#[derive(Debug)]
pub struct PerHostRateLimiter {
    rate: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,
}

impl PerHostRateLimiter {
    pub fn new(rate: f64) -> Self {
        let rate = rate.max(1e-6);
        Self {
            rate,
            capacity: rate.max(1.0),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// How long the caller should wait before sending to `host`. The token
    /// is reserved now; this never sleeps.
    pub fn wait_time(&self, host: &str) -> Duration {
        let key = normalize_host(host);
        let bucket = {
            let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
            buckets
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(self.rate, self.capacity))))
                .clone()
        };
        let mut bucket = bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.consume()
    }
}

pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    if host.is_empty() {
        "default".to_string()
    } else {
        host
    }
}
