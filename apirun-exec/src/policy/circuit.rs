use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use super::rate_limit::normalize_host;

const MIN_COOLDOWN: Duration = Duration::from_secs(1);
const MAX_COOLDOWN: Duration = Duration::from_secs(86_400);

/// Consecutive-failure breaker for one host.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    failures: u32,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: cooldown.clamp(MIN_COOLDOWN, MAX_COOLDOWN),
            failures: 0,
            open_until: None,
        }
    }

    /// Returns `true` when this failure opened the circuit.
    pub fn record_failure(&mut self) -> bool {
        self.failures += 1;
        if self.failures >= self.threshold {
            self.failures = 0;
            let now = Instant::now();
            self.open_until = Some(now.checked_add(self.cooldown).unwrap_or(now));
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.open_until = None;
    }

    /// Time left open; zero once closed. An expired window closes the circuit.
    pub fn remaining(&mut self) -> Duration {
        let Some(until) = self.open_until else {
            return Duration::ZERO;
        };
        let now = Instant::now();
        if until <= now {
            self.open_until = None;
            return Duration::ZERO;
        }
        until - now
    }
}

/// Breakers for every host under one policy.
#[derive(Debug)]
pub struct CircuitRegistry {
    threshold: u32,
    cooldown: Duration,
    states: Mutex<HashMap<String, Arc<Mutex<CircuitBreaker>>>>,
}

impl CircuitRegistry {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown: cooldown.clamp(MIN_COOLDOWN, MAX_COOLDOWN),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn matches(&self, threshold: u32, cooldown: Duration) -> bool {
        self.threshold == threshold.max(1) && self.cooldown == cooldown.clamp(MIN_COOLDOWN, MAX_COOLDOWN)
    }

    pub fn with_breaker<R>(&self, host: &str, f: impl FnOnce(&mut CircuitBreaker) -> R) -> R {
        let breaker = {
            let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
            states
                .entry(normalize_host(host))
                .or_insert_with(|| Arc::new(Mutex::new(CircuitBreaker::new(self.threshold, self.cooldown))))
                .clone()
        };
        let mut breaker = breaker.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut breaker)
    }
}
