use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apirun_core::{duration_from_secs, ExecutionPolicySnapshot};

use super::backoff::backoff_delay;
use super::circuit::CircuitRegistry;
use super::gate::{ConcurrencyGate, SlotGuard};
use super::rate_limit::PerHostRateLimiter;

#[derive(Debug, Default)]
struct Registries {
    gates: Mutex<HashMap<String, Arc<ConcurrencyGate>>>,
    limiters: Mutex<HashMap<String, Arc<PerHostRateLimiter>>>,
    circuits: Mutex<HashMap<String, Arc<CircuitRegistry>>>,
}

/// Process-wide policy state, keyed by policy key. Clone it to share.
///
/// Each primitive is swapped for a fresh one when its parameters change;
/// holders of the old one keep using it until they drop it.
#[derive(Debug, Clone, Default)]
pub struct PolicyRuntimeManager {
    inner: Arc<Registries>,
}

impl PolicyRuntimeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A view of the shared state under `snapshot`'s parameters.
    pub fn runtime(&self, snapshot: &ExecutionPolicySnapshot) -> PolicyRuntime {
        PolicyRuntime {
            key: snapshot.key(),
            snapshot: snapshot.clone(),
            manager: self.clone(),
        }
    }

    fn gate(&self, key: &str, capacity: usize) -> Arc<ConcurrencyGate> {
        let mut gates = self.inner.gates.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(gate) = gates.get(key).filter(|g| g.capacity() == capacity) {
            return gate.clone();
        }
        let gate = Arc::new(ConcurrencyGate::new(capacity));
        if gates.insert(key.to_string(), gate.clone()).is_some() {
            tracing::debug!(policy = key, capacity, "replaced concurrency gate");
        }
        gate
    }

    fn limiter(&self, key: &str, rate: f64) -> Arc<PerHostRateLimiter> {
        let mut limiters = self.inner.limiters.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(limiter) = limiters.get(key).filter(|l| rates_match(l.rate(), rate)) {
            return limiter.clone();
        }
        let limiter = Arc::new(PerHostRateLimiter::new(rate));
        if limiters.insert(key.to_string(), limiter.clone()).is_some() {
            tracing::debug!(policy = key, rate, "replaced rate limiter");
        }
        limiter
    }

    fn circuits(&self, key: &str, threshold: u32, cooldown: Duration) -> Arc<CircuitRegistry> {
        let mut circuits = self.inner.circuits.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(registry) = circuits.get(key).filter(|r| r.matches(threshold, cooldown)) {
            return registry.clone();
        }
        let registry = Arc::new(CircuitRegistry::new(threshold, cooldown));
        if circuits.insert(key.to_string(), registry.clone()).is_some() {
            tracing::debug!(policy = key, threshold, ?cooldown, "replaced circuit breakers");
        }
        registry
    }
}

fn rates_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs())
}

/// Policy controls for one run. Cheap to create per attempt.
#[derive(Debug, Clone)]
pub struct PolicyRuntime {
    key: String,
    snapshot: ExecutionPolicySnapshot,
    manager: PolicyRuntimeManager,
}

impl PolicyRuntime {
    pub fn snapshot(&self) -> &ExecutionPolicySnapshot {
        &self.snapshot
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for a concurrency slot; without a limit this returns at once.
    pub async fn acquire_slot(&self) -> SlotGuard {
        match self.snapshot.max_concurrency.filter(|c| *c > 0 && self.snapshot.enabled) {
            Some(capacity) => self.manager.gate(&self.key, capacity as usize).acquire().await,
            None => SlotGuard::unrestricted(),
        }
    }

    pub fn rate_limit_delay(&self, host: &str) -> Duration {
        match self.limiter() {
            Some(limiter) => limiter.wait_time(host),
            None => Duration::ZERO,
        }
    }

    pub fn circuit_remaining(&self, host: &str) -> Duration {
        match self.circuits() {
            Some(registry) => registry.with_breaker(host, |cb| cb.remaining()),
            None => Duration::ZERO,
        }
    }

    /// Returns the time the circuit stays open and whether this failure
    /// opened it.
    pub fn record_failure(&self, host: &str) -> (Duration, bool) {
        let Some(registry) = self.circuits() else {
            return (Duration::ZERO, false);
        };
        let (remaining, opened) = registry.with_breaker(host, |cb| {
            let opened = cb.record_failure();
            (cb.remaining(), opened)
        });
        if opened {
            tracing::warn!(policy = %self.key, host, remaining_ms = remaining.as_millis() as u64, "circuit opened");
        }
        (remaining, opened)
    }

    pub fn record_success(&self, host: &str) {
        if let Some(registry) = self.circuits() {
            registry.with_breaker(host, |cb| cb.record_success());
        }
    }

    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, &self.snapshot.retry_backoff)
    }

    fn limiter(&self) -> Option<Arc<PerHostRateLimiter>> {
        let rate = self.snapshot.per_host_qps.filter(|r| *r > 0.0 && self.snapshot.enabled)?;
        Some(self.manager.limiter(&self.key, rate))
    }

    fn circuits(&self) -> Option<Arc<CircuitRegistry>> {
        let threshold = self.snapshot.circuit_breaker_threshold;
        if threshold <= 0 || !self.snapshot.enabled {
            return None;
        }
        let cooldown = duration_from_secs(self.snapshot.retry_backoff.cooldown_seconds);
        let threshold = u32::try_from(threshold).unwrap_or(u32::MAX);
        Some(self.manager.circuits(&self.key, threshold, cooldown))
    }
}
