//! Shared execution-policy runtime: concurrency gate, per-host rate limits,
//! per-host circuit breakers and retry backoff.

mod backoff;
mod circuit;
mod gate;
mod rate_limit;
mod runtime;

pub use backoff::{backoff_delay, backoff_delay_with};
pub use circuit::{CircuitBreaker, CircuitRegistry};
pub use gate::{ConcurrencyGate, SlotGuard};
pub use rate_limit::{normalize_host, PerHostRateLimiter, TokenBucket};
pub use runtime::{PolicyRuntime, PolicyRuntimeManager};
