use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

const DEFAULT_POLICY_NAME: &str = "default";
const DEFAULT_RETRY_MAX_ATTEMPTS: i64 = 3;
const DEFAULT_TIMEOUT_SECONDS: f64 = 30.0;
const DEFAULT_CIRCUIT_THRESHOLD: i64 = 5;

/// Upper bound for `timeout_seconds` and `cooldown_seconds`.
pub const MAX_WAIT_SECONDS: f64 = 86_400.0;
/// Upper bound for the backoff base and cap.
pub const MAX_BACKOFF_SECONDS: f64 = 3_600.0;

/// Saturating seconds to [`Duration`]. Negative and NaN give zero.
pub fn duration_from_secs(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryBackoff {
    pub base_seconds: f64,
    pub max_seconds: f64,
    pub jitter_ratio: f64,
    pub retry_on_assertions: bool,
    /// Also the circuit breaker's open duration.
    pub cooldown_seconds: f64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            base_seconds: 1.5,
            max_seconds: 30.0,
            jitter_ratio: 0.5,
            retry_on_assertions: false,
            cooldown_seconds: 30.0,
        }
    }
}

impl RetryBackoff {
    /// Build from a raw document, filling defaults and clamping into range.
    pub fn from_value(raw: &JsonValue) -> Self {
        let d = Self::default();
        let base_seconds = coerce_f64(raw.get("base_seconds"), d.base_seconds).clamp(0.1, MAX_BACKOFF_SECONDS);
        let max_seconds = coerce_f64(raw.get("max_seconds"), d.max_seconds).clamp(base_seconds, MAX_BACKOFF_SECONDS);
        let jitter_ratio = coerce_f64(raw.get("jitter_ratio"), d.jitter_ratio).clamp(0.0, 1.0);
        let retry_on_assertions = raw
            .get("retry_on_assertions")
            .and_then(JsonValue::as_bool)
            .unwrap_or(d.retry_on_assertions);
        let cooldown_seconds = coerce_f64(raw.get("cooldown_seconds"), d.cooldown_seconds).clamp(1.0, MAX_WAIT_SECONDS);
        Self {
            base_seconds,
            max_seconds,
            jitter_ratio,
            retry_on_assertions,
            cooldown_seconds,
        }
    }
}

/// Immutable execution policy. Runtime state is shared by [`key`](Self::key),
/// so two snapshots with the same key share gates, buckets and breakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPolicySnapshot {
    pub id: Option<String>,
    pub name: String,
    pub max_concurrency: Option<u32>,
    pub per_host_qps: Option<f64>,
    pub retry_max_attempts: u32,
    pub retry_backoff: RetryBackoff,
    pub timeout_seconds: f64,
    /// `<= 0` disables the breaker.
    pub circuit_breaker_threshold: i64,
    pub enabled: bool,
}

impl Default for ExecutionPolicySnapshot {
    fn default() -> Self {
        Self {
            id: None,
            name: DEFAULT_POLICY_NAME.to_string(),
            max_concurrency: None,
            per_host_qps: None,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS as u32,
            retry_backoff: RetryBackoff::default(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_THRESHOLD,
            enabled: true,
        }
    }
}

impl ExecutionPolicySnapshot {
    pub fn key(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{DEFAULT_POLICY_NAME}:{}", self.name.to_lowercase()),
        }
    }

    pub fn timeout(&self) -> Duration {
        duration_from_secs(self.timeout_seconds.min(MAX_WAIT_SECONDS))
    }

    /// Normalize a raw policy document. `null` yields the default policy.
    pub fn from_value(raw: &JsonValue) -> Self {
        if raw.is_null() {
            return Self::default();
        }

        let id = match raw.get("id") {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let name = raw
            .get("name")
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_POLICY_NAME)
            .to_string();

        let max_concurrency = match raw.get("max_concurrency") {
            None | Some(JsonValue::Null) => None,
            Some(v) => u32::try_from(coerce_i64(Some(v), 0).max(0))
                .ok()
                .filter(|n| *n > 0),
        };
        let per_host_qps = match raw.get("per_host_qps") {
            None | Some(JsonValue::Null) => None,
            Some(v) => Some(coerce_f64(Some(v), 0.0)).filter(|q| *q > 0.0),
        };

        let retry_max_attempts =
            coerce_i64(raw.get("retry_max_attempts"), DEFAULT_RETRY_MAX_ATTEMPTS).clamp(1, 5) as u32;
        let timeout_seconds = coerce_f64(raw.get("timeout_seconds"), DEFAULT_TIMEOUT_SECONDS).clamp(1.0, MAX_WAIT_SECONDS);
        let circuit_breaker_threshold =
            coerce_i64(raw.get("circuit_breaker_threshold"), DEFAULT_CIRCUIT_THRESHOLD).max(1);
        let retry_backoff = RetryBackoff::from_value(raw.get("retry_backoff").unwrap_or(&JsonValue::Null));
        let enabled = raw.get("enabled").and_then(JsonValue::as_bool).unwrap_or(true);

        Self {
            id,
            name,
            max_concurrency,
            per_host_qps,
            retry_max_attempts,
            retry_backoff,
            timeout_seconds,
            circuit_breaker_threshold,
            enabled,
        }
    }
}

/// Non-finite input falls back.
fn coerce_f64(value: Option<&JsonValue>, fallback: f64) -> f64 {
    let parsed = match value {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|f: &f64| f.is_finite()).unwrap_or(fallback)
}

fn coerce_i64(value: Option<&JsonValue>, fallback: i64) -> i64 {
    match value {
        Some(JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(fallback),
        Some(JsonValue::String(s)) => s.trim().parse().unwrap_or(fallback),
        _ => fallback,
    }
}
