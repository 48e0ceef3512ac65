use std::path::PathBuf;
use std::time::Duration;

use apirun_core::{duration_from_secs, ExecutionPolicySnapshot, MAX_WAIT_SECONDS};

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Used when the caller does not pass a per-attempt timeout.
    pub timeout: Duration,
    /// Cap applied to recorded request and response bodies.
    pub max_response_size_bytes: usize,
    /// Keys whose values are replaced in persisted payloads (case-insensitive).
    pub redact_fields: Vec<String>,
    pub redaction_placeholder: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_response_size_bytes: 1024 * 1024,
            redact_fields: ["authorization", "cookie", "set-cookie", "password"]
                .into_iter()
                .map(String::from)
                .collect(),
            redaction_placeholder: "***".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub runner: RunnerConfig,
    /// Stands in for every secret value in masked renderings.
    pub secret_placeholder: String,
    /// Base directory for file-backed datasets.
    pub dataset_dir: PathBuf,
    /// Applied when a case or suite runs without its own policy.
    pub default_policy: ExecutionPolicySnapshot,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            secret_placeholder: "***".to_string(),
            dataset_dir: PathBuf::from("."),
            default_policy: ExecutionPolicySnapshot::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `APIRUN_*` environment variables. Unparseable
    /// values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(secs) = lookup("APIRUN_REQUEST_TIMEOUT_SECONDS")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s > 0.0)
        {
            let secs = secs.min(MAX_WAIT_SECONDS);
            cfg.runner.timeout = duration_from_secs(secs);
            cfg.default_policy.timeout_seconds = secs.max(1.0);
        }
        if let Some(bytes) = lookup("APIRUN_MAX_RESPONSE_SIZE_BYTES").and_then(|v| v.trim().parse().ok()) {
            cfg.runner.max_response_size_bytes = bytes;
        }
        if let Some(fields) = lookup("APIRUN_REDACT_FIELDS") {
            cfg.runner.redact_fields = fields
                .split(',')
                .map(|f| f.trim().to_ascii_lowercase())
                .filter(|f| !f.is_empty())
                .collect();
        }
        if let Some(dir) = lookup("APIRUN_DATASET_DIR").filter(|d| !d.trim().is_empty()) {
            cfg.dataset_dir = PathBuf::from(dir);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("APIRUN_REQUEST_TIMEOUT_SECONDS", "5"),
            ("APIRUN_MAX_RESPONSE_SIZE_BYTES", "2048"),
            ("APIRUN_REDACT_FIELDS", "Authorization, x-api-key,,"),
            ("APIRUN_DATASET_DIR", "/data/sets"),
        ]);
        let cfg = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.runner.timeout, Duration::from_secs(5));
        assert_eq!(cfg.default_policy.timeout_seconds, 5.0);
        assert_eq!(cfg.runner.max_response_size_bytes, 2048);
        assert_eq!(cfg.runner.redact_fields, vec!["authorization", "x-api-key"]);
        assert_eq!(cfg.dataset_dir, PathBuf::from("/data/sets"));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let cfg = EngineConfig::from_lookup(|k| match k {
            "APIRUN_REQUEST_TIMEOUT_SECONDS" => Some("soon".to_string()),
            "APIRUN_MAX_RESPONSE_SIZE_BYTES" => Some("-1".to_string()),
            _ => None,
        });
        assert_eq!(cfg.runner.timeout, Duration::from_secs(30));
        assert_eq!(cfg.runner.max_response_size_bytes, 1024 * 1024);
    }
}
