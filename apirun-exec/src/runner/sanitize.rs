use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value as JsonValue};

static SECRET_TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{\s*secret\.[^{}]+\}\}").expect("valid regex"));

/// Scrubs payloads before they are persisted or logged.
#[derive(Debug, Clone)]
pub(crate) struct Sanitizer<'a> {
    redact_keys: &'a HashSet<String>,
    placeholder: &'a str,
    secret_values: Vec<String>,
}

impl<'a> Sanitizer<'a> {
    pub(crate) fn new(redact_keys: &'a HashSet<String>, placeholder: &'a str, secret_values: Vec<String>) -> Self {
        Self {
            redact_keys,
            placeholder,
            secret_values,
        }
    }

    pub(crate) fn sanitize(&self, value: &JsonValue) -> JsonValue {
        match value {
            JsonValue::Object(map) => JsonValue::Object(self.sanitize_map(map)),
            JsonValue::Array(items) => JsonValue::Array(items.iter().map(|v| self.sanitize(v)).collect()),
            JsonValue::String(s) => JsonValue::String(self.sanitize_str(s)),
            other => other.clone(),
        }
    }

    pub(crate) fn sanitize_map(&self, map: &Map<String, JsonValue>) -> Map<String, JsonValue> {
        map.iter()
            .map(|(k, v)| {
                let value = if self.redact_keys.contains(&k.to_ascii_lowercase()) {
                    JsonValue::String(self.placeholder.to_string())
                } else {
                    self.sanitize(v)
                };
                (k.clone(), value)
            })
            .collect()
    }

    fn sanitize_str(&self, s: &str) -> String {
        if SECRET_TEMPLATE.is_match(s) {
            return self.placeholder.to_string();
        }
        let mut masked = s.to_string();
        for secret in &self.secret_values {
            if !secret.is_empty() && masked.contains(secret.as_str()) {
                masked = masked.replace(secret.as_str(), self.placeholder);
            }
        }
        masked
    }
}
