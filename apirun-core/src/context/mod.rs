use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

/// Scoped data a template can read during one iteration.
///
/// The context is a plain value: cloning it deep-copies every map, so a
/// masked clone or a per-step fork never aliases the original.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
    pub variables: Map<String, JsonValue>,
    /// Resolved environment snapshot (`base_url`, `headers`, `variables`, ...).
    pub environment: Map<String, JsonValue>,
    pub dataset_row: Option<Map<String, JsonValue>>,
    /// Either real secret values or a placeholder per key, never both.
    pub secrets: Map<String, JsonValue>,
    pub previous_steps: BTreeMap<String, JsonValue>,
    pub current_response: Option<JsonValue>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remember_step(&mut self, alias: impl Into<String>, response: JsonValue) {
        self.previous_steps.insert(alias.into(), response);
    }

    pub fn set_current_response(&mut self, response: Option<JsonValue>) {
        self.current_response = response;
    }

    /// A copy of this context whose `secrets` are replaced wholesale.
    pub fn with_secrets(&self, secrets: Map<String, JsonValue>) -> Self {
        let mut ctx = self.clone();
        ctx.secrets = secrets;
        ctx
    }

    /// Non-empty string secret values, used to scrub persisted payloads.
    pub fn secret_values(&self) -> Vec<String> {
        self.secrets
            .values()
            .filter_map(|v| match v {
                JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
                JsonValue::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn with_secrets_does_not_touch_original() {
        let mut ctx = ExecutionContext::new();
        ctx.secrets.insert("token".to_string(), json!("real"));
        let mut masked = Map::new();
        masked.insert("token".to_string(), json!("***"));

        let other = ctx.with_secrets(masked);
        assert_eq!(ctx.secrets["token"], json!("real"));
        assert_eq!(other.secrets["token"], json!("***"));
    }

    #[test]
    fn remember_step_overwrites_alias() {
        let mut ctx = ExecutionContext::new();
        ctx.remember_step("login", json!({"status_code": 500}));
        ctx.remember_step("login", json!({"status_code": 200}));
        assert_eq!(ctx.previous_steps.len(), 1);
        assert_eq!(ctx.previous_steps["login"]["status_code"], json!(200));
    }
}
