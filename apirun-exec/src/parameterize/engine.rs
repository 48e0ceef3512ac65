use apirun_core::{render_str, render_value, Environment, ExecutionContext, TestCase};
use serde_json::{Map, Value as JsonValue};

use super::ParameterizationError;
use crate::secrets::SecretMap;

type Object = Map<String, JsonValue>;

/// Inputs for one iteration, rendered twice: once with real secrets for the
/// request itself and once with placeholders for anything that is persisted
/// or logged.
#[derive(Debug, Clone)]
pub struct PreparedIteration {
    pub index: usize,
    pub inputs: Object,
    pub masked_inputs: Object,
    /// Context holding the real secrets; assertions are evaluated against it.
    pub context: ExecutionContext,
    pub dataset_row: Option<Object>,
}

#[derive(Debug, Clone)]
pub struct ParameterizationEngine {
    placeholder: String,
}

impl Default for ParameterizationEngine {
    fn default() -> Self {
        Self::new("***")
    }
}

impl ParameterizationEngine {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    /// One iteration per dataset row, or exactly one with an empty row when
    /// there are none.
    pub fn prepare_iterations(
        &self,
        case: &TestCase,
        environment: Option<&Environment>,
        secrets: &SecretMap,
        dataset_rows: &[Object],
    ) -> Result<Vec<PreparedIteration>, ParameterizationError> {
        let env_ctx = environment_context(environment);
        let env_vars = env_ctx
            .get("variables")
            .and_then(JsonValue::as_object)
            .cloned()
            .unwrap_or_default();

        let empty = [Object::new()];
        let rows: &[Object] = if dataset_rows.is_empty() { &empty } else { dataset_rows };

        rows.iter()
            .enumerate()
            .map(|(index, row)| {
                let mut raw_inputs = match &case.inputs {
                    JsonValue::Null => JsonValue::Object(Object::new()),
                    other => other.clone(),
                };
                if let JsonValue::Object(obj) = &mut raw_inputs {
                    apply_param_mapping(obj, row, &case.param_mapping);
                }

                let base = ExecutionContext {
                    variables: env_vars.clone(),
                    environment: env_ctx.clone(),
                    dataset_row: Some(row.clone()),
                    ..ExecutionContext::default()
                };
                let mut prepared = self.prepare(&raw_inputs, &base, environment, secrets)?;
                prepared.index = index;
                prepared.dataset_row = (!row.is_empty()).then(|| row.clone());
                Ok(prepared)
            })
            .collect()
    }

    /// Prepare a single suite step against the suite's running context, so
    /// that `prev.*` and suite variables stay visible.
    pub fn prepare_step(
        &self,
        inputs: &JsonValue,
        suite_ctx: &ExecutionContext,
        environment: Option<&Environment>,
        secrets: &SecretMap,
    ) -> Result<PreparedIteration, ParameterizationError> {
        let mut base = suite_ctx.clone();
        base.environment = environment_context(environment);
        let raw = match inputs {
            JsonValue::Null => JsonValue::Object(Object::new()),
            other => other.clone(),
        };
        self.prepare(&raw, &base, environment, secrets)
    }

    fn prepare(
        &self,
        raw_inputs: &JsonValue,
        base: &ExecutionContext,
        environment: Option<&Environment>,
        secrets: &SecretMap,
    ) -> Result<PreparedIteration, ParameterizationError> {
        let real_secrets: Object = secrets
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.expose_str().into_owned())))
            .collect();
        let masked_secrets: Object = secrets
            .keys()
            .map(|k| (k.clone(), JsonValue::String(self.placeholder.clone())))
            .collect();

        let real_ctx = base.with_secrets(real_secrets);
        let masked_ctx = base.with_secrets(masked_secrets);

        let inputs = finalize(render_value(raw_inputs, &real_ctx)?, environment, &real_ctx)?;
        let masked_inputs = finalize(render_value(raw_inputs, &masked_ctx)?, environment, &masked_ctx)?;

        Ok(PreparedIteration {
            index: 0,
            inputs,
            masked_inputs,
            dataset_row: real_ctx.dataset_row.clone().filter(|r| !r.is_empty()),
            context: real_ctx,
        })
    }
}

/// Environment as seen by `env.*`: id, name, base_url, headers, variables,
/// plus each variable at the top level unless that name is taken.
fn environment_context(environment: Option<&Environment>) -> Object {
    let mut ctx = Object::new();
    let Some(env) = environment else {
        return ctx;
    };
    if let Some(id) = &env.id {
        ctx.insert("id".to_string(), JsonValue::String(id.clone()));
    }
    ctx.insert("name".to_string(), JsonValue::String(env.name.clone()));
    if let Some(base) = env.base_url.as_deref().filter(|b| !b.is_empty()) {
        ctx.insert("base_url".to_string(), JsonValue::String(base.to_string()));
    }
    if !env.headers.is_empty() {
        ctx.insert("headers".to_string(), JsonValue::Object(env.headers.clone()));
    }
    if !env.variables.is_empty() {
        ctx.insert("variables".to_string(), JsonValue::Object(env.variables.clone()));
        for (k, v) in &env.variables {
            ctx.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
    ctx
}

fn apply_param_mapping(inputs: &mut Object, row: &Object, mapping: &Object) {
    for (column, target) in mapping {
        let JsonValue::String(path) = target else {
            continue;
        };
        let value = row.get(column).cloned().unwrap_or(JsonValue::Null);
        assign_path(inputs, path, value);
    }
}

/// Write `value` at a dot-path, creating (or replacing non-object)
/// intermediate nodes with empty objects.
fn assign_path(payload: &mut Object, path: &str, value: JsonValue) {
    let segments: Vec<&str> = path.split('.').map(str::trim).filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = payload;
    for segment in parents {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| JsonValue::Object(Object::new()));
        if !slot.is_object() {
            *slot = JsonValue::Object(Object::new());
        }
        let JsonValue::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert(last.to_string(), value);
}

fn finalize(
    rendered: JsonValue,
    environment: Option<&Environment>,
    ctx: &ExecutionContext,
) -> Result<Object, ParameterizationError> {
    let JsonValue::Object(mut inputs) = rendered else {
        return Err(ParameterizationError::InputsNotObject);
    };
    let Some(env) = environment else {
        return Ok(inputs);
    };

    let mut headers = match render_value(&JsonValue::Object(env.headers.clone()), ctx)? {
        JsonValue::Object(h) => h,
        _ => Object::new(),
    };
    if let Some(JsonValue::Object(case_headers)) = inputs.get("headers") {
        for (k, v) in case_headers {
            headers.insert(k.clone(), v.clone());
        }
    }
    if !headers.is_empty() {
        inputs.insert("headers".to_string(), JsonValue::Object(headers));
    }

    if let Some(base) = env.base_url.as_deref().filter(|b| !b.is_empty()) {
        if let JsonValue::String(base) = render_str(base, ctx)? {
            if let Some(JsonValue::String(url)) = inputs.get("url") {
                if !base.is_empty() && !url.is_empty() && !is_absolute(url) {
                    let joined = format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/'));
                    inputs.insert("url".to_string(), JsonValue::String(joined));
                }
            }
        }
    }
    Ok(inputs)
}

fn is_absolute(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assign_path_creates_intermediates() {
        let mut payload = json!({"json": {"user": "flat"}}).as_object().cloned().unwrap();
        assign_path(&mut payload, "json.user.email", json!("a@b.c"));
        assign_path(&mut payload, " params . page ", json!(2));
        assign_path(&mut payload, "..", json!("ignored"));
        assert_eq!(
            JsonValue::Object(payload),
            json!({"json": {"user": {"email": "a@b.c"}}, "params": {"page": 2}})
        );
    }

    #[test]
    fn absolute_urls_are_detected_case_insensitively() {
        assert!(is_absolute("HTTPS://x.test/a"));
        assert!(!is_absolute("/users"));
        assert!(!is_absolute("users/http://"));
    }
}
