//! Executes one resolved request and records what was sent and received.

mod http;
mod sanitize;

pub use http::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient, RequestBody};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apirun_core::{render_value, ExecutionContext, ResponseContext, TemplateError};
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};

use crate::config::RunnerConfig;
use sanitize::Sanitizer;

type Object = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    NetworkError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    pub duration_ms: u64,
    pub status: RunStatus,
    pub response_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunMetrics {
    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[derive(Debug, Clone)]
pub struct RunnerResult {
    /// Sanitized record of the request as sent.
    pub request_payload: JsonValue,
    /// Sanitized `{status_code, headers, body: {text, truncated, note?}, json?}`.
    pub response_payload: JsonValue,
    pub metrics: RunMetrics,
    /// Unsanitized, untruncated snapshot also written to `current_response`.
    pub context: ResponseContext,
}

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("{0}")]
    InvalidInputs(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("transport failure: {error}")]
    Transport {
        error: HttpError,
        request_payload: JsonValue,
        metrics: RunMetrics,
    },
}

pub struct HttpRunner {
    client: Arc<dyn HttpClient>,
    config: RunnerConfig,
    redact_keys: HashSet<String>,
}

impl HttpRunner {
    pub fn new(config: RunnerConfig) -> Result<Self, HttpError> {
        Ok(Self::with_client(Arc::new(ReqwestHttpClient::new()?), config))
    }

    pub fn with_client(client: Arc<dyn HttpClient>, config: RunnerConfig) -> Self {
        let redact_keys = config.redact_fields.iter().map(|f| f.to_ascii_lowercase()).collect();
        Self {
            client,
            config,
            redact_keys,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Render `inputs` against `ctx` and send them. The unrendered inputs
    /// are what gets recorded.
    pub async fn execute(&self, inputs: &JsonValue, ctx: &mut ExecutionContext) -> Result<RunnerResult, RunnerError> {
        let JsonValue::Object(actual) = render_value(inputs, ctx)? else {
            return Err(RunnerError::InvalidInputs(
                "HTTP runner requires input payload to be an object".to_string(),
            ));
        };
        let display = inputs.as_object().cloned().unwrap_or_default();
        self.execute_prepared(&actual, &display, ctx, None).await
    }

    /// Send already-rendered `inputs`, recording `display` (usually the
    /// masked rendering) in their place.
    pub async fn execute_prepared(
        &self,
        inputs: &Object,
        display: &Object,
        ctx: &mut ExecutionContext,
        timeout: Option<Duration>,
    ) -> Result<RunnerResult, RunnerError> {
        let sanitizer = Sanitizer::new(&self.redact_keys, &self.config.redaction_placeholder, ctx.secret_values());
        let display = sanitizer.sanitize_map(display);
        let cap = self.config.max_response_size_bytes;

        let method = match inputs.get("method") {
            Some(JsonValue::String(m)) if !m.trim().is_empty() => m.trim().to_ascii_uppercase(),
            None | Some(JsonValue::Null) | Some(JsonValue::String(_)) => "GET".to_string(),
            Some(other) => other.to_string().to_ascii_uppercase(),
        };
        let url = match inputs.get("url") {
            Some(JsonValue::String(u)) if !u.is_empty() => u.clone(),
            _ => return Err(RunnerError::InvalidInputs("HTTP runner requires a non-empty URL".to_string())),
        };
        url::Url::parse(&url).map_err(|e| RunnerError::InvalidInputs(format!("invalid URL {url:?}: {e}")))?;

        let record_url = match display.get("url") {
            Some(JsonValue::String(u)) if !u.is_empty() => u.clone(),
            _ => url.clone(),
        };
        let headers = normalize_mapping(inputs.get("headers"));
        let params = normalize_mapping(inputs.get("params"));
        let display_headers = normalize_mapping(display.get("headers"));
        let display_params = normalize_mapping(display.get("params"));

        let mut record = Object::new();
        record.insert("method".to_string(), JsonValue::String(method.clone()));
        record.insert("url".to_string(), JsonValue::String(record_url));
        for (key, shown, actual) in [("headers", display_headers, &headers), ("params", display_params, &params)] {
            if !shown.is_empty() {
                record.insert(key.to_string(), JsonValue::Object(shown));
            } else if !actual.is_empty() {
                record.insert(key.to_string(), JsonValue::Object(actual.clone()));
            }
        }

        let body = if let Some(json) = inputs.get("json").filter(|j| !j.is_null()) {
            let shown = display.get("json").filter(|v| !v.is_null()).unwrap_or(json);
            record.insert("json".to_string(), shown.clone());
            RequestBody::Json(json.clone())
        } else {
            match inputs.get("body") {
                None | Some(JsonValue::Null) => RequestBody::Empty,
                Some(body @ (JsonValue::Object(_) | JsonValue::Array(_))) => {
                    let shown = display
                        .get("body")
                        .filter(|v| v.is_object() || v.is_array())
                        .unwrap_or(body);
                    record.insert("json".to_string(), shown.clone());
                    RequestBody::Json(body.clone())
                }
                Some(body) => {
                    let text = scalar_text(body);
                    let shown = match display.get("body") {
                        Some(JsonValue::String(s)) => s.clone(),
                        _ => text.clone(),
                    };
                    record.insert("body".to_string(), truncate_text(shown.as_bytes(), cap).to_value());
                    RequestBody::Raw(text.into_bytes())
                }
            }
        };
        let request_payload = sanitizer.sanitize(&JsonValue::Object(record));

        let request = HttpRequest {
            method: method.clone(),
            url: url.clone(),
            headers: to_pairs(&headers),
            query: to_pairs(&params),
            body,
        };
        let timeout = timeout.unwrap_or(self.config.timeout);

        let started = Instant::now();
        let outcome = self.client.send(request, timeout).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(r) => r,
            Err(error) => {
                tracing::warn!(%method, %url, error = %error, duration_ms, "http request failed");
                let metrics = RunMetrics {
                    duration_ms,
                    status: RunStatus::NetworkError,
                    response_size: 0,
                    status_code: None,
                    error: Some(error.to_string()),
                };
                return Err(RunnerError::Transport {
                    error,
                    request_payload,
                    metrics,
                });
            }
        };

        let text = String::from_utf8_lossy(&response.body).into_owned();
        let json = serde_json::from_slice::<JsonValue>(&response.body).ok();

        let mut response_record = json!({
            "status_code": response.status,
            "headers": response.headers,
            "body": truncate_text(&response.body, cap).to_value(),
        });
        if let (Some(j), Some(obj)) = (&json, response_record.as_object_mut()) {
            obj.insert("json".to_string(), j.clone());
        }

        let metrics = RunMetrics {
            duration_ms,
            status: RunStatus::Completed,
            response_size: response.body.len(),
            status_code: Some(response.status),
            error: None,
        };
        let context = ResponseContext {
            status_code: response.status,
            headers: response.headers,
            body: text,
            json,
        };
        ctx.set_current_response(Some(context.to_value()));
        tracing::debug!(%method, %url, status = context.status_code, duration_ms, "http request completed");

        Ok(RunnerResult {
            request_payload,
            response_payload: sanitizer.sanitize(&response_record),
            metrics,
            context,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BodyRecord {
    text: String,
    truncated: bool,
    note: Option<String>,
}

impl BodyRecord {
    fn to_value(&self) -> JsonValue {
        let mut v = json!({"text": self.text, "truncated": self.truncated});
        if let (Some(note), Some(obj)) = (&self.note, v.as_object_mut()) {
            obj.insert("note".to_string(), JsonValue::String(note.clone()));
        }
        v
    }
}

/// Cut to exactly `limit` bytes, decoding leniently, and say so.
pub(crate) fn truncate_text(bytes: &[u8], limit: usize) -> BodyRecord {
    if bytes.len() <= limit {
        return BodyRecord {
            text: String::from_utf8_lossy(bytes).into_owned(),
            truncated: false,
            note: None,
        };
    }
    BodyRecord {
        text: String::from_utf8_lossy(&bytes[..limit]).into_owned(),
        truncated: true,
        note: Some(format!("Body truncated to {limit} bytes from {} bytes", bytes.len())),
    }
}

/// Scalars become strings; nested values and nulls are kept as-is.
fn normalize_mapping(value: Option<&JsonValue>) -> Object {
    let Some(JsonValue::Object(map)) = value else {
        return Object::new();
    };
    map.iter()
        .map(|(k, v)| {
            let v = match v {
                JsonValue::Object(_) | JsonValue::Array(_) | JsonValue::Null => v.clone(),
                other => JsonValue::String(scalar_text(other)),
            };
            (k.clone(), v)
        })
        .collect()
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Wire form of a normalized mapping: lists repeat the key, objects are
/// sent as JSON text, nulls are dropped.
fn to_pairs(map: &Object) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (k, v) in map {
        match v {
            JsonValue::Null => {}
            JsonValue::Array(items) => {
                pairs.extend(items.iter().filter(|i| !i.is_null()).map(|i| (k.clone(), scalar_text(i))))
            }
            other => pairs.push((k.clone(), scalar_text(other))),
        }
    }
    pairs
}
