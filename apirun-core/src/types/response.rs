use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

/// What templates and assertions see of an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseContext {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Full (untruncated) body text.
    pub body: String,
    pub json: Option<JsonValue>,
}

impl ResponseContext {
    pub fn to_value(&self) -> JsonValue {
        json!({
            "status_code": self.status_code,
            "headers": self.headers,
            "body": self.body,
            "json": self.json,
        })
    }
}
