use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A stored test-case definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Request inputs (`method`, `url`, `headers`, `params`, `json`, `body`).
    /// Usually an object; a whole-string template must render to one.
    #[serde(default)]
    pub inputs: JsonValue,
    /// Dataset column -> dot-path inside `inputs`. Non-string entries are skipped.
    #[serde(default)]
    pub param_mapping: Map<String, JsonValue>,
    /// A list, an `{ "items": [...] }` object, or a shorthand object.
    #[serde(default)]
    pub assertions: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: Map<String, JsonValue>,
    #[serde(default)]
    pub variables: Map<String, JsonValue>,
    /// Stored (possibly encrypted) secret values, decrypted before use.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Map<String, JsonValue>,
    #[serde(default)]
    pub steps: Vec<SuiteStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteStep {
    /// Name under which the response is visible as `prev.<alias>`; defaults to `step_<n>`.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub case: Option<TestCase>,
    /// Deep-merged over the case's inputs.
    #[serde(default)]
    pub inputs: JsonValue,
    /// Rendered and written into the shared context's variables before the step runs.
    #[serde(default)]
    pub variables: Map<String, JsonValue>,
    /// Appended to the case's assertions.
    #[serde(default)]
    pub assertions: JsonValue,
}

impl SuiteStep {
    pub fn alias_or_default(&self, index: usize) -> String {
        match self.alias.as_deref().map(str::trim) {
            Some(alias) if !alias.is_empty() => alias.to_string(),
            _ => format!("step_{}", index + 1),
        }
    }
}
