use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::assertions::DiffEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionOperator {
    StatusCode,
    Equals,
    NotEquals,
    Contains,
    NotContains,
    Regex,
    JsonPathEquals,
    JsonPathContains,
    Length,
    GreaterThan,
    LessThan,
}

impl AssertionOperator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "status_code" => Some(Self::StatusCode),
            "equals" => Some(Self::Equals),
            "not_equals" => Some(Self::NotEquals),
            "contains" => Some(Self::Contains),
            "not_contains" => Some(Self::NotContains),
            "regex" | "regex_match" => Some(Self::Regex),
            "jsonpath_equals" => Some(Self::JsonPathEquals),
            "jsonpath_contains" => Some(Self::JsonPathContains),
            "length" => Some(Self::Length),
            "gt" => Some(Self::GreaterThan),
            "lt" => Some(Self::LessThan),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StatusCode => "status_code",
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::Regex => "regex",
            Self::JsonPathEquals => "jsonpath_equals",
            Self::JsonPathContains => "jsonpath_contains",
            Self::Length => "length",
            Self::GreaterThan => "gt",
            Self::LessThan => "lt",
        }
    }

    /// Operators whose mismatch produces a structural diff.
    pub fn is_equality(self) -> bool {
        matches!(self, Self::StatusCode | Self::Equals | Self::JsonPathEquals)
    }
}

/// One declared assertion, as found in a test case or suite step.
///
/// `operator` keeps the raw text so that an unknown operator can be reported
/// by name instead of being rejected at load time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionDefinition {
    pub operator: Option<String>,
    pub name: Option<String>,
    pub actual: JsonValue,
    pub expected: JsonValue,
    pub path: JsonValue,
    pub message: Option<String>,
}

impl AssertionDefinition {
    pub fn new(operator: &str) -> Self {
        Self {
            operator: Some(operator.to_string()),
            ..Self::default()
        }
    }

    pub fn with_actual(mut self, actual: JsonValue) -> Self {
        self.actual = actual;
        self
    }

    pub fn with_expected(mut self, expected: JsonValue) -> Self {
        self.expected = expected;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = JsonValue::String(path.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `None` for anything that is not an object.
    pub fn from_value(raw: &JsonValue) -> Option<Self> {
        let obj = raw.as_object()?;
        let text = |key: &str| match obj.get(key) {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        Some(Self {
            operator: text("operator"),
            name: text("name"),
            actual: obj.get("actual").cloned().unwrap_or(JsonValue::Null),
            expected: obj.get("expected").cloned().unwrap_or(JsonValue::Null),
            path: obj.get("path").cloned().unwrap_or(JsonValue::Null),
            message: text("message"),
        })
    }

    /// Lower-cased, trimmed operator text; empty when absent.
    pub fn operator_text(&self) -> String {
        self.operator
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default()
    }

    pub fn display_name(&self, index: usize) -> String {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("assertion_{index}"),
        }
    }
}

/// Accepts a list of definitions, an `{ "items": [...] }` wrapper, or a
/// shorthand object `{ "<operator>": <expected>, ... }`. Non-object list
/// entries are dropped.
pub fn normalize_assertions(raw: &JsonValue) -> Vec<AssertionDefinition> {
    match raw {
        JsonValue::Array(items) => items.iter().filter_map(AssertionDefinition::from_value).collect(),
        JsonValue::Object(map) => match map.get("items") {
            Some(JsonValue::Array(items)) => {
                items.iter().filter_map(AssertionDefinition::from_value).collect()
            }
            _ => map
                .iter()
                .filter(|(k, _)| k.as_str() != "items")
                .map(|(op, expected)| AssertionDefinition::new(op).with_expected(expected.clone()))
                .collect(),
        },
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub name: Option<String>,
    pub operator: String,
    pub passed: bool,
    #[serde(default)]
    pub actual: JsonValue,
    #[serde(default)]
    pub expected: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_entries: Option<Vec<DiffEntry>>,
}
