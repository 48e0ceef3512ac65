use regex::Regex;
use serde_json::{Map, Value as JsonValue};

use crate::error::{ValidationError, Violation};
use crate::expressions::query_jsonpath;
use crate::types::{normalize_assertions, AssertionOperator};

const MAX_NAME_LEN: usize = 128;

#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.violations))
        }
    }

    pub(crate) fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    pub fn validate_assertions(&mut self, path: &str, raw: &JsonValue) {
        match raw {
            JsonValue::Null => {}
            JsonValue::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.validate_definition(&format!("{path}[{i}]"), item);
                }
            }
            JsonValue::Object(map) => match map.get("items") {
                Some(JsonValue::Array(items)) => {
                    for (i, item) in items.iter().enumerate() {
                        self.validate_definition(&format!("{path}.items[{i}]"), item);
                    }
                }
                Some(_) => self.push(format!("{path}.items"), "must be an array"),
                None => {
                    // Shorthand form: only the operator names can be wrong.
                    for def in normalize_assertions(raw) {
                        let op = def.operator_text();
                        if AssertionOperator::parse(&op).is_none() {
                            self.push(format!("{path}.{op}"), format!("unsupported operator '{op}'"));
                        }
                    }
                }
            },
            _ => self.push(path, "must be an array or an object"),
        }
    }

    fn validate_definition(&mut self, path: &str, raw: &JsonValue) {
        let Some(obj) = raw.as_object() else {
            self.push(path, "must be an object");
            return;
        };

        if let Some(name) = obj.get("name") {
            match name.as_str() {
                Some(n) if n.chars().count() > MAX_NAME_LEN => {
                    self.push(format!("{path}.name"), "must be at most 128 characters")
                }
                Some(_) => {}
                None if name.is_null() => {}
                None => self.push(format!("{path}.name"), "must be a string"),
            }
        }

        let op_text = match obj.get("operator").and_then(JsonValue::as_str).map(str::trim) {
            Some(op) if !op.is_empty() => op.to_ascii_lowercase(),
            _ => {
                self.push(format!("{path}.operator"), "is required");
                return;
            }
        };
        let Some(op) = AssertionOperator::parse(&op_text) else {
            self.push(
                format!("{path}.operator"),
                format!("unsupported operator '{op_text}'"),
            );
            return;
        };

        let expected_path = format!("{path}.expected");
        match op {
            AssertionOperator::StatusCode => match field(obj, "expected") {
                Field::Missing => self.push(expected_path, "is required"),
                Field::Templated => {}
                Field::Value(v) => match v.as_i64() {
                    Some(code) if (100..=599).contains(&code) => {}
                    Some(_) => self.push(expected_path, "status code must be between 100 and 599"),
                    None => self.push(expected_path, "status_code assertions require an integer expected value"),
                },
            },
            AssertionOperator::Equals
            | AssertionOperator::NotEquals
            | AssertionOperator::Contains
            | AssertionOperator::NotContains => {
                self.require(obj, path, "actual");
                self.require(obj, path, "expected");
            }
            AssertionOperator::Regex => {
                self.require(obj, path, "actual");
                match field(obj, "expected") {
                    Field::Missing => self.push(expected_path, "is required"),
                    Field::Templated => {}
                    Field::Value(JsonValue::String(p)) if !p.trim().is_empty() => {
                        if let Err(e) = Regex::new(p) {
                            self.push(expected_path, format!("invalid regex pattern: {e}"));
                        }
                    }
                    Field::Value(_) => {
                        self.push(expected_path, "regex assertions require a non-empty pattern string")
                    }
                }
            }
            AssertionOperator::JsonPathEquals | AssertionOperator::JsonPathContains => {
                self.require(obj, path, "expected");
                match field(obj, "path") {
                    Field::Templated => {}
                    Field::Value(JsonValue::String(p)) if !p.trim().is_empty() => {
                        if let Err(e) = query_jsonpath(&JsonValue::Null, p) {
                            self.push(format!("{path}.path"), e.to_string());
                        }
                    }
                    _ => self.push(
                        format!("{path}.path"),
                        "JSONPath assertions require a non-empty path expression",
                    ),
                }
            }
            AssertionOperator::Length => {
                self.require(obj, path, "actual");
                match field(obj, "expected") {
                    Field::Missing => self.push(expected_path, "is required"),
                    Field::Templated => {}
                    Field::Value(v) => match v.as_i64() {
                        Some(n) if n >= 0 => {}
                        Some(_) => self.push(expected_path, "length assertions require a non-negative expected value"),
                        None => self.push(expected_path, "length assertions require an integer expected value"),
                    },
                }
            }
            AssertionOperator::GreaterThan | AssertionOperator::LessThan => {
                self.require(obj, path, "actual");
                match field(obj, "expected") {
                    Field::Missing => self.push(expected_path, "is required"),
                    Field::Templated => {}
                    Field::Value(JsonValue::Number(_)) => {}
                    Field::Value(_) => self.push(
                        expected_path,
                        format!("{} assertions require a numeric expected value", op.as_str()),
                    ),
                }
            }
        }
    }

    fn require(&mut self, obj: &Map<String, JsonValue>, path: &str, key: &str) {
        if !obj.contains_key(key) {
            self.push(format!("{path}.{key}"), "is required");
        }
    }
}

enum Field<'a> {
    Missing,
    /// A `{{ ... }}` string; its type is only known after rendering.
    Templated,
    Value(&'a JsonValue),
}

fn field<'a>(obj: &'a Map<String, JsonValue>, key: &str) -> Field<'a> {
    match obj.get(key) {
        None => Field::Missing,
        Some(JsonValue::String(s)) if s.contains("{{") && s.contains("}}") => Field::Templated,
        Some(v) => Field::Value(v),
    }
}
