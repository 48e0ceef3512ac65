use regex::Regex;
use serde_json::Value as JsonValue;

use crate::context::ExecutionContext;
use crate::error::TemplateError;
use crate::expressions::{collapse_matches, query_jsonpath, render_value};
use crate::types::{AssertionDefinition, AssertionOperator, AssertionResult, ResponseContext};

use super::compare::{as_number, contains, json_eq, length_of};
use super::diff::{diff_json_with, format_diff_with, DiffOptions};

/// Scores a response against declared assertions.
#[derive(Debug, Clone, Default)]
pub struct AssertionEngine {
    diff: DiffOptions,
}

struct Operands {
    actual: JsonValue,
    expected: JsonValue,
    path: JsonValue,
}

struct Outcome {
    passed: bool,
    actual: JsonValue,
    expected: JsonValue,
    message: Option<String>,
    path: Option<String>,
}

impl Outcome {
    fn new(passed: bool, actual: JsonValue, expected: JsonValue, failure: &str) -> Self {
        Self {
            passed,
            actual,
            expected,
            message: (!passed).then(|| failure.to_string()),
            path: None,
        }
    }
}

impl AssertionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diff_options(diff: DiffOptions) -> Self {
        Self { diff }
    }

    /// Evaluate every definition in order.
    ///
    /// The response becomes the context's `current_response` first so that
    /// operands can reference `response.*`. All operands are rendered before
    /// any comparison runs: a rendering error aborts the whole evaluation
    /// with no partial results. Assertion failures are never errors.
    pub fn evaluate(
        &self,
        definitions: &[AssertionDefinition],
        response: &ResponseContext,
        ctx: &mut ExecutionContext,
    ) -> Result<(bool, Vec<AssertionResult>), TemplateError> {
        ctx.set_current_response(Some(response.to_value()));

        let rendered = definitions
            .iter()
            .map(|def| -> Result<Operands, TemplateError> {
                Ok(Operands {
                    actual: render_value(&def.actual, ctx)?,
                    expected: render_value(&def.expected, ctx)?,
                    path: render_value(&def.path, ctx)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let results: Vec<AssertionResult> = definitions
            .iter()
            .zip(rendered)
            .enumerate()
            .map(|(index, (def, operands))| self.evaluate_one(def, operands, response, index))
            .collect();
        let passed = results.iter().all(|r| r.passed);
        Ok((passed, results))
    }

    fn evaluate_one(
        &self,
        def: &AssertionDefinition,
        operands: Operands,
        response: &ResponseContext,
        index: usize,
    ) -> AssertionResult {
        let name = Some(def.display_name(index));
        let raw_op = def.operator_text();

        if raw_op.is_empty() {
            return failed(name, "unknown", "Assertion operator is required".to_string());
        }
        let Some(op) = AssertionOperator::parse(&raw_op) else {
            return failed(name, &raw_op, format!("Unsupported assertion operator '{raw_op}'"));
        };

        let outcome = apply(op, operands, response);
        let (diff, diff_entries) = if !outcome.passed && op.is_equality() {
            let entries = diff_json_with(&outcome.expected, &outcome.actual, &self.diff);
            let text = format_diff_with(&entries, self.diff.max_characters);
            (text, (!entries.is_empty()).then_some(entries))
        } else {
            (None, None)
        };

        let message = match (&outcome.message, &def.message) {
            (Some(_), Some(custom)) if !custom.trim().is_empty() => Some(custom.clone()),
            (m, _) => m.clone(),
        };

        AssertionResult {
            name,
            operator: op.as_str().to_string(),
            passed: outcome.passed,
            actual: outcome.actual,
            expected: outcome.expected,
            message,
            path: outcome.path,
            diff,
            diff_entries,
        }
    }
}

fn failed(name: Option<String>, operator: &str, message: String) -> AssertionResult {
    AssertionResult {
        name,
        operator: operator.to_string(),
        passed: false,
        actual: JsonValue::Null,
        expected: JsonValue::Null,
        message: Some(message),
        path: None,
        diff: None,
        diff_entries: None,
    }
}

fn apply(op: AssertionOperator, operands: Operands, response: &ResponseContext) -> Outcome {
    let Operands { actual, expected, path } = operands;
    match op {
        AssertionOperator::StatusCode => {
            let actual = JsonValue::from(response.status_code);
            let passed = json_eq(&actual, &expected);
            Outcome::new(passed, actual, expected, "Status code did not match")
        }
        AssertionOperator::Equals => {
            let passed = json_eq(&actual, &expected);
            Outcome::new(passed, actual, expected, "Values are not equal")
        }
        AssertionOperator::NotEquals => {
            let passed = !json_eq(&actual, &expected);
            Outcome::new(passed, actual, expected, "Values are equal")
        }
        AssertionOperator::Contains => {
            let passed = contains(&actual, &expected);
            Outcome::new(passed, actual, expected, "Expected value not found")
        }
        AssertionOperator::NotContains => {
            let passed = !contains(&actual, &expected);
            Outcome::new(passed, actual, expected, "Unexpected value present")
        }
        AssertionOperator::Regex => match (actual.as_str(), expected.as_str()) {
            (Some(text), Some(pattern)) => match Regex::new(pattern) {
                Ok(re) => {
                    let passed = re.is_match(text);
                    Outcome::new(passed, actual, expected, "Pattern did not match")
                }
                Err(e) => Outcome::new(false, actual, expected, &format!("Invalid regex pattern: {e}")),
            },
            _ => Outcome::new(
                false,
                actual,
                expected,
                "Regex requires string actual and expected values",
            ),
        },
        AssertionOperator::JsonPathEquals | AssertionOperator::JsonPathContains => {
            jsonpath_outcome(op, &path, expected, response)
        }
        AssertionOperator::Length => match length_of(&actual) {
            Some(len) => {
                let len = JsonValue::from(len);
                let passed = json_eq(&len, &expected);
                Outcome::new(passed, len, expected, "Length did not match")
            }
            None => Outcome::new(
                false,
                actual,
                expected,
                "Length requires a string, array or object actual value",
            ),
        },
        AssertionOperator::GreaterThan | AssertionOperator::LessThan => {
            let label = op.as_str();
            match (as_number(&actual), as_number(&expected)) {
                (Some(a), Some(e)) => {
                    let (passed, failure) = if op == AssertionOperator::GreaterThan {
                        (a > e, "Value is not greater than expected")
                    } else {
                        (a < e, "Value is not less than expected")
                    };
                    Outcome::new(passed, actual, expected, failure)
                }
                _ => Outcome::new(
                    false,
                    actual,
                    expected,
                    &format!("{label} requires numeric actual and expected values"),
                ),
            }
        }
    }
}

fn jsonpath_outcome(
    op: AssertionOperator,
    path: &JsonValue,
    expected: JsonValue,
    response: &ResponseContext,
) -> Outcome {
    let path_text = match path {
        JsonValue::String(s) if !s.trim().is_empty() => s.clone(),
        _ => return Outcome::new(false, JsonValue::Null, expected, "JSONPath expression is required"),
    };

    let empty = JsonValue::Object(Default::default());
    let payload = response.json.as_ref().filter(|j| !j.is_null()).unwrap_or(&empty);

    let mut outcome = match query_jsonpath(payload, &path_text) {
        Ok(matches) => {
            let actual = collapse_matches(matches);
            if op == AssertionOperator::JsonPathEquals {
                let passed = json_eq(&actual, &expected);
                Outcome::new(passed, actual, expected, "JSONPath equality assertion failed")
            } else {
                let passed = contains(&actual, &expected);
                Outcome::new(
                    passed,
                    actual,
                    expected,
                    "Expected value not present in JSONPath result",
                )
            }
        }
        Err(_) => Outcome::new(
            false,
            JsonValue::Null,
            expected,
            &format!("Invalid jsonpath expression: {path_text}"),
        ),
    };
    outcome.path = Some(path_text);
    outcome
}
