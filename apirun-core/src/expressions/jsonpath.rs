use serde_json::Value as JsonValue;
use serde_json_path::JsonPath;

use crate::error::TemplateError;

/// Compile a JSONPath expression, accepting the dollar-less forms users
/// commonly write (`data.items[0]`, `[0].id`).
fn compile(expression: &str) -> Result<JsonPath, TemplateError> {
    let trimmed = expression.trim();
    let normalized = if trimmed.starts_with('$') {
        trimmed.to_string()
    } else if trimmed.starts_with('[') {
        format!("${trimmed}")
    } else {
        format!("$.{trimmed}")
    };
    JsonPath::parse(&normalized).map_err(|e| TemplateError::InvalidJsonPath {
        expression: expression.to_string(),
        message: e.to_string(),
    })
}

/// All nodes matched by `expression` in `target`, cloned.
pub fn query_jsonpath(target: &JsonValue, expression: &str) -> Result<Vec<JsonValue>, TemplateError> {
    let path = compile(expression)?;
    Ok(path.query(target).all().into_iter().cloned().collect())
}

/// Zero matches become `null`, one match the scalar, more a list.
pub fn collapse_matches(mut matches: Vec<JsonValue>) -> JsonValue {
    match matches.len() {
        0 => JsonValue::Null,
        1 => matches.remove(0),
        _ => JsonValue::Array(matches),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalizes_missing_root() {
        let doc = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        let m = query_jsonpath(&doc, "data.items[0].id").unwrap();
        assert_eq!(m, vec![json!(1)]);
        let m = query_jsonpath(&doc, "$.data.items[*].id").unwrap();
        assert_eq!(collapse_matches(m), json!([1, 2]));
    }

    #[test]
    fn invalid_expression_is_error() {
        let err = query_jsonpath(&json!({}), "$[?(").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidJsonPath { .. }));
    }

    #[test]
    fn collapse_empty_is_null() {
        assert_eq!(collapse_matches(vec![]), JsonValue::Null);
    }
}
