use serde_json::{Map, Value as JsonValue};

use crate::context::ExecutionContext;
use crate::error::TemplateError;

use super::expr::{parse_expr, ExprRoot, PathSegment};
use super::jsonpath::{collapse_matches, query_jsonpath};
use super::template::{parse_template, Segment};

/// Render every string inside `value` (recursively through objects and
/// arrays). Non-string scalars are returned unchanged.
pub fn render_value(value: &JsonValue, ctx: &ExecutionContext) -> Result<JsonValue, TemplateError> {
    match value {
        JsonValue::String(s) => render_str(s, ctx),
        JsonValue::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(JsonValue::Object(out))
        }
        JsonValue::Array(items) => items
            .iter()
            .map(|v| render_value(v, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        other => Ok(other.clone()),
    }
}

/// Render a single string.
///
/// A string that is exactly one placeholder yields the resolved value with
/// its type intact; otherwise each placeholder is interpolated as text and
/// `null` becomes the empty string.
pub fn render_str(input: &str, ctx: &ExecutionContext) -> Result<JsonValue, TemplateError> {
    if !input.contains("{{") || !input.contains("}}") {
        return Ok(JsonValue::String(input.to_string()));
    }

    let template = parse_template(input);
    if let Some(expr) = template.single_expr() {
        return resolve_expression(expr, ctx);
    }

    let mut out = String::with_capacity(input.len());
    for segment in &template.segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Expr(expr) => out.push_str(&value_to_string(&resolve_expression(expr, ctx)?)),
        }
    }
    Ok(JsonValue::String(out))
}

/// Resolve one expression (the text between `{{` and `}}`).
///
/// Missing keys, type mismatches and out-of-range indexes resolve to `null`.
pub fn resolve_expression(expr: &str, ctx: &ExecutionContext) -> Result<JsonValue, TemplateError> {
    let Some(parsed) = parse_expr(expr) else {
        return Ok(JsonValue::Null);
    };

    let start = match &parsed.root {
        ExprRoot::Variables => Node::Map(&ctx.variables),
        ExprRoot::Env => Node::Map(&ctx.environment),
        ExprRoot::Secret => Node::Map(&ctx.secrets),
        ExprRoot::Row => match &ctx.dataset_row {
            Some(row) => Node::Map(row),
            None => return Ok(JsonValue::Null),
        },
        ExprRoot::Prev(alias) => match ctx.previous_steps.get(alias) {
            Some(step) => Node::Value(step),
            None => return Ok(JsonValue::Null),
        },
        ExprRoot::Response => match &ctx.current_response {
            Some(resp) => Node::Value(resp),
            None => return Ok(JsonValue::Null),
        },
    };

    traverse(start, &parsed.path)
}

#[derive(Clone, Copy)]
enum Node<'a> {
    Map(&'a Map<String, JsonValue>),
    Value(&'a JsonValue),
}

impl<'a> Node<'a> {
    fn object(self) -> Option<&'a Map<String, JsonValue>> {
        match self {
            Node::Map(m) => Some(m),
            Node::Value(JsonValue::Object(m)) => Some(m),
            Node::Value(_) => None,
        }
    }

    fn to_owned_value(self) -> JsonValue {
        match self {
            Node::Map(m) => JsonValue::Object(m.clone()),
            Node::Value(v) => v.clone(),
        }
    }
}

fn traverse(start: Node<'_>, path: &[PathSegment]) -> Result<JsonValue, TemplateError> {
    let mut current = start;
    for (i, segment) in path.iter().enumerate() {
        if matches!(current, Node::Value(JsonValue::Null)) {
            return Ok(JsonValue::Null);
        }
        match segment {
            PathSegment::JsonPath(expression) => {
                let target = match current.object().and_then(|m| m.get("json")) {
                    Some(json) => json.clone(),
                    None => current.to_owned_value(),
                };
                if target.is_null() {
                    return Ok(JsonValue::Null);
                }
                let found = collapse_matches(query_jsonpath(&target, expression)?);
                return traverse(Node::Value(&found), &path[i + 1..]);
            }
            PathSegment::Key(key) => {
                let next = match current {
                    Node::Value(JsonValue::Array(items)) => index_list(items, key),
                    other => other.object().and_then(|m| m.get(key)),
                };
                match next {
                    Some(v) => current = Node::Value(v),
                    None => return Ok(JsonValue::Null),
                }
            }
        }
    }
    Ok(current.to_owned_value())
}

fn index_list<'a>(items: &'a [JsonValue], segment: &str) -> Option<&'a JsonValue> {
    let index: i64 = segment.parse().ok()?;
    let len = i64::try_from(items.len()).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        items.get(usize::try_from(resolved).ok()?)
    } else {
        None
    }
}

/// Text form used when a placeholder is interpolated into a larger string.
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn negative_index() {
        let items = vec![json!(1), json!(2), json!(3)];
        assert_eq!(index_list(&items, "-1"), Some(&json!(3)));
        assert_eq!(index_list(&items, "3"), None);
        assert_eq!(index_list(&items, "-4"), None);
        assert_eq!(index_list(&items, "x"), None);
    }

    #[test]
    fn interpolated_text_forms() {
        assert_eq!(value_to_string(&json!(null)), "");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!(1.5)), "1.5");
        assert_eq!(value_to_string(&json!({"a": 1})), r#"{"a":1}"#);
    }
}
