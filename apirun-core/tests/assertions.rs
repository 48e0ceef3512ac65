use std::collections::BTreeMap;

use apirun_core::types::normalize_assertions;
use apirun_core::{
    AssertionDefinition, AssertionEngine, DiffChange, ExecutionContext, ResponseContext, TemplateError,
};
use serde_json::{json, Value as JsonValue};

fn response() -> ResponseContext {
    let body = json!({"user": {"id": 7, "name": "ada"}, "items": [{"sku": "a"}, {"sku": "b"}]});
    ResponseContext {
        status_code: 200,
        headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
        body: body.to_string(),
        json: Some(body),
    }
}

fn evaluate(raw: JsonValue) -> (bool, Vec<apirun_core::AssertionResult>) {
    let defs = normalize_assertions(&raw);
    AssertionEngine::new()
        .evaluate(&defs, &response(), &mut ExecutionContext::new())
        .unwrap()
}

#[test]
fn every_assertion_is_reported_in_order() {
    let (passed, results) = evaluate(json!([
        {"operator": "status_code", "expected": 500},
        {"operator": "equals", "actual": "{{ response.json.user.id }}", "expected": 7},
        {"operator": "contains", "actual": "{{ response.body }}", "expected": "ada"},
        {"operator": "not_equals", "actual": 1, "expected": 1},
    ]));
    assert!(!passed);
    assert_eq!(results.len(), 4);
    let ops: Vec<_> = results.iter().map(|r| r.operator.as_str()).collect();
    assert_eq!(ops, vec!["status_code", "equals", "contains", "not_equals"]);
    let outcome: Vec<_> = results.iter().map(|r| r.passed).collect();
    assert_eq!(outcome, vec![false, true, true, false]);
    assert_eq!(results[0].message.as_deref(), Some("Status code did not match"));
    assert_eq!(results[3].message.as_deref(), Some("Values are equal"));
    assert_eq!(results[1].name.as_deref(), Some("assertion_1"));
}

#[test]
fn empty_definitions_pass() {
    let (passed, results) = evaluate(JsonValue::Null);
    assert!(passed);
    assert!(results.is_empty());
}

#[test]
fn equality_mismatch_carries_diff() {
    let (passed, results) = evaluate(json!([{
        "operator": "equals",
        "actual": "{{ response.json.user }}",
        "expected": {"id": 7, "name": "bob"},
    }]));
    assert!(!passed);
    let entries = results[0].diff_entries.as_ref().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "$.name");
    assert_eq!(entries[0].change, DiffChange::Changed);
    assert!(results[0].diff.as_ref().unwrap().starts_with("@@ $.name"));
}

#[test]
fn non_equality_mismatch_has_no_diff() {
    let (_, results) = evaluate(json!([{"operator": "contains", "actual": "abc", "expected": "z"}]));
    assert!(!results[0].passed);
    assert!(results[0].diff.is_none());
    assert!(results[0].diff_entries.is_none());
}

#[test]
fn jsonpath_operators() {
    let (passed, results) = evaluate(json!([
        {"operator": "jsonpath_equals", "path": "$.user.name", "expected": "ada"},
        {"operator": "jsonpath_contains", "path": "$.items[*].sku", "expected": "b"},
        {"operator": "jsonpath_equals", "path": "$.items[*].sku", "expected": ["a", "c"]},
        {"operator": "jsonpath_equals", "path": "", "expected": 1},
        {"operator": "jsonpath_equals", "path": "$[?(", "expected": 1},
    ]));
    assert!(!passed);
    assert!(results[0].passed);
    assert!(results[1].passed);
    assert!(!results[2].passed);
    assert_eq!(results[2].path.as_deref(), Some("$.items[*].sku"));
    assert_eq!(results[2].diff_entries.as_ref().unwrap()[0].path, "$[1]");
    assert_eq!(results[3].message.as_deref(), Some("JSONPath expression is required"));
    assert_eq!(results[4].message.as_deref(), Some("Invalid jsonpath expression: $[?("));
}

#[test]
fn regex_and_numeric_comparisons() {
    let (_, results) = evaluate(json!([
        {"operator": "regex", "actual": "{{ response.json.user.name }}", "expected": "^a.a$"},
        {"operator": "regex_match", "actual": 5, "expected": "5"},
        {"operator": "gt", "actual": "{{ response.json.user.id }}", "expected": 5},
        {"operator": "lt", "actual": "10", "expected": 3},
        {"operator": "gt", "actual": "many", "expected": 3},
        {"operator": "length", "actual": "{{ response.json.items }}", "expected": 2},
    ]));
    let outcome: Vec<_> = results.iter().map(|r| r.passed).collect();
    assert_eq!(outcome, vec![true, false, true, false, false, true]);
    assert_eq!(
        results[1].message.as_deref(),
        Some("Regex requires string actual and expected values")
    );
    assert_eq!(results[1].operator, "regex");
}

#[test]
fn missing_and_unknown_operators_fail_without_aborting() {
    let (passed, results) = evaluate(json!([
        {"name": "no-op", "expected": 1},
        {"operator": "Between", "expected": 1},
        {"operator": "status_code", "expected": 200},
    ]));
    assert!(!passed);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].operator, "unknown");
    assert_eq!(results[0].name.as_deref(), Some("no-op"));
    assert_eq!(results[0].message.as_deref(), Some("Assertion operator is required"));
    assert_eq!(results[1].operator, "between");
    assert_eq!(
        results[1].message.as_deref(),
        Some("Unsupported assertion operator 'between'")
    );
    assert!(results[2].passed);
}

#[test]
fn shorthand_object_form() {
    let (passed, results) = evaluate(json!({"status_code": 200}));
    assert!(passed);
    assert_eq!(results[0].expected, json!(200));
    assert_eq!(results[0].actual, json!(200));
}

#[test]
fn operands_can_reference_previous_steps() {
    let mut ctx = ExecutionContext::new();
    ctx.remember_step("create", json!({"json": {"id": 7}}));
    let defs = vec![AssertionDefinition::new("equals")
        .with_actual(json!("{{ response.json.user.id }}"))
        .with_expected(json!("{{ prev.create.json.id }}"))];
    let (passed, _) = AssertionEngine::new().evaluate(&defs, &response(), &mut ctx).unwrap();
    assert!(passed);
    assert_eq!(ctx.current_response.unwrap()["status_code"], json!(200));
}

#[test]
fn rendering_error_aborts_evaluation() {
    let defs = vec![
        AssertionDefinition::new("status_code").with_expected(json!(200)),
        AssertionDefinition::new("equals")
            .with_actual(json!("{{ response.jsonpath('$[?(') }}"))
            .with_expected(json!(1)),
    ];
    let err = AssertionEngine::new()
        .evaluate(&defs, &response(), &mut ExecutionContext::new())
        .unwrap_err();
    assert!(matches!(err, TemplateError::InvalidJsonPath { .. }));
}

#[test]
fn results_serialize_without_empty_fields() {
    let (_, results) = evaluate(json!([{"operator": "status_code", "expected": 200}]));
    let value = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(
        value,
        json!({"name": "assertion_0", "operator": "status_code", "passed": true, "actual": 200, "expected": 200})
    );
}
