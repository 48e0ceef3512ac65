use std::time::Duration;

use apirun_core::ExecutionContext;
use apirun_exec::config::RunnerConfig;
use apirun_exec::runner::{HttpRunner, RunStatus, RunnerError};
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runner(cap: usize) -> HttpRunner {
    HttpRunner::new(RunnerConfig {
        max_response_size_bytes: cap,
        timeout: Duration::from_secs(5),
        ..RunnerConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn oversized_body_is_truncated_to_exactly_the_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_string("abcdefghijk"))
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    let inputs = json!({"url": format!("{}/big", server.uri())});
    let result = runner(10).execute(&inputs, &mut ctx).await.unwrap();

    assert_eq!(
        result.response_payload["body"],
        json!({
            "text": "abcdefghij",
            "truncated": true,
            "note": "Body truncated to 10 bytes from 11 bytes"
        })
    );
    assert_eq!(result.metrics.response_size, 11);
    assert_eq!(result.metrics.status, RunStatus::Completed);
    assert_eq!(result.context.body, "abcdefghijk");
    assert_eq!(result.request_payload["method"], json!("GET"));
}

#[tokio::test]
async fn json_responses_update_the_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"name": "ada", "age": 36})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7})))
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    ctx.variables.insert("age".to_string(), json!(36));
    let inputs = json!({
        "method": "post",
        "url": format!("{}/users", server.uri()),
        "body": {"name": "ada", "age": "{{ variables.age }}"}
    });
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();

    assert_eq!(result.context.status_code, 201);
    assert_eq!(result.response_payload["json"], json!({"id": 7}));
    assert_eq!(result.metrics.status_code, Some(201));
    let current = ctx.current_response.unwrap();
    assert_eq!(current["status_code"], json!(201));
    assert_eq!(current["json"]["id"], json!(7));
    // The record shows what was written, not what was sent.
    assert_eq!(result.request_payload["json"]["age"], json!("{{ variables.age }}"));
}

#[tokio::test]
async fn secrets_and_sensitive_fields_are_redacted_from_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer abc123"))
        .and(query_param("key", "abc123"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sid=1")
                .set_body_string("hello abc123"),
        )
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    ctx.secrets.insert("token".to_string(), json!("abc123"));
    let inputs = json!({
        "url": format!("{}/me", server.uri()),
        "headers": {"Authorization": "Bearer {{ secret.token }}"},
        "params": {"key": "{{ secret.token }}", "page": 2}
    });
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();

    assert_eq!(result.context.status_code, 200);
    assert_eq!(result.request_payload["headers"]["Authorization"], json!("***"));
    assert_eq!(result.request_payload["params"]["key"], json!("***"));
    assert_eq!(result.request_payload["params"]["page"], json!("2"));
    assert_eq!(result.response_payload["headers"]["set-cookie"], json!("***"));
    assert_eq!(result.response_payload["body"]["text"], json!("hello ***"));
    assert!(!result.response_payload.to_string().contains("abc123"));
}

#[tokio::test]
async fn scalar_bodies_are_sent_raw_and_recorded_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/note"))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    let inputs = json!({"method": "PUT", "url": format!("{}/note", server.uri()), "body": "hello"});
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();

    assert_eq!(result.context.status_code, 204);
    assert_eq!(result.request_payload["body"], json!({"text": "hello", "truncated": false}));
    assert_eq!(result.context.json, None);
}

#[tokio::test]
async fn transport_failures_carry_payload_and_metrics() {
    let mut ctx = ExecutionContext::new();
    let inputs = json!({"method": "DELETE", "url": "http://127.0.0.1:1/gone"});
    let err = runner(1024).execute(&inputs, &mut ctx).await.unwrap_err();

    match err {
        RunnerError::Transport {
            request_payload,
            metrics,
            ..
        } => {
            assert_eq!(request_payload["method"], json!("DELETE"));
            assert_eq!(request_payload["url"], json!("http://127.0.0.1:1/gone"));
            assert_eq!(metrics.status, RunStatus::NetworkError);
            assert_eq!(metrics.response_size, 0);
            assert_eq!(metrics.to_value()["status"], json!("network_error"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(ctx.current_response, None);
}

#[tokio::test]
async fn missing_or_invalid_urls_are_input_errors() {
    let mut ctx = ExecutionContext::new();
    let err = runner(16).execute(&json!({"method": "GET"}), &mut ctx).await.unwrap_err();
    assert!(matches!(err, RunnerError::InvalidInputs(_)));

    let err = runner(16).execute(&json!({"url": "/relative"}), &mut ctx).await.unwrap_err();
    assert!(matches!(err, RunnerError::InvalidInputs(_)));

    let err = runner(16).execute(&json!(["not", "an", "object"]), &mut ctx).await.unwrap_err();
    assert!(matches!(err, RunnerError::InvalidInputs(_)));
}

#[tokio::test]
async fn json_wins_over_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/both"))
        .and(body_json(json!({"from": "json"})))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    let inputs = json!({
        "method": "POST",
        "url": format!("{}/both", server.uri()),
        "json": {"from": "json"},
        "body": "from body"
    });
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();

    assert_eq!(result.context.status_code, 200);
    assert_eq!(result.request_payload["json"], json!({"from": "json"}));
    assert!(result.request_payload.get("body").is_none());
}

#[tokio::test]
async fn null_json_falls_back_to_body_or_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/raw"))
        .and(body_string("plain"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/empty"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    let inputs = json!({"method": "POST", "url": format!("{}/raw", server.uri()), "json": null, "body": "plain"});
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();
    assert_eq!(result.context.status_code, 200);
    assert!(result.request_payload.get("json").is_none());

    let inputs = json!({"method": "POST", "url": format!("{}/empty", server.uri()), "json": null});
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();
    assert_eq!(result.context.status_code, 204);
    assert!(result.request_payload.get("json").is_none());
    assert!(result.request_payload.get("body").is_none());
}

#[tokio::test]
async fn absent_or_blank_method_defaults_to_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .expect(3)
        .mount(&server)
        .await;

    let url = format!("{}/ping", server.uri());
    for inputs in [
        json!({"url": url}),
        json!({"url": url, "method": "   "}),
        json!({"url": url, "method": null}),
    ] {
        let mut ctx = ExecutionContext::new();
        let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();
        assert_eq!(result.request_payload["method"], json!("GET"));
        assert_eq!(result.context.body, "pong");
    }
}

#[tokio::test]
async fn redirects_are_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{}/new", server.uri()).as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"moved": true})))
        .mount(&server)
        .await;

    let mut ctx = ExecutionContext::new();
    let inputs = json!({"url": format!("{}/old", server.uri())});
    let result = runner(1024).execute(&inputs, &mut ctx).await.unwrap();

    assert_eq!(result.context.status_code, 200);
    assert_eq!(result.response_payload["json"], json!({"moved": true}));
    assert_eq!(ctx.current_response.unwrap()["status_code"], json!(200));
}
