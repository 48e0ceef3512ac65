use std::sync::Arc;

use apirun_core::{Environment, ExecutionPolicySnapshot, SuiteStep, TestCase, TestSuite};
use apirun_exec::config::EngineConfig;
use apirun_exec::executor::{Event, Executor, RecordingEventSink, RunScope};
use apirun_exec::policy::PolicyRuntimeManager;
use apirun_store::ReportStatus;
use serde_json::{json, Map, Value as JsonValue};
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn obj(v: JsonValue) -> Map<String, JsonValue> {
    v.as_object().cloned().unwrap()
}

fn executor() -> Executor {
    Executor::new(&EngineConfig::default(), PolicyRuntimeManager::new()).unwrap()
}

fn policy(id: &str, attempts: u32) -> ExecutionPolicySnapshot {
    let mut p = ExecutionPolicySnapshot {
        id: Some(id.to_string()),
        retry_max_attempts: attempts,
        ..ExecutionPolicySnapshot::default()
    };
    p.retry_backoff.base_seconds = 0.01;
    p.retry_backoff.jitter_ratio = 0.0;
    p
}

fn scope_for(server: &MockServer, policy: ExecutionPolicySnapshot) -> RunScope {
    RunScope {
        environment: Some(Environment {
            name: "test".to_string(),
            base_url: Some(server.uri()),
            ..Environment::default()
        }),
        policy: Some(policy),
        ..RunScope::default()
    }
}

#[tokio::test]
async fn case_runs_once_per_dataset_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/users/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"active": true})))
        .expect(2)
        .mount(&server)
        .await;

    let case = TestCase {
        name: "fetch user".to_string(),
        inputs: json!({"url": "/users/{{ row.id }}"}),
        assertions: json!([
            {"operator": "status_code", "expected": 200},
            {"operator": "equals", "actual": "{{ response.json.active }}", "expected": true}
        ]),
        ..TestCase::default()
    };
    let rows = vec![obj(json!({"id": 1})), obj(json!({"id": 2}))];
    let report = executor()
        .run_case(&case, &scope_for(&server, policy("rows", 3)), &rows)
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Passed);
    assert_eq!(report.iterations.len(), 2);
    for (i, it) in report.iterations.iter().enumerate() {
        assert_eq!(it.index, i);
        assert_eq!(it.attempts, 1);
        assert_eq!(it.assertions.len(), 2);
        assert_eq!(it.dataset_row, Some(json!({"id": i + 1})));
    }
    assert_eq!(
        report.iterations[1].request_payload["url"],
        json!(format!("{}/users/2", server.uri()))
    );
}

#[tokio::test]
async fn assertion_failures_fail_without_retrying_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/item"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"a": 1, "b": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let case = TestCase {
        name: "item".to_string(),
        inputs: json!({"url": "/item"}),
        assertions: json!({"items": [
            {"operator": "equals", "actual": "{{ response.json }}", "expected": {"a": 1, "b": 3}}
        ]}),
        ..TestCase::default()
    };
    let report = executor()
        .run_case(&case, &scope_for(&server, policy("no-retry", 3)), &[])
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Failed);
    let it = &report.iterations[0];
    assert_eq!(it.attempts, 1);
    assert_eq!(it.error, None);
    let entries = it.assertions[0].diff_entries.as_ref().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "$.b");
}

#[tokio::test]
async fn assertion_failures_retry_when_the_policy_allows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut p = policy("retry-assert", 3);
    p.retry_backoff.retry_on_assertions = true;
    let case = TestCase {
        name: "flaky".to_string(),
        inputs: json!({"url": "/flaky"}),
        assertions: json!({"status_code": 200}),
        ..TestCase::default()
    };
    let report = executor().run_case(&case, &scope_for(&server, p), &[]).await.unwrap();

    assert_eq!(report.status, ReportStatus::Passed);
    assert_eq!(report.iterations[0].attempts, 2);
}

#[tokio::test]
async fn transport_failures_retry_then_report_an_error() {
    let sink = Arc::new(RecordingEventSink::new());
    let exec = executor().with_event_sink(sink.clone());
    let case = TestCase {
        name: "down".to_string(),
        inputs: json!({"url": "http://127.0.0.1:1/health"}),
        assertions: json!({"status_code": 200}),
        ..TestCase::default()
    };
    let mut p = policy("down", 2);
    p.circuit_breaker_threshold = 10;
    let scope = RunScope {
        policy: Some(p),
        ..RunScope::default()
    };
    let report = exec.run_case(&case, &scope, &[]).await.unwrap();

    assert_eq!(report.status, ReportStatus::Error);
    let it = &report.iterations[0];
    assert_eq!(it.attempts, 2);
    assert!(it.error.is_some());
    assert_eq!(it.metrics["status"], json!("network_error"));
    assert_eq!(it.request_payload["url"], json!("http://127.0.0.1:1/health"));

    let events = sink.events();
    let retries = events
        .iter()
        .filter(|e| matches!(e, Event::RetryScheduled { .. }))
        .count();
    assert_eq!(retries, 1);
    assert!(matches!(events.first(), Some(Event::RunStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(Event::RunFinished {
            status: ReportStatus::Error,
            ..
        })
    ));
}

#[tokio::test]
async fn open_circuit_refuses_further_attempts() {
    let sink = Arc::new(RecordingEventSink::new());
    let exec = executor().with_event_sink(sink.clone());
    let case = TestCase {
        name: "breaker".to_string(),
        inputs: json!({"url": "http://127.0.0.1:1/"}),
        ..TestCase::default()
    };
    let mut p = policy("breaker", 5);
    p.circuit_breaker_threshold = 1;
    let scope = RunScope {
        policy: Some(p),
        ..RunScope::default()
    };
    let report = exec.run_case(&case, &scope, &[]).await.unwrap();

    let it = &report.iterations[0];
    assert_eq!(it.status, ReportStatus::Error);
    assert_eq!(it.attempts, 2);
    assert!(it.error.as_deref().unwrap().contains("circuit open"));

    // One retry after the transport failure; the refusal ends the run.
    let events = sink.events();
    let denied = events
        .iter()
        .position(|e| matches!(e, Event::PolicyDenied { .. }))
        .unwrap();
    assert!(!events[denied..]
        .iter()
        .any(|e| matches!(e, Event::RetryScheduled { .. })));
    assert!(events[denied..].iter().any(|e| matches!(
        e,
        Event::AttemptFinished {
            attempt_no: 2,
            succeeded: false,
            ..
        }
    )));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::RetryScheduled { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn suite_steps_share_context_through_prev_aliases() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"user": "ada", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t-1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer t-1"))
        .and(header("x-user", "ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ada"})))
        .mount(&server)
        .await;

    let login = TestCase {
        name: "login".to_string(),
        inputs: json!({"method": "POST", "url": "/login", "json": {"user": "{{ variables.user }}", "password": "x"}}),
        assertions: json!({"status_code": 200}),
        ..TestCase::default()
    };
    let suite = TestSuite {
        name: "profile flow".to_string(),
        variables: obj(json!({"user": "ada"})),
        steps: vec![
            SuiteStep {
                alias: Some("login".to_string()),
                case: Some(login),
                inputs: json!({"json": {"password": "pw"}}),
                ..SuiteStep::default()
            },
            SuiteStep {
                variables: obj(json!({"token": "{{ prev.login.json.token }}"})),
                inputs: json!({
                    "url": "/profile",
                    "headers": {"Authorization": "Bearer {{ variables.token }}", "X-User": "{{ variables.user }}"}
                }),
                assertions: json!([
                    {"operator": "status_code", "expected": 200},
                    {"operator": "jsonpath_equals", "path": "$.name", "expected": "Ada"}
                ]),
                ..SuiteStep::default()
            },
        ],
        ..TestSuite::default()
    };

    let report = executor()
        .run_suite(&suite, &scope_for(&server, policy("suite", 1)))
        .await
        .unwrap();

    assert_eq!(report.status, ReportStatus::Passed, "{report:#?}");
    let aliases: Vec<&str> = report.steps.iter().map(|s| s.alias.as_str()).collect();
    assert_eq!(aliases, ["login", "step_2"]);
    assert_eq!(report.steps[1].iteration.index, 1);
    assert_eq!(report.steps[1].iteration.assertions.len(), 2);
}

#[tokio::test]
async fn suite_stops_after_a_step_without_response() {
    let suite = TestSuite {
        name: "broken".to_string(),
        steps: vec![
            SuiteStep {
                inputs: json!({"url": "http://127.0.0.1:1/a"}),
                ..SuiteStep::default()
            },
            SuiteStep {
                inputs: json!({"url": "http://127.0.0.1:1/b"}),
                ..SuiteStep::default()
            },
        ],
        ..TestSuite::default()
    };
    let scope = RunScope {
        policy: Some(policy("broken", 1)),
        ..RunScope::default()
    };
    let report = executor().run_suite(&suite, &scope).await.unwrap();

    assert_eq!(report.status, ReportStatus::Error);
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].alias, "step_1");
}
