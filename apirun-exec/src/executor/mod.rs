//! Drives prepared iterations through the policy runtime, the runner and the
//! assertion engine, and assembles reports.

mod events;
mod worker;

pub use events::{CompositeEventSink, Event, EventSink, NoOpEventSink, RecordingEventSink, TracingEventSink};
pub use worker::{CaseJob, SuiteJob, Worker};

use std::sync::Arc;
use std::time::Instant;

use apirun_core::{
    normalize_assertions, render_value, AssertionDefinition, AssertionEngine, Environment, ExecutionContext,
    ExecutionPolicySnapshot, ResponseContext, TestCase, TestSuite,
};
use apirun_store::{CaseReport, IterationReport, ReportStatus, StepReport, StoreError, SuiteReport};
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dataset::DatasetError;
use crate::parameterize::{ParameterizationEngine, ParameterizationError, PreparedIteration};
use crate::policy::{PolicyRuntime, PolicyRuntimeManager};
use crate::retry::{decide_retry, FailureKind, RetryDecision};
use crate::runner::{HttpError, HttpRunner, RunnerError};
use crate::secrets::{SecretError, SecretMap};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Parameterization(#[from] ParameterizationError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] HttpError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Secrets(#[from] SecretError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a run needs besides the case or suite itself.
#[derive(Debug, Clone, Default)]
pub struct RunScope {
    pub environment: Option<Environment>,
    pub secrets: SecretMap,
    /// Falls back to the executor's default policy.
    pub policy: Option<ExecutionPolicySnapshot>,
}

pub struct Executor {
    runner: HttpRunner,
    params: ParameterizationEngine,
    assertions: AssertionEngine,
    policies: PolicyRuntimeManager,
    default_policy: ExecutionPolicySnapshot,
    events: Arc<dyn EventSink>,
}

/// What one iteration produced, before it is shaped into a report.
struct IterationOutcome {
    report: IterationReport,
    response: Option<ResponseContext>,
}

impl Executor {
    pub fn new(config: &EngineConfig, policies: PolicyRuntimeManager) -> Result<Self, ExecutionError> {
        let runner = HttpRunner::new(config.runner.clone())?;
        Ok(Self::with_runner(runner, config, policies))
    }

    pub fn with_runner(runner: HttpRunner, config: &EngineConfig, policies: PolicyRuntimeManager) -> Self {
        Self {
            runner,
            params: ParameterizationEngine::new(config.secret_placeholder.clone()),
            assertions: AssertionEngine::new(),
            policies,
            default_policy: config.default_policy.clone(),
            events: Arc::new(NoOpEventSink),
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    fn runtime(&self, scope: &RunScope) -> PolicyRuntime {
        self.policies.runtime(scope.policy.as_ref().unwrap_or(&self.default_policy))
    }

    /// One iteration per dataset row (or one without rows). Parameterization
    /// failures abort the whole case before anything is sent.
    pub async fn run_case(
        &self,
        case: &TestCase,
        scope: &RunScope,
        dataset_rows: &[Map<String, JsonValue>],
    ) -> Result<CaseReport, ExecutionError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        self.events
            .emit(Event::RunStarted {
                run_id,
                name: case.name.clone(),
            })
            .await;

        let prepared =
            self.params
                .prepare_iterations(case, scope.environment.as_ref(), &scope.secrets, dataset_rows)?;
        let definitions = normalize_assertions(&case.assertions);
        let runtime = self.runtime(scope);

        let mut iterations = Vec::with_capacity(prepared.len());
        for iteration in prepared {
            let label = format!("iteration_{}", iteration.index);
            let outcome = self.run_iteration(run_id, &label, &runtime, iteration, &definitions).await;
            iterations.push(outcome.report);
        }

        let status = ReportStatus::aggregate(iterations.iter().map(|i| i.status));
        self.events.emit(Event::RunFinished { run_id, status }).await;
        tracing::info!(%run_id, case = %case.name, status = status.as_str(), iterations = iterations.len(), "case finished");

        Ok(CaseReport {
            id: run_id,
            case_id: case.id.clone(),
            case_name: case.name.clone(),
            status,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as i64,
            iterations,
        })
    }

    /// Steps run in order against one shared context. The suite stops at
    /// the first step that produced no response.
    pub async fn run_suite(&self, suite: &TestSuite, scope: &RunScope) -> Result<SuiteReport, ExecutionError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        self.events
            .emit(Event::RunStarted {
                run_id,
                name: suite.name.clone(),
            })
            .await;

        let runtime = self.runtime(scope);
        let mut ctx = ExecutionContext {
            variables: suite.variables.clone(),
            ..ExecutionContext::default()
        };
        let mut steps = Vec::with_capacity(suite.steps.len());

        for (index, step) in suite.steps.iter().enumerate() {
            let alias = step.alias_or_default(index);
            let base_inputs = step.case.as_ref().map(|c| c.inputs.clone()).unwrap_or(JsonValue::Null);
            let inputs = merge_inputs(&base_inputs, &step.inputs);

            let mut definitions = step
                .case
                .as_ref()
                .map(|c| normalize_assertions(&c.assertions))
                .unwrap_or_default();
            definitions.extend(normalize_assertions(&step.assertions));

            let prepared = self.prepare_step(&mut ctx, &step.variables, &inputs, scope);
            let outcome = match prepared {
                Ok(mut prepared) => {
                    prepared.index = index;
                    self.run_iteration(run_id, &alias, &runtime, prepared, &definitions).await
                }
                Err(e) => {
                    tracing::warn!(%run_id, step = %alias, error = %e, "suite step could not be prepared");
                    error_outcome(index, 0, None, e.to_string())
                }
            };

            let status = outcome.report.status;
            steps.push(StepReport {
                alias: alias.clone(),
                status,
                iteration: outcome.report,
            });
            let Some(response) = outcome.response else {
                break;
            };
            let snapshot = response.to_value();
            ctx.set_current_response(Some(snapshot.clone()));
            ctx.remember_step(alias, snapshot);
        }

        let status = ReportStatus::aggregate(steps.iter().map(|s| s.status));
        self.events.emit(Event::RunFinished { run_id, status }).await;
        tracing::info!(%run_id, suite = %suite.name, status = status.as_str(), steps = steps.len(), "suite finished");

        Ok(SuiteReport {
            id: run_id,
            suite_id: suite.id.clone(),
            suite_name: suite.name.clone(),
            status,
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as i64,
            steps,
        })
    }

    fn prepare_step(
        &self,
        ctx: &mut ExecutionContext,
        variables: &Map<String, JsonValue>,
        inputs: &JsonValue,
        scope: &RunScope,
    ) -> Result<PreparedIteration, ParameterizationError> {
        if !variables.is_empty() {
            if let JsonValue::Object(rendered) = render_value(&JsonValue::Object(variables.clone()), ctx)? {
                ctx.variables.extend(rendered);
            }
        }
        self.params
            .prepare_step(inputs, ctx, scope.environment.as_ref(), &scope.secrets)
    }

    /// Slot, breaker, rate limit, send, account, then retry or stop.
    async fn run_iteration(
        &self,
        run_id: Uuid,
        label: &str,
        runtime: &PolicyRuntime,
        prepared: PreparedIteration,
        definitions: &[AssertionDefinition],
    ) -> IterationOutcome {
        let host = request_host(&prepared.inputs);
        let timeout = runtime.snapshot().timeout();
        let dataset_row = prepared.dataset_row.clone().map(JsonValue::Object);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.events
                .emit(Event::AttemptStarted {
                    run_id,
                    label: label.to_string(),
                    attempt_no: attempt,
                })
                .await;

            let slot = runtime.acquire_slot().await;
            let open_for = runtime.circuit_remaining(&host);
            let (failure, outcome) = if !open_for.is_zero() {
                drop(slot);
                let reason = format!(
                    "circuit open for host {host}; retry in {:.1}s",
                    open_for.as_secs_f64()
                );
                tracing::warn!(%run_id, %label, %host, "attempt refused, circuit open");
                self.events
                    .emit(Event::PolicyDenied {
                        run_id,
                        label: label.to_string(),
                        reason: reason.clone(),
                    })
                    .await;
                (
                    Some(FailureKind::CircuitOpen),
                    error_outcome(prepared.index, attempt, dataset_row.clone(), reason),
                )
            } else {
                let wait = runtime.rate_limit_delay(&host);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }

                let mut ctx = prepared.context.clone();
                let result = self
                    .runner
                    .execute_prepared(&prepared.inputs, &prepared.masked_inputs, &mut ctx, Some(timeout))
                    .await;
                drop(slot);

                match result {
                    Ok(result) => {
                        runtime.record_success(&host);
                        let evaluated = self.assertions.evaluate(definitions, &result.context, &mut ctx);
                        let (passed, assertions, error) = match evaluated {
                            Ok((passed, assertions)) => (passed, assertions, None),
                            Err(e) => (false, Vec::new(), Some(e.to_string())),
                        };
                        let status = match (&error, passed) {
                            (Some(_), _) => ReportStatus::Error,
                            (None, true) => ReportStatus::Passed,
                            (None, false) => ReportStatus::Failed,
                        };
                        let outcome = IterationOutcome {
                            report: IterationReport {
                                index: prepared.index,
                                status,
                                attempts: attempt,
                                dataset_row: dataset_row.clone(),
                                request_payload: result.request_payload,
                                response_payload: Some(result.response_payload),
                                metrics: result.metrics.to_value(),
                                assertions,
                                error,
                            },
                            response: Some(result.context),
                        };
                        // Rendering errors are not retried.
                        let failure = (status == ReportStatus::Failed).then_some(FailureKind::Assertions);
                        (failure, outcome)
                    }
                    Err(RunnerError::Transport {
                        error,
                        request_payload,
                        metrics,
                    }) => {
                        runtime.record_failure(&host);
                        let mut outcome = error_outcome(prepared.index, attempt, dataset_row.clone(), error.to_string());
                        outcome.report.request_payload = request_payload;
                        outcome.report.metrics = metrics.to_value();
                        (Some(FailureKind::Transport), outcome)
                    }
                    Err(other) => (None, error_outcome(prepared.index, attempt, dataset_row.clone(), other.to_string())),
                }
            };

            self.events
                .emit(Event::AttemptFinished {
                    run_id,
                    label: label.to_string(),
                    attempt_no: attempt,
                    succeeded: outcome.report.status == ReportStatus::Passed,
                })
                .await;

            let Some(failure) = failure else {
                return outcome;
            };
            match decide_retry(runtime.snapshot(), attempt, failure, fastrand::f64) {
                RetryDecision::RetryAfter { delay, reason } => {
                    tracing::info!(
                        %run_id,
                        %label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        ?reason,
                        "retry scheduled"
                    );
                    self.events
                        .emit(Event::RetryScheduled {
                            run_id,
                            label: label.to_string(),
                            delay_ms: delay.as_millis() as u64,
                        })
                        .await;
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Stop { reason } => {
                    tracing::debug!(%run_id, %label, attempt, ?reason, "no further attempts");
                    return outcome;
                }
            }
        }
    }
}

fn error_outcome(index: usize, attempts: u32, dataset_row: Option<JsonValue>, message: String) -> IterationOutcome {
    IterationOutcome {
        report: IterationReport {
            index,
            status: ReportStatus::Error,
            attempts,
            dataset_row,
            request_payload: JsonValue::Null,
            response_payload: None,
            metrics: JsonValue::Object(Map::new()),
            assertions: Vec::new(),
            error: Some(message),
        },
        response: None,
    }
}

/// Rate limits and breakers are keyed by this.
fn request_host(inputs: &Map<String, JsonValue>) -> String {
    inputs
        .get("url")
        .and_then(JsonValue::as_str)
        .and_then(|u| url::Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "default".to_string())
}

/// Step inputs over case inputs; objects merge recursively, anything else
/// is replaced.
fn merge_inputs(base: &JsonValue, overrides: &JsonValue) -> JsonValue {
    match (base, overrides) {
        (JsonValue::Object(b), JsonValue::Object(o)) => {
            let mut merged = b.clone();
            for (k, v) in o {
                let value = match merged.get(k) {
                    Some(existing) => merge_inputs(existing, v),
                    None => v.clone(),
                };
                merged.insert(k.clone(), value);
            }
            JsonValue::Object(merged)
        }
        (base, JsonValue::Null) => base.clone(),
        (_, overrides) => overrides.clone(),
    }
}
