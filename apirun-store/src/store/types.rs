use apirun_core::AssertionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Passed,
    /// The request completed but at least one assertion failed.
    Failed,
    /// No usable response: transport errors, open circuit, bad inputs.
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Passed => "passed",
            ReportStatus::Failed => "failed",
            ReportStatus::Error => "error",
        }
    }

    /// `Error` beats `Failed` beats `Passed`. Empty input is `Passed`.
    pub fn aggregate<I: IntoIterator<Item = ReportStatus>>(statuses: I) -> ReportStatus {
        statuses.into_iter().fold(ReportStatus::Passed, |acc, s| match (acc, s) {
            (ReportStatus::Error, _) | (_, ReportStatus::Error) => ReportStatus::Error,
            (ReportStatus::Failed, _) | (_, ReportStatus::Failed) => ReportStatus::Failed,
            _ => ReportStatus::Passed,
        })
    }
}

/// Outcome of one dataset row. Payloads are always the masked copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    pub index: usize,
    pub status: ReportStatus,
    pub attempts: u32,
    pub dataset_row: Option<JsonValue>,
    pub request_payload: JsonValue,
    pub response_payload: Option<JsonValue>,
    pub metrics: JsonValue,
    pub assertions: Vec<AssertionResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub id: Uuid,
    pub case_id: Option<String>,
    pub case_name: String,
    pub status: ReportStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub iterations: Vec<IterationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub alias: String,
    pub status: ReportStatus,
    pub iteration: IterationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub id: Uuid,
    pub suite_id: Option<String>,
    pub suite_name: String,
    pub status: ReportStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub steps: Vec<StepReport>,
}
