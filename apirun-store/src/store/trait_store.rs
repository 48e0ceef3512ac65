use async_trait::async_trait;
use uuid::Uuid;

use crate::store::types::*;

/// Where finished reports go. Reports are append-only: saving an id twice
/// is an error.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_case_report(&self, report: &CaseReport) -> Result<(), StoreError>;

    async fn save_suite_report(&self, report: &SuiteReport) -> Result<(), StoreError>;

    async fn get_case_report(&self, id: Uuid) -> Result<Option<CaseReport>, StoreError>;

    async fn get_suite_report(&self, id: Uuid) -> Result<Option<SuiteReport>, StoreError>;

    /// Case reports for one test case, oldest first.
    async fn list_case_reports(&self, case_id: &str) -> Result<Vec<CaseReport>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("report {0} already exists")]
    Duplicate(Uuid),
    #[error("store error: {0}")]
    Other(String),
}
