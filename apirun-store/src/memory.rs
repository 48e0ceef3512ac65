use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{CaseReport, ReportStore, StoreError, SuiteReport};

/// Process-local report store.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    cases: RwLock<Vec<CaseReport>>,
    suites: RwLock<HashMap<Uuid, SuiteReport>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn case_report_count(&self) -> usize {
        self.cases.read().await.len()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn save_case_report(&self, report: &CaseReport) -> Result<(), StoreError> {
        let mut cases = self.cases.write().await;
        if cases.iter().any(|r| r.id == report.id) {
            return Err(StoreError::Duplicate(report.id));
        }
        cases.push(report.clone());
        Ok(())
    }

    async fn save_suite_report(&self, report: &SuiteReport) -> Result<(), StoreError> {
        let mut suites = self.suites.write().await;
        if suites.contains_key(&report.id) {
            return Err(StoreError::Duplicate(report.id));
        }
        suites.insert(report.id, report.clone());
        Ok(())
    }

    async fn get_case_report(&self, id: Uuid) -> Result<Option<CaseReport>, StoreError> {
        Ok(self.cases.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn get_suite_report(&self, id: Uuid) -> Result<Option<SuiteReport>, StoreError> {
        Ok(self.suites.read().await.get(&id).cloned())
    }

    async fn list_case_reports(&self, case_id: &str) -> Result<Vec<CaseReport>, StoreError> {
        Ok(self
            .cases
            .read()
            .await
            .iter()
            .filter(|r| r.case_id.as_deref() == Some(case_id))
            .cloned()
            .collect())
    }
}
