use std::sync::Arc;

use apirun_core::{Environment, ExecutionPolicySnapshot, TestCase, TestSuite};
use apirun_store::{CaseReport, ReportStore, SuiteReport};

use super::{ExecutionError, Executor, RunScope};
use crate::dataset::{Dataset, DatasetLoader};
use crate::secrets::{SecretMap, SecretsDecryptor};

#[derive(Debug, Clone)]
pub struct CaseJob {
    pub case: TestCase,
    pub environment: Option<Environment>,
    pub dataset: Option<Dataset>,
    pub dataset_limit: Option<usize>,
    pub policy: Option<ExecutionPolicySnapshot>,
}

impl CaseJob {
    pub fn new(case: TestCase) -> Self {
        Self {
            case,
            environment: None,
            dataset: None,
            dataset_limit: None,
            policy: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuiteJob {
    pub suite: TestSuite,
    pub environment: Option<Environment>,
    pub policy: Option<ExecutionPolicySnapshot>,
}

impl SuiteJob {
    pub fn new(suite: TestSuite) -> Self {
        Self {
            suite,
            environment: None,
            policy: None,
        }
    }
}

/// Resolves a job's collaborators (secrets, dataset rows), runs it and
/// persists the report.
pub struct Worker {
    executor: Arc<Executor>,
    store: Arc<dyn ReportStore>,
    datasets: Arc<dyn DatasetLoader>,
    decryptor: Arc<dyn SecretsDecryptor>,
}

impl Worker {
    pub fn new(
        executor: Arc<Executor>,
        store: Arc<dyn ReportStore>,
        datasets: Arc<dyn DatasetLoader>,
        decryptor: Arc<dyn SecretsDecryptor>,
    ) -> Self {
        Self {
            executor,
            store,
            datasets,
            decryptor,
        }
    }

    pub async fn run_case(&self, job: CaseJob) -> Result<CaseReport, ExecutionError> {
        let rows = match &job.dataset {
            Some(dataset) => self.datasets.load(dataset, job.dataset_limit).await?,
            None => Vec::new(),
        };
        let scope = self.scope(job.environment, job.policy).await?;
        let report = self.executor.run_case(&job.case, &scope, &rows).await?;
        self.store.save_case_report(&report).await?;
        tracing::debug!(report_id = %report.id, "case report saved");
        Ok(report)
    }

    pub async fn run_suite(&self, job: SuiteJob) -> Result<SuiteReport, ExecutionError> {
        let scope = self.scope(job.environment, job.policy).await?;
        let report = self.executor.run_suite(&job.suite, &scope).await?;
        self.store.save_suite_report(&report).await?;
        tracing::debug!(report_id = %report.id, "suite report saved");
        Ok(report)
    }

    async fn scope(
        &self,
        environment: Option<Environment>,
        policy: Option<ExecutionPolicySnapshot>,
    ) -> Result<RunScope, ExecutionError> {
        let secrets = match &environment {
            Some(env) if !env.secrets.is_empty() => self.decryptor.decrypt_all(&env.secrets).await?,
            _ => SecretMap::new(),
        };
        Ok(RunScope {
            environment,
            secrets,
            policy,
        })
    }
}
