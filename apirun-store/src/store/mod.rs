mod trait_store;
mod types;

pub use trait_store::{ReportStore, StoreError};
pub use types::{CaseReport, IterationReport, ReportStatus, StepReport, SuiteReport};
