#![forbid(unsafe_code)]

pub mod memory;
pub mod store;

pub use crate::memory::InMemoryReportStore;
pub use crate::store::{CaseReport, IterationReport, ReportStatus, ReportStore, StepReport, StoreError, SuiteReport};
