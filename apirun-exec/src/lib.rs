#![forbid(unsafe_code)]

//! Runtime side of apirun: parameterization, the HTTP runner, the shared
//! execution-policy runtime, and the executor that drives them.
//!
//! Templating and assertions live in `apirun-core`.

pub mod config;
pub mod dataset;
pub mod executor;
pub mod parameterize;
pub mod policy;
pub mod retry;
pub mod runner;
pub mod secrets;

pub use crate::config::{EngineConfig, RunnerConfig};
pub use crate::executor::{CaseJob, ExecutionError, Executor, RunScope, SuiteJob, Worker};
pub use crate::parameterize::{ParameterizationEngine, ParameterizationError, PreparedIteration};
pub use crate::policy::{PolicyRuntime, PolicyRuntimeManager};
pub use crate::runner::{HttpRunner, RunnerError, RunnerResult};
