//! Turns a test case, environment and dataset rows into ready-to-send inputs.

mod engine;

pub use engine::{ParameterizationEngine, PreparedIteration};

use apirun_core::TemplateError;

/// Failures that prevent an iteration from being attempted at all.
#[derive(Debug, thiserror::Error)]
pub enum ParameterizationError {
    #[error("test case inputs must be an object")]
    InputsNotObject,
    #[error(transparent)]
    Template(#[from] TemplateError),
}
