#![forbid(unsafe_code)]

//! Test-case templating, execution context, and assertion evaluation.
//!
//! Everything in this crate is synchronous and free of I/O; the HTTP runner,
//! the policy runtime and the executor live in `apirun-exec`.

pub mod assertions;
pub mod context;
pub mod error;
pub mod expressions;
pub mod parser;
pub mod types;
pub mod validate;

pub use crate::assertions::{diff_json, format_diff, AssertionEngine, DiffChange, DiffEntry, DiffOptions};
pub use crate::context::ExecutionContext;
pub use crate::error::{ParseError, TemplateError, ValidationError, Violation};
pub use crate::expressions::{render_str, render_value, resolve_expression};
pub use crate::parser::{
    parse_document_str, parse_environment_str, parse_policy_str, parse_suite_str,
    parse_test_case_str, DocumentFormat, ParsedDocument,
};
pub use crate::types::{
    duration_from_secs, normalize_assertions, AssertionDefinition, AssertionOperator, AssertionResult, Environment,
    ExecutionPolicySnapshot, ResponseContext, RetryBackoff, SuiteStep, TestCase, TestSuite, MAX_BACKOFF_SECONDS,
    MAX_WAIT_SECONDS,
};
pub use crate::validate::{validate_assertions, Validate};
