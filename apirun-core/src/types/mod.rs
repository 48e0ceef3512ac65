mod assertion;
mod case;
mod policy;
mod response;

pub use assertion::{normalize_assertions, AssertionDefinition, AssertionOperator, AssertionResult};
pub use case::{Environment, SuiteStep, TestCase, TestSuite};
pub use policy::{duration_from_secs, ExecutionPolicySnapshot, RetryBackoff, MAX_BACKOFF_SECONDS, MAX_WAIT_SECONDS};
pub use response::ResponseContext;
