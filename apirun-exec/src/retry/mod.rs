mod decision;

pub use decision::{decide_retry, FailureKind, RetryDecision, RetryReason};
