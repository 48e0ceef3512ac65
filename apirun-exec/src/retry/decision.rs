use std::time::Duration;

use apirun_core::ExecutionPolicySnapshot;

use crate::policy::backoff_delay_with;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// DNS, connect or timeout failure from the runner.
    Transport,
    /// The request completed but at least one assertion failed.
    Assertions,
    /// The destination's circuit was open before sending.
    CircuitOpen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    RetryAfter { delay: Duration, reason: RetryReason },
    Stop { reason: RetryReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    NotRetryable,
    AttemptsExhausted,
    CircuitOpen,
    NetworkFailure,
    AssertionFailure,
}

/// Decide whether attempt `attempt_no` (1-based) should be followed by
/// another, and after how long.
///
/// - transport failures retry while the attempt budget lasts
/// - assertion failures retry only with `retry_on_assertions`
/// - an open circuit never retries
pub fn decide_retry(
    policy: &ExecutionPolicySnapshot,
    attempt_no: u32,
    failure: FailureKind,
    rand_f64: impl FnOnce() -> f64,
) -> RetryDecision {
    let reason = match failure {
        FailureKind::CircuitOpen => {
            return RetryDecision::Stop {
                reason: RetryReason::CircuitOpen,
            }
        }
        FailureKind::Assertions if !policy.retry_backoff.retry_on_assertions => {
            return RetryDecision::Stop {
                reason: RetryReason::NotRetryable,
            }
        }
        FailureKind::Assertions => RetryReason::AssertionFailure,
        FailureKind::Transport => RetryReason::NetworkFailure,
    };

    if attempt_no >= policy.retry_max_attempts.max(1) {
        return RetryDecision::Stop {
            reason: RetryReason::AttemptsExhausted,
        };
    }

    RetryDecision::RetryAfter {
        delay: backoff_delay_with(attempt_no, &policy.retry_backoff, rand_f64),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(attempts: u32, on_assertions: bool) -> ExecutionPolicySnapshot {
        let mut p = ExecutionPolicySnapshot {
            retry_max_attempts: attempts,
            ..ExecutionPolicySnapshot::default()
        };
        p.retry_backoff.base_seconds = 1.0;
        p.retry_backoff.jitter_ratio = 0.0;
        p.retry_backoff.retry_on_assertions = on_assertions;
        p
    }

    #[test]
    fn transport_failures_retry_until_budget() {
        let p = policy(3, false);
        assert_eq!(
            decide_retry(&p, 1, FailureKind::Transport, || 0.0),
            RetryDecision::RetryAfter {
                delay: Duration::from_secs(1),
                reason: RetryReason::NetworkFailure
            }
        );
        assert_eq!(
            decide_retry(&p, 2, FailureKind::Transport, || 0.0),
            RetryDecision::RetryAfter {
                delay: Duration::from_secs(2),
                reason: RetryReason::NetworkFailure
            }
        );
        assert_eq!(
            decide_retry(&p, 3, FailureKind::Transport, || 0.0),
            RetryDecision::Stop {
                reason: RetryReason::AttemptsExhausted
            }
        );
    }

    #[test]
    fn assertion_failures_need_opt_in() {
        assert_eq!(
            decide_retry(&policy(3, false), 1, FailureKind::Assertions, || 0.0),
            RetryDecision::Stop {
                reason: RetryReason::NotRetryable
            }
        );
        assert!(matches!(
            decide_retry(&policy(3, true), 1, FailureKind::Assertions, || 0.0),
            RetryDecision::RetryAfter {
                reason: RetryReason::AssertionFailure,
                ..
            }
        ));
    }

    #[test]
    fn open_circuit_never_retries() {
        assert_eq!(
            decide_retry(&policy(5, true), 1, FailureKind::CircuitOpen, || 0.0),
            RetryDecision::Stop {
                reason: RetryReason::CircuitOpen
            }
        );
    }
}
