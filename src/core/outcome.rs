//! # Settled result of a retried operation.

use crate::error::{ErrorInfo, ErrorKind};

/// Result of [`RetryExecutor::run`](crate::RetryExecutor::run) together with
/// the number of attempts it took.
///
/// `attempts` is always at least 1. The inner `Result` guarantees that exactly
/// one of value and error is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome<T> {
    result: Result<T, ErrorInfo>,
    attempts: u32,
}

impl<T> OperationOutcome<T> {
    pub fn success(value: T, attempts: u32) -> Self {
        Self {
            result: Ok(value),
            attempts: attempts.max(1),
        }
    }

    pub fn failure(error: ErrorInfo, attempts: u32) -> Self {
        Self {
            result: Err(error),
            attempts: attempts.max(1),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn value(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.result.as_ref().err()
    }

    /// Failure kind, `None` on success.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error().map(|e| e.kind)
    }

    pub fn into_result(self) -> Result<T, ErrorInfo> {
        self.result
    }
}
