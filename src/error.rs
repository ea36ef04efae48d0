//! Error types used by loadvisor.
//!
//! This module defines the error values that flow through a load:
//!
//! - [`FetchError`]: the error a fetcher or subscription setup returns.
//! - [`OperationError`]: failure of one composed operation (fetch, cancellation, deadline).
//! - [`ConfigError`]: a rejected [`RetryConfig`](crate::RetryConfig).
//!
//! Settled failures are reported as [`ErrorInfo`], classified by [`ErrorKind`].
//! All enums provide `as_label` for logs/metrics.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// # Error returned by a fetcher or a subscription setup.
///
/// Carries a human-readable message and an optional backend code
/// (e.g. `"unavailable"`). Both are inspected by the retry classifier.
///
/// # Example
/// ```
/// use loadvisor::FetchError;
///
/// let err = FetchError::new("backend busy").with_code("resource-exhausted");
/// assert_eq!(err.message(), "backend busy");
/// assert_eq!(err.code(), Some("resource-exhausted"));
/// assert_eq!(err.to_string(), "backend busy (resource-exhausted)");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", .code.as_ref().map(|c| format!(" ({c})")).unwrap_or_default())]
pub struct FetchError {
    message: String,
    code: Option<String>,
}

impl FetchError {
    /// Creates an error with the given message and no code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Attaches a backend error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Captures any error value by its `Display` output.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        Self::new(err.to_string())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl From<String> for FetchError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for FetchError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// # Failure of a single composed operation.
///
/// Produced by [`CancellableOperation`](crate::CancellableOperation) and
/// [`TimeoutGuard`](crate::TimeoutGuard). [`RetryExecutor`](crate::RetryExecutor)
/// decides whether a `Failed` value is transient or fatal.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The fetcher itself failed.
    #[error("{0}")]
    Failed(#[from] FetchError),

    /// The operation observed its cancellation token.
    #[error("operation cancelled")]
    Canceled,

    /// The deadline elapsed before the operation settled.
    #[error("timeout: no response within {}ms", .timeout.as_millis())]
    Timeout {
        /// The configured deadline.
        timeout: Duration,
    },
}

impl OperationError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use loadvisor::OperationError;
    /// use std::time::Duration;
    ///
    /// let err = OperationError::Timeout { timeout: Duration::from_millis(50) };
    /// assert_eq!(err.as_label(), "operation_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            OperationError::Failed(_) => "operation_failed",
            OperationError::Canceled => "operation_canceled",
            OperationError::Timeout { .. } => "operation_timeout",
        }
    }

    /// Backend code, if the fetcher supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            OperationError::Failed(e) => e.code(),
            _ => None,
        }
    }

    /// Message without the code suffix.
    pub fn message(&self) -> String {
        match self {
            OperationError::Failed(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }

    /// Builds the settled [`ErrorInfo`].
    ///
    /// `retryable` only matters for `Failed`: it selects `Transient` over `Fatal`.
    pub fn classify(&self, retryable: bool) -> ErrorInfo {
        let kind = match self {
            OperationError::Failed(_) if retryable => ErrorKind::Transient,
            OperationError::Failed(_) => ErrorKind::Fatal,
            OperationError::Canceled => ErrorKind::Cancelled,
            OperationError::Timeout { .. } => ErrorKind::Timeout,
        };
        let info = ErrorInfo::new(kind, self.message());
        match self.code() {
            Some(code) => info.with_code(code),
            None => info,
        }
    }
}

/// Classification of a settled failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Matched the retryable-tag classifier; surfaced only after retries ran out.
    Transient,
    /// Did not match the classifier; surfaced on first occurrence.
    Fatal,
    /// Superseded or torn down; never shown to the user.
    Cancelled,
    /// Lost the deadline race.
    Timeout,
    /// Joined per-key failures from a multi-source load.
    Aggregate,
}

impl ErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Aggregate => "aggregate",
        }
    }
}

/// Settled failure description carried by [`OperationOutcome`](crate::OperationOutcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, OperationError::Canceled.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// # Rejected retry configuration.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// `initial_delay` is larger than `max_delay`.
    #[error("initial delay {initial:?} exceeds max delay {max:?}")]
    DelayOrder { initial: Duration, max: Duration },

    /// `backoff_factor` must be strictly greater than 1.
    #[error("backoff factor must be greater than 1 (got {factor})")]
    Factor { factor: f64 },
}

impl ConfigError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::DelayOrder { .. } => "config_delay_order",
            ConfigError::Factor { .. } => "config_factor",
        }
    }
}
