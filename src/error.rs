//! Error types used by the hub runtime and by listeners.
//!
//! This module defines two main error enums:
//!
//! - [`HubError`]: errors raised by the hub itself (construction, publish, shutdown).
//! - [`ListenerError`]: errors raised while a listener handles an event.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the hub runtime.
///
/// None of these are raised under normal operation: `publish` only appends
/// to the queue, and the dispatcher swallows listener faults.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// The hub is shutting down (or has shut down) and rejects new events.
    #[error("hub is closed; event rejected")]
    Closed,

    /// `HubBuilder::build` was called outside of a tokio runtime.
    #[error("no tokio runtime available to spawn the dispatcher")]
    NoRuntime,

    /// Shutdown grace period was exceeded; the dispatcher had to be aborted.
    #[error("shutdown timeout {grace:?} exceeded; {pending} event(s) left undelivered")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of events still queued when the dispatcher was aborted.
        pending: usize,
    },
}

impl HubError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventhub::HubError;
    ///
    /// assert_eq!(HubError::Closed.as_label(), "hub_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HubError::Closed => "hub_closed",
            HubError::NoRuntime => "hub_no_runtime",
            HubError::GraceExceeded { .. } => "hub_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HubError::Closed => "closed".to_string(),
            HubError::NoRuntime => "no runtime".to_string(),
            HubError::GraceExceeded { grace, pending } => {
                format!("grace exceeded after {grace:?}; pending events={pending}")
            }
        }
    }
}

/// # Errors produced while a listener handles an event.
///
/// Every variant is delivered to the failing listener's
/// [`Listener::on_error`](crate::Listener::on_error); none of them stops the
/// dispatcher or affects other listeners.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// Handling failed with an error reported by the listener.
    #[error("handling failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// Handling exceeded the configured handler timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The listener panicked inside `handle`.
    #[error("listener panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text (if it was a string).
        info: String,
    },

    /// Handling stopped because the hub cancelled it.
    #[error("handling cancelled")]
    Canceled,
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use eventhub::ListenerError;
    ///
    /// let err = ListenerError::fail("db unavailable");
    /// assert_eq!(err.to_string(), "handling failed: db unavailable");
    /// ```
    pub fn fail(error: impl Display) -> Self {
        ListenerError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventhub::ListenerError;
    /// use std::time::Duration;
    ///
    /// let err = ListenerError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "listener_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Failed { .. } => "listener_failed",
            ListenerError::Timeout { .. } => "listener_timeout",
            ListenerError::Panicked { .. } => "listener_panicked",
            ListenerError::Canceled => "listener_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            ListenerError::Failed { error } => format!("error: {error}"),
            ListenerError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            ListenerError::Panicked { info } => format!("panic: {info}"),
            ListenerError::Canceled => "cancelled".to_string(),
        }
    }
}
