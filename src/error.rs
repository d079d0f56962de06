//! Error types for the scheme task pool.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//!
//! # Usage
//!
//! Handlers propagate task protocol errors with `?`:
//!
//! ```ignore
//! use scheme_task_pool::{Reply, Result, Task};
//!
//! fn hello(task: &Task) -> Result<()> {
//!     task.receive(Reply::data("hello").with_content_type("text/plain"))?;
//!     task.finish(Reply::new())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Routing | [`Error::UnknownScheme`], [`Error::InvalidUrl`] |
//! | Task protocol | [`Error::ProtocolViolation`] |
//! | Handler | [`Error::HandlerFault`] |
//! | Lifecycle | [`Error::PoolShutdown`], [`Error::DispatcherClosed`] |
//! | External | [`Error::Io`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::TaskId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the pool builder or options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// No handler registered for the request's scheme.
    ///
    /// Returned by `task_start`; no task is created.
    #[error("Unknown scheme: {scheme}")]
    UnknownScheme {
        /// The scheme without a handler.
        scheme: String,
    },

    /// The request URL could not be parsed or decoded.
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        message: String,
    },

    // ========================================================================
    // Task Protocol Errors
    // ========================================================================
    /// Handler called `receive`/`finish`/`fail` out of order.
    ///
    /// Surfaced at the handler's own call site, never retried.
    #[error("Protocol violation on task {task_id}: {message}")]
    ProtocolViolation {
        /// Task the call was made on.
        task_id: TaskId,
        /// What the handler did wrong.
        message: String,
    },

    // ========================================================================
    // Handler Errors
    // ========================================================================
    /// Handler code failed while running.
    ///
    /// Handlers return this for their own failures; panics are converted
    /// into it by the task boundary.
    #[error("Handler fault: {message}")]
    HandlerFault {
        /// Failure description.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The pool was shut down and accepts no new tasks.
    #[error("Task pool is shut down")]
    PoolShutdown,

    /// The dispatcher thread is no longer accepting jobs.
    #[error("Dispatcher closed")]
    DispatcherClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error (thread spawn failures).
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an unknown scheme error.
    #[inline]
    pub fn unknown_scheme(scheme: impl Into<String>) -> Self {
        Self::UnknownScheme {
            scheme: scheme.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(url: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Creates a protocol violation error.
    #[inline]
    pub fn protocol_violation(task_id: TaskId, message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            task_id,
            message: message.into(),
        }
    }

    /// Creates a handler fault error.
    #[inline]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::HandlerFault {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if a handler broke the task call order.
    #[inline]
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }

    /// Returns `true` if this is a handler fault.
    #[inline]
    #[must_use]
    pub fn is_handler_fault(&self) -> bool {
        matches!(self, Self::HandlerFault { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
