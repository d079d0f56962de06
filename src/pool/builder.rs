//! Builder pattern for task pool configuration.
//!
//! # Example
//!
//! ```
//! use scheme_task_pool::{Reply, Result, ResponseMeta, SchemeHost, Task, TaskId, TaskPool};
//!
//! struct NullHost;
//!
//! impl SchemeHost for NullHost {
//!     fn deliver_response_headers(&self, _: TaskId, _: &ResponseMeta) {}
//!     fn deliver_data(&self, _: TaskId, _: &[u8]) {}
//!     fn deliver_finished(&self, _: TaskId) {}
//!     fn deliver_failed(&self, _: TaskId, _: &str) {}
//! }
//!
//! let pool = TaskPool::builder()
//!     .handler("app", |task: &Task| -> Result<()> { task.finish(Reply::new()) })
//!     .max_workers(2)
//!     .build(NullHost)?;
//!
//! assert_eq!(pool.schemes(), vec!["app"]);
//! # Ok::<(), scheme_task_pool::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::host::SchemeHost;

use super::core::TaskPool;
use super::handler::{SchemeHandler, SchemeHandlers};
use super::options::PoolOptions;

// ============================================================================
// Constants
// ============================================================================

/// RFC 3986 scheme syntax.
const SCHEME_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9+.\-]*$";

/// Schemes the browser engine serves itself and will not hand over.
const RESERVED_SCHEMES: &[&str] = &[
    "about",
    "blob",
    "data",
    "file",
    "ftp",
    "http",
    "https",
    "javascript",
    "ws",
    "wss",
];

// ============================================================================
// TaskPoolBuilder
// ============================================================================

/// Builder for configuring a [`TaskPool`].
///
/// Use [`TaskPool::builder()`] to create a new builder.
#[derive(Default)]
pub struct TaskPoolBuilder {
    /// Handlers in registration order.
    handlers: Vec<(String, Arc<dyn SchemeHandler>)>,
    /// Pool tuning.
    options: PoolOptions,
}

// ============================================================================
// TaskPoolBuilder Implementation
// ============================================================================

impl TaskPoolBuilder {
    /// Creates a builder with no handlers and default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `scheme`.
    #[must_use]
    pub fn handler(self, scheme: impl Into<String>, handler: impl SchemeHandler + 'static) -> Self {
        self.shared_handler(scheme, Arc::new(handler))
    }

    /// Registers an already shared handler for `scheme`.
    #[must_use]
    pub fn shared_handler(
        mut self,
        scheme: impl Into<String>,
        handler: Arc<dyn SchemeHandler>,
    ) -> Self {
        self.handlers.push((scheme.into(), handler));
        self
    }

    /// Replaces the pool options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the worker ceiling.
    #[inline]
    #[must_use]
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.options.max_workers = max_workers;
        self
    }

    /// Builds the pool with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no handler is registered
    /// - [`Error::Config`] if a scheme name is malformed, reserved or
    ///   registered twice
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self, host: impl SchemeHost + 'static) -> Result<TaskPool> {
        self.options.validate()?;
        let handlers = self.validate_handlers()?;

        Ok(TaskPool::from_parts(handlers, Arc::new(host), self.options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl TaskPoolBuilder {
    /// Validates scheme names and collects the handler map.
    fn validate_handlers(&self) -> Result<SchemeHandlers> {
        if self.handlers.is_empty() {
            return Err(Error::config(
                "At least one scheme handler is required. Use .handler() to add one.\n\
                 Example: TaskPool::builder().handler(\"app\", serve_app)",
            ));
        }

        let pattern = Regex::new(SCHEME_PATTERN)
            .map_err(|e| Error::config(format!("Invalid scheme pattern: {e}")))?;

        let mut handlers = SchemeHandlers::new();

        for (scheme, handler) in &self.handlers {
            if !pattern.is_match(scheme) {
                return Err(Error::config(format!(
                    "Invalid scheme name '{scheme}': must start with a letter and \
                     contain only letters, digits, '+', '-' or '.'"
                )));
            }

            let scheme = scheme.to_ascii_lowercase();

            if RESERVED_SCHEMES.contains(&scheme.as_str()) {
                return Err(Error::config(format!(
                    "Cannot register a custom handler for built-in scheme '{scheme}'"
                )));
            }

            if handlers.insert(&scheme, Arc::clone(handler)).is_some() {
                return Err(Error::config(format!(
                    "Scheme '{scheme}' has more than one handler"
                )));
            }
        }

        Ok(handlers)
    }
}

impl fmt::Debug for TaskPoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schemes: Vec<&str> = self.handlers.iter().map(|(s, _)| s.as_str()).collect();

        f.debug_struct("TaskPoolBuilder")
            .field("schemes", &schemes)
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::host::RecordingHost;
    use crate::pool::Task;

    fn noop(task: &Task) -> Result<()> {
        task.finish(crate::Reply::new())
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = TaskPoolBuilder::new();
        assert!(builder.handlers.is_empty());
        assert_eq!(builder.options, PoolOptions::default());
    }

    #[test]
    fn test_build_fails_without_handlers() {
        let err = TaskPoolBuilder::new()
            .build(RecordingHost::default())
            .unwrap_err();

        assert!(err.is_config_error());
        assert!(err.to_string().contains("handler"));
    }

    #[test]
    fn test_build_rejects_malformed_scheme() {
        for scheme in ["", "1app", "my app", "app:"] {
            let result = TaskPoolBuilder::new()
                .handler(scheme, noop)
                .build(RecordingHost::default());
            assert!(result.is_err(), "scheme {scheme:?} should be rejected");
        }
    }

    #[test]
    fn test_build_rejects_reserved_scheme() {
        let err = TaskPoolBuilder::new()
            .handler("HTTPS", noop)
            .build(RecordingHost::default())
            .unwrap_err();

        assert!(err.to_string().contains("built-in scheme 'https'"));
    }

    #[test]
    fn test_build_rejects_duplicate_scheme() {
        let err = TaskPoolBuilder::new()
            .handler("app", noop)
            .handler("APP", noop)
            .build(RecordingHost::default())
            .unwrap_err();

        assert!(err.to_string().contains("more than one handler"));
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let err = TaskPoolBuilder::new()
            .handler("app", noop)
            .max_workers(0)
            .build(RecordingHost::default())
            .unwrap_err();

        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn test_build_lowercases_schemes() {
        let pool = TaskPoolBuilder::new()
            .handler("Img", noop)
            .handler("app+v2", noop)
            .build(RecordingHost::default())
            .expect("build pool");

        assert_eq!(pool.schemes(), vec!["app+v2", "img"]);
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_debug_lists_schemes() {
        let builder = TaskPoolBuilder::new().handler("app", noop);
        assert!(format!("{builder:?}").contains("\"app\""));
    }
}
