//! Scheme handler trait and the scheme-name registry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::Result;

use super::task::Task;

// ============================================================================
// SchemeHandler
// ============================================================================

/// Application code producing the response for one scheme.
///
/// Invoked synchronously on a worker thread, once per task. The handler may
/// block; it drives the response through [`Task::receive`],
/// [`Task::finish`] and [`Task::fail`]. Returning `Err` or panicking is a
/// handler fault and fails the task if it has not finished yet.
///
/// Any `Fn(&Task) -> Result<()>` closure is a handler:
///
/// ```
/// use scheme_task_pool::{Reply, Result, SchemeHandler, Task};
///
/// fn assert_handler(_: impl SchemeHandler) {}
///
/// assert_handler(|task: &Task| -> Result<()> {
///     task.finish(Reply::data("ok").with_content_type("text/plain"))
/// });
/// ```
pub trait SchemeHandler: Send + Sync {
    /// Produces the response for `task`.
    fn handle(&self, task: &Task) -> Result<()>;
}

impl<F> SchemeHandler for F
where
    F: Fn(&Task) -> Result<()> + Send + Sync,
{
    #[inline]
    fn handle(&self, task: &Task) -> Result<()> {
        self(task)
    }
}

// ============================================================================
// SchemeHandlers
// ============================================================================

/// Explicit scheme-name → handler map.
///
/// Keys are stored lowercase; lookups are case-insensitive.
#[derive(Clone, Default)]
pub struct SchemeHandlers {
    handlers: FxHashMap<String, Arc<dyn SchemeHandler>>,
}

impl SchemeHandlers {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, returning the one it replaced.
    pub fn insert(
        &mut self,
        scheme: &str,
        handler: Arc<dyn SchemeHandler>,
    ) -> Option<Arc<dyn SchemeHandler>> {
        self.handlers.insert(scheme.to_ascii_lowercase(), handler)
    }

    /// Returns the handler for `scheme`.
    #[must_use]
    pub fn get(&self, scheme: &str) -> Option<Arc<dyn SchemeHandler>> {
        match self.handlers.get(scheme) {
            Some(handler) => Some(Arc::clone(handler)),
            None => self.handlers.get(&scheme.to_ascii_lowercase()).cloned(),
        }
    }

    /// Returns `true` if `scheme` has a handler.
    #[inline]
    #[must_use]
    pub fn contains(&self, scheme: &str) -> bool {
        self.get(scheme).is_some()
    }

    /// Returns the number of registered schemes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no scheme is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the registered scheme names, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }
}

impl fmt::Debug for SchemeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeHandlers")
            .field("schemes", &self.schemes())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
