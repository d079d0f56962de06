//! One in-flight scheme request and its response-delivery state.
//!
//! # Lifecycle
//!
//! ```text
//! Created ─► Started/Running ─► Finished
//!                             ├► Failed
//!                             └► (stopped by host) ─► Finished/Failed, suppressed
//! ```
//!
//! A task is created by `task_start`, run by exactly one worker, and removed
//! from the pool's bookkeeping as soon as its handler returns.
//!
//! # Cancellation
//!
//! A host stop does not interrupt the handler. Every host-bound delivery
//! re-checks the pool's stopped set right before the call and is dropped
//! if the id is in it; the handler keeps running to completion.
//! [`Task::is_cancelled`] lets handlers bail out early.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::host::SchemeHost;
use crate::identifiers::TaskId;
use crate::protocol::{Reply, SchemeRequest, synthesize_headers};

use super::core::PoolShared;
use super::handler::SchemeHandler;

// ============================================================================
// TaskState
// ============================================================================

/// Mutable task flags.
#[derive(Debug, Default)]
struct TaskState {
    started: bool,
    running: bool,
    terminated: bool,
    finished: bool,
    failed: bool,
    cancelled: bool,
    headers_sent: bool,
    error: Option<String>,
}

// ============================================================================
// Task
// ============================================================================

/// A custom-scheme request being served by a handler.
///
/// Handlers receive `&Task` and answer through [`receive`](Self::receive),
/// [`finish`](Self::finish) and [`fail`](Self::fail):
///
/// - `finish` and `fail` are mutually exclusive and each allowed once
/// - `receive` is only allowed before `finish`/`fail`
/// - the first `receive` or `finish` sends the headers; later calls send
///   body bytes only
///
/// Calls breaking these rules return [`Error::ProtocolViolation`].
pub struct Task {
    id: TaskId,
    request: SchemeRequest,
    handler: Arc<dyn SchemeHandler>,
    pool: Weak<PoolShared>,
    state: Mutex<TaskState>,
}

impl Task {
    /// Creates a task bound to its pool.
    pub(crate) fn new(
        id: TaskId,
        request: SchemeRequest,
        handler: Arc<dyn SchemeHandler>,
        pool: Weak<PoolShared>,
    ) -> Self {
        Self {
            id,
            request,
            handler,
            pool,
            state: Mutex::new(TaskState::default()),
        }
    }
}

// ============================================================================
// Task - Accessors
// ============================================================================

impl Task {
    /// Host-supplied task ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The decomposed request.
    #[inline]
    #[must_use]
    pub fn request(&self) -> &SchemeRequest {
        &self.request
    }

    /// Full request URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        self.request.url()
    }

    /// Request scheme.
    #[inline]
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.request.scheme()
    }

    /// Returns `true` once the host stopped the task or it failed.
    ///
    /// Long-running handlers may poll this to stop early.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Returns `true` once `finish` or `fail` was called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Returns `true` if the task ended through `fail` or a handler fault.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state.lock().failed
    }

    /// Returns `true` once a worker picked the task up.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    /// Returns `true` while the handler is executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Returns `true` once the handler has returned.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    /// The failure recorded for this task, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }
}

// ============================================================================
// Task - Response Delivery
// ============================================================================

impl Task {
    /// Sends response headers and/or body bytes.
    ///
    /// The first call sends synthesized headers (see
    /// [`synthesize_headers`]) before any body bytes. Those headers carry no
    /// `Content-Length` unless the reply's metadata sets one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] after `finish` or `fail`.
    pub fn receive(&self, reply: impl Into<Reply>) -> Result<()> {
        let send_headers = {
            let mut state = self.state.lock();
            if state.finished {
                return Err(Error::protocol_violation(
                    self.id,
                    "receive called after finish or fail",
                ));
            }
            !mem::replace(&mut state.headers_sent, true)
        };

        self.deliver_reply(reply.into(), send_headers, false);
        Ok(())
    }

    /// Sends body bytes only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] after `finish` or `fail`.
    #[inline]
    pub fn receive_data(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.receive(Reply::data(data))
    }

    /// Sends any final headers and body, then completes the response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if the task already finished
    /// or failed.
    pub fn finish(&self, reply: impl Into<Reply>) -> Result<()> {
        let send_headers = {
            let mut state = self.state.lock();
            if state.finished {
                return Err(Error::protocol_violation(
                    self.id,
                    "finish called after finish or fail",
                ));
            }
            state.finished = true;
            !mem::replace(&mut state.headers_sent, true)
        };

        self.deliver_reply(reply.into(), send_headers, true);
        self.deliver(|host| host.deliver_finished(self.id));

        debug!(task_id = %self.id, "Task finished");
        Ok(())
    }

    /// Completes the response with a body and content type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if the task already finished
    /// or failed.
    #[inline]
    pub fn finish_with(&self, body: impl Into<Vec<u8>>, content_type: &str) -> Result<()> {
        self.finish(Reply::data(body).with_content_type(content_type))
    }

    /// Fails the resource load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] if the task already finished
    /// or failed.
    pub fn fail(&self, reason: impl fmt::Display) -> Result<()> {
        let reason = reason.to_string();

        {
            let mut state = self.state.lock();
            if state.finished {
                return Err(Error::protocol_violation(
                    self.id,
                    "fail called after finish or fail",
                ));
            }
            state.finished = true;
            state.failed = true;
            state.cancelled = true;
            state.error = Some(reason.clone());
        }

        self.deliver(|host| host.deliver_failed(self.id, &reason));

        debug!(task_id = %self.id, reason = %reason, "Task failed");
        Ok(())
    }

    /// Delivers a reply's headers (when due) and body.
    fn deliver_reply(&self, reply: Reply, send_headers: bool, is_final: bool) {
        let (meta, body, content_type) = reply.into_parts();

        if send_headers {
            // Only a final reply knows the full body length; more chunks may
            // follow a `receive`.
            let body_len = is_final.then(|| body.as_ref().map_or(0, Vec::len));
            let headers = synthesize_headers(
                meta,
                body_len,
                content_type.as_deref(),
                self.request.origin(),
            );
            self.deliver(|host| host.deliver_response_headers(self.id, &headers));
        } else if meta.is_some() || content_type.is_some() {
            debug!(task_id = %self.id, "Headers already sent, ignoring header info");
        }

        if let Some(body) = body.filter(|body| !body.is_empty()) {
            self.deliver(|host| host.deliver_data(self.id, &body));
        }
    }

    /// Invokes the host unless the task was stopped.
    fn deliver(&self, call: impl FnOnce(&dyn SchemeHost)) {
        let Some(pool) = self.pool.upgrade() else {
            trace!(task_id = %self.id, "Pool dropped, delivery suppressed");
            return;
        };

        if pool.is_stopped(self.id) {
            trace!(task_id = %self.id, "Task stopped, delivery suppressed");
            return;
        }

        call(pool.host());
    }
}

// ============================================================================
// Task - Execution
// ============================================================================

impl Task {
    /// Runs the handler to completion, then removes the task from the pool.
    ///
    /// Handler errors and panics are contained here.
    pub(crate) fn run(&self) {
        {
            let mut state = self.state.lock();
            state.started = true;
            state.running = true;
        }

        debug!(task_id = %self.id, url = %self.request.url(), "Task running");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(self)));

        let fault = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(Error::handler(panic_message(payload.as_ref()))),
        };

        match fault {
            Some(fault) => self.record_fault(fault),
            None if !self.is_finished() => {
                warn!(
                    task_id = %self.id,
                    url = %self.request.url(),
                    "Handler returned without finish or fail, no response delivered"
                );
            }
            None => {}
        }

        {
            let mut state = self.state.lock();
            state.running = false;
            state.terminated = true;
        }

        if let Some(pool) = self.pool.upgrade() {
            pool.task_cleanup(self.id);
        }
    }

    /// Logs a handler fault and fails the task if it is still open.
    fn record_fault(&self, fault: Error) {
        let message = fault.to_string();

        error!(
            task_id = %self.id,
            url = %self.request.url(),
            error = %message,
            "Scheme handler failed"
        );

        if self.fail(&message).is_err() {
            self.state.lock().error.get_or_insert(message);
        }
    }

    /// Marks the task as stopped by the host.
    pub(crate) fn mark_cancelled(&self) {
        self.state.lock().cancelled = true;
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("url", &self.request.url())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Extracts the message of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
