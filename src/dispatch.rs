//! Single-consumer job queue on a dedicated thread.
//!
//! Hosts use a [`Dispatcher`] to marshal callbacks (script messages,
//! navigation notifications, JS evaluation results) off the engine's thread
//! onto one auxiliary thread, in submission order. It is independent of the
//! task pool.
//!
//! # Example
//!
//! ```
//! use std::sync::mpsc;
//! use scheme_task_pool::Dispatcher;
//!
//! let dispatcher = Dispatcher::start("webview-dispatch")?;
//! let (tx, rx) = mpsc::channel();
//!
//! dispatcher.dispatch(move || tx.send("loaded").unwrap())?;
//! assert_eq!(rx.recv().unwrap(), "loaded");
//!
//! dispatcher.stop(true);
//! # Ok::<(), scheme_task_pool::Error>(())
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// A queued unit of work.
type Job = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// Dispatcher
// ============================================================================

/// Runs submitted jobs one at a time on its own thread.
///
/// A panicking job is logged and skipped; later jobs still run.
pub struct Dispatcher {
    /// Thread name, for logs.
    name: String,
    /// Job sender; `None` once stopped.
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    /// Consumer thread handle; `None` once joined.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawns the consumer thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the thread cannot be spawned.
    pub fn start(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || Self::run(rx))?;

        debug!(name = %name, "Dispatcher started");

        Ok(Self {
            name,
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Queues a job.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DispatcherClosed`] after [`stop`](Self::stop).
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let tx = self.tx.lock();
        let tx = tx.as_ref().ok_or(Error::DispatcherClosed)?;

        tx.send(Box::new(job)).map_err(|_| Error::DispatcherClosed)
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tx.lock().is_some()
    }

    /// Stops accepting jobs. Already queued jobs still run.
    ///
    /// With `join`, blocks until the queue is drained. Joining from a job
    /// running on the dispatcher itself does not block.
    pub fn stop(&self, join: bool) {
        if self.tx.lock().take().is_some() {
            debug!(name = %self.name, "Dispatcher stopping");
        }

        if !join {
            return;
        }

        let Some(handle) = self.handle.lock().take() else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            error!(name = %self.name, "Dispatcher thread panicked");
        }
    }

    /// Consumer loop.
    fn run(mut rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = rx.blocking_recv() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!(error = %message, "Dispatched job panicked");
            }
        }

        debug!("Dispatcher queue closed");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop(false);
    }
}

// ============================================================================
// Tests
// ============================================================================
