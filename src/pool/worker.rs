//! Worker thread loop.
//!
//! A worker pulls tasks until it has been idle for `max_idle`, then
//! deregisters itself. There is no per-worker shutdown signal; the pool's
//! shutdown flag is checked between tasks.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;
use crate::identifiers::WorkerId;

use super::core::PoolShared;

// ============================================================================
// Worker
// ============================================================================

/// Long-lived task runner.
pub(crate) struct Worker {
    id: WorkerId,
    pool: Arc<PoolShared>,
}

impl Worker {
    /// Creates a worker for `pool`.
    pub(crate) fn new(id: WorkerId, pool: Arc<PoolShared>) -> Self {
        Self { id, pool }
    }

    /// Starts the worker on a named OS thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the thread cannot be spawned.
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        let name = format!("{}-{}", self.pool.options().thread_name_prefix, self.id);
        let handle = thread::Builder::new().name(name).spawn(move || self.run())?;
        Ok(handle)
    }

    fn run(self) {
        let idle_poll = self.pool.options().idle_poll;
        let max_idle = self.pool.options().max_idle;

        let mut idle = Duration::ZERO;
        let mut served: u64 = 0;

        debug!(worker_id = %self.id, "Worker started");

        loop {
            if self.pool.is_shutdown() {
                break;
            }

            if let Some(task) = self.pool.next_task() {
                idle = Duration::ZERO;
                task.run();
                served += 1;
                continue;
            }

            if idle >= max_idle {
                break;
            }

            let slept = Instant::now();
            thread::sleep(idle_poll);
            idle += slept.elapsed();
        }

        self.pool.deregister_worker(self.id);
        debug!(worker_id = %self.id, served, "Worker retired");

        // A task enqueued after the last poll may have seen this worker as
        // live and skipped spawning.
        if self.pool.pending_count() > 0
            && let Err(e) = self.pool.scale_workers()
        {
            warn!(worker_id = %self.id, error = %e, "Failed to replace retired worker");
        }
    }
}
