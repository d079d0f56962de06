//! Task pool: the single entry point for the host's start/stop events.
//!
//! # Architecture
//!
//! ```text
//!  host thread                       worker threads (≤ max_workers)
//! ┌─────────────┐  task_start  ┌──────────────────────────────┐
//! │  start(id)  │─────────────►│ registry  id → Task, stopped │
//! │  stop(id)   │─────────────►│ queue     FIFO of Task       │◄── next_task
//! └─────────────┘   task_stop  │ workers   id → JoinHandle    │
//!                              └──────────────────────────────┘
//! ```
//!
//! The registry, queue and worker set each have their own lock. A lock is
//! always released before the next one is taken and none is held across a
//! handler or host call.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};
use crate::host::SchemeHost;
use crate::identifiers::{TaskId, WorkerId};
use crate::protocol::SchemeRequest;

use super::builder::TaskPoolBuilder;
use super::handler::SchemeHandlers;
use super::options::PoolOptions;
use super::task::Task;
use super::worker::Worker;

// ============================================================================
// Constants
// ============================================================================

/// Poll interval of [`TaskPool::wait_idle`].
const WAIT_IDLE_POLL: Duration = Duration::from_millis(5);

// ============================================================================
// Registry
// ============================================================================

/// Live tasks and the ids the host stopped while they were live.
#[derive(Default)]
struct Registry {
    tasks: FxHashMap<TaskId, Arc<Task>>,
    stopped: FxHashSet<TaskId>,
}

// ============================================================================
// PoolShared
// ============================================================================

/// State shared between the pool handle, its workers and its tasks.
pub(crate) struct PoolShared {
    handlers: SchemeHandlers,
    host: Arc<dyn SchemeHost>,
    options: PoolOptions,
    registry: Mutex<Registry>,
    queue: Mutex<VecDeque<Arc<Task>>>,
    workers: Mutex<FxHashMap<WorkerId, JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl PoolShared {
    /// Options the pool was built with.
    #[inline]
    pub(crate) fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// The host receiving deliveries.
    #[inline]
    pub(crate) fn host(&self) -> &dyn SchemeHost {
        &*self.host
    }

    /// Returns `true` once shutdown began.
    #[inline]
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Returns `true` if the host stopped `id`.
    ///
    /// Sleeps `stop_check_delay` first. This narrows the window in which a
    /// concurrent stop is missed; it does not close it.
    pub(crate) fn is_stopped(&self, id: TaskId) -> bool {
        let delay = self.options.stop_check_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.registry.lock().stopped.contains(&id)
    }

    /// Pops the head of the pending queue.
    pub(crate) fn next_task(&self) -> Option<Arc<Task>> {
        self.queue.lock().pop_front()
    }

    /// Number of queued tasks not yet picked up.
    pub(crate) fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Removes a finished task from the registry and the stopped set.
    pub(crate) fn task_cleanup(&self, id: TaskId) {
        let mut registry = self.registry.lock();
        registry.tasks.remove(&id);
        registry.stopped.remove(&id);
        drop(registry);

        trace!(task_id = %id, "Task removed from registry");
    }

    /// Removes a retiring worker from the worker set.
    pub(crate) fn deregister_worker(&self, id: WorkerId) {
        self.workers.lock().remove(&id);
    }

    /// Spawns one worker if workers are scarce relative to tasks.
    ///
    /// A worker is added while `workers / registered < spawn_low_water`
    /// and the ceiling is not reached.
    pub(crate) fn scale_workers(self: &Arc<Self>) -> Result<()> {
        if self.is_shutdown() {
            return Ok(());
        }

        let registered = self.registry.lock().tasks.len();
        if registered == 0 {
            return Ok(());
        }

        // Held across the spawn so a fast-retiring worker deregisters after
        // its insert.
        let mut workers = self.workers.lock();
        let running = workers.len();
        let ratio = running as f64 / registered as f64;

        if ratio >= self.options.spawn_low_water || running >= self.options.max_workers {
            return Ok(());
        }

        let worker_id = WorkerId::next();
        let handle = Worker::new(worker_id, Arc::clone(self)).spawn()?;
        workers.insert(worker_id, handle);

        debug!(
            worker_id = %worker_id,
            workers = running + 1,
            tasks = registered,
            "Worker spawned"
        );

        Ok(())
    }
}

// ============================================================================
// PoolStats
// ============================================================================

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Tasks registered and not yet cleaned up.
    pub tasks: usize,
    /// Tasks waiting for a worker.
    pub pending: usize,
    /// Registered tasks the host has stopped.
    pub stopped: usize,
    /// Live worker threads.
    pub workers: usize,
}

// ============================================================================
// TaskPool
// ============================================================================

/// Bounded, self-shrinking worker pool serving custom-scheme tasks.
///
/// `task_start` and `task_stop` only touch the registry and queue, so they
/// return quickly on the host's thread. Handlers run on up to
/// `max_workers` OS threads, spawned on demand and retired after
/// `max_idle` without work.
///
/// # Example
///
/// ```no_run
/// use scheme_task_pool::{Reply, Result, SchemeHost, Task, TaskId, TaskPool};
/// # fn example(host: impl SchemeHost + 'static) -> Result<()> {
/// let pool = TaskPool::builder()
///     .handler("app", |task: &Task| -> Result<()> {
///         task.finish(Reply::data("<h1>hello</h1>").with_content_type("text/html"))
///     })
///     .build(host)?;
///
/// pool.start_url(TaskId::new(1), "app://main/index.html", [("Accept", "text/html")])?;
/// # Ok(())
/// # }
/// ```
pub struct TaskPool {
    shared: Arc<PoolShared>,
}

// ============================================================================
// TaskPool - Constructor
// ============================================================================

impl TaskPool {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> TaskPoolBuilder {
        TaskPoolBuilder::new()
    }

    /// Creates a pool from validated parts. No worker is started yet.
    pub(crate) fn from_parts(
        handlers: SchemeHandlers,
        host: Arc<dyn SchemeHost>,
        options: PoolOptions,
    ) -> Self {
        info!(
            schemes = ?handlers.schemes(),
            max_workers = options.max_workers,
            "TaskPool created"
        );

        Self {
            shared: Arc::new(PoolShared {
                handlers,
                host,
                options,
                registry: Mutex::new(Registry::default()),
                queue: Mutex::new(VecDeque::new()),
                workers: Mutex::new(FxHashMap::default()),
                shutdown: AtomicBool::new(false),
            }),
        }
    }
}

// ============================================================================
// TaskPool - Host Events
// ============================================================================

impl TaskPool {
    /// Registers and enqueues a task for `request`.
    ///
    /// Starting an id that is still registered is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownScheme`] if no handler serves `request.scheme()`
    /// - [`Error::PoolShutdown`] after [`shutdown`](Self::shutdown)
    pub fn task_start(&self, id: TaskId, request: SchemeRequest) -> Result<()> {
        if self.shared.is_shutdown() {
            return Err(Error::PoolShutdown);
        }

        if self.is_registered(id) {
            debug!(task_id = %id, "Task already registered, ignoring start");
            return Ok(());
        }

        let handler = self
            .shared
            .handlers
            .get(request.scheme())
            .ok_or_else(|| Error::unknown_scheme(request.scheme()))?;

        let task = Arc::new(Task::new(
            id,
            request,
            handler,
            Arc::downgrade(&self.shared),
        ));

        {
            let mut registry = self.shared.registry.lock();
            if registry.tasks.contains_key(&id) {
                debug!(task_id = %id, "Task already registered, ignoring start");
                return Ok(());
            }
            registry.tasks.insert(id, Arc::clone(&task));
        }

        debug!(task_id = %id, url = %task.url(), "Task registered");

        self.shared.queue.lock().push_back(task);

        if let Err(e) = self.shared.scale_workers() {
            error!(error = %e, "Failed to spawn worker");
        }

        Ok(())
    }

    /// Decomposes a raw URL and headers, then starts the task.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `url` does not parse
    /// - everything [`task_start`](Self::task_start) returns
    pub fn start_url<I, K, V>(&self, id: TaskId, url: &str, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = SchemeRequest::decompose(url, headers)?;
        self.task_start(id, request)
    }

    /// Records that the host stopped `id`.
    ///
    /// The task stays registered until its handler returns; from now on
    /// none of its deliveries reach the host.
    pub fn task_stop(&self, id: TaskId) {
        let task = {
            let mut registry = self.shared.registry.lock();
            match registry.tasks.get(&id).cloned() {
                Some(task) => {
                    registry.stopped.insert(id);
                    task
                }
                None => {
                    trace!(task_id = %id, "Stop for unknown task ignored");
                    return;
                }
            }
        };

        task.mark_cancelled();
        debug!(task_id = %id, "Task stopped by host");
    }

    /// Returns `true` if the host stopped `id` and it is still registered.
    ///
    /// Best effort: see [`PoolOptions::stop_check_delay`].
    #[must_use]
    pub fn is_stopped(&self, id: TaskId) -> bool {
        self.shared.is_stopped(id)
    }
}

// ============================================================================
// TaskPool - Observability
// ============================================================================

impl TaskPool {
    /// Number of registered tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.shared.registry.lock().tasks.len()
    }

    /// Number of tasks waiting for a worker.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending_count()
    }

    /// Number of live worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.workers.lock().len()
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn is_registered(&self, id: TaskId) -> bool {
        self.shared.registry.lock().tasks.contains_key(&id)
    }

    /// Options the pool runs with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        self.shared.options()
    }

    /// Registered scheme names.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        self.shared.handlers.schemes()
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (tasks, stopped) = {
            let registry = self.shared.registry.lock();
            (registry.tasks.len(), registry.stopped.len())
        };

        PoolStats {
            tasks,
            stopped,
            pending: self.pending_count(),
            workers: self.worker_count(),
        }
    }

    /// Blocks until no task is registered or `timeout` elapses.
    ///
    /// Returns `true` if the pool drained.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            if self.task_count() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(WAIT_IDLE_POLL);
        }
    }
}

// ============================================================================
// TaskPool - Lifecycle
// ============================================================================

impl TaskPool {
    /// Stops accepting tasks and retires all workers.
    ///
    /// Queued tasks that no worker picked up are dropped without any host
    /// call. Running handlers complete normally. With `join`, blocks until
    /// every worker thread has exited.
    pub fn shutdown(&self, join: bool) {
        if self.shared.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("TaskPool shutting down");

        let dropped: Vec<_> = self.shared.queue.lock().drain(..).collect();
        for task in &dropped {
            self.shared.task_cleanup(task.id());
        }
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "Dropped queued tasks on shutdown");
        }

        if join {
            let handles: Vec<_> = self.shared.workers.lock().drain().collect();
            let current = thread::current().id();

            for (worker_id, handle) in handles {
                if handle.thread().id() == current {
                    continue;
                }
                if handle.join().is_err() {
                    error!(worker_id = %worker_id, "Worker thread panicked");
                }
            }
        }

        info!("TaskPool shutdown complete");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("schemes", &self.schemes())
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::mpsc;

    use crate::host::{Delivery, RecordingHost};
    use crate::protocol::Reply;

    fn fast_options() -> PoolOptions {
        PoolOptions::new()
            .with_idle_poll(Duration::from_millis(5))
            .with_max_idle(Duration::from_millis(200))
            .with_stop_check_delay(Duration::ZERO)
    }

    fn request(url: &str) -> SchemeRequest {
        SchemeRequest::decompose(url, [("Accept", "*/*")]).expect("valid url")
    }

    #[test]
    fn test_unknown_scheme_creates_no_task() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |task: &Task| -> Result<()> { task.finish(Reply::new()) })
            .options(fast_options())
            .build(Arc::clone(&host))
            .expect("build pool");

        let err = pool
            .task_start(TaskId::new(1), request("nope://x/y"))
            .unwrap_err();

        assert!(matches!(err, Error::UnknownScheme { ref scheme } if scheme == "nope"));
        assert_eq!(pool.task_count(), 0);
        assert_eq!(pool.worker_count(), 0);
    }

    #[test]
    fn test_duplicate_start_runs_handler_once() {
        let host = Arc::new(RecordingHost::default());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);
        let calls = Arc::new(Mutex::new(0_usize));
        let calls_in_handler = Arc::clone(&calls);

        let pool = TaskPool::builder()
            .handler("app", move |task: &Task| -> Result<()> {
                *calls_in_handler.lock() += 1;
                let _ = release_rx.lock().recv();
                task.finish(Reply::new())
            })
            .options(fast_options())
            .build(Arc::clone(&host))
            .expect("build pool");

        let id = TaskId::new(7);
        pool.task_start(id, request("app://main/a")).expect("start");
        pool.task_start(id, request("app://main/a")).expect("duplicate start");
        assert_eq!(pool.task_count(), 1);

        release_tx.send(()).expect("release");
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(*calls.lock(), 1);
        assert_eq!(
            host.for_task(id)
                .iter()
                .filter(|d| matches!(d, Delivery::Finished(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_duplicate_start_skips_scheme_lookup() {
        let host = Arc::new(RecordingHost::default());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let pool = TaskPool::builder()
            .handler("app", move |task: &Task| -> Result<()> {
                let _ = release_rx.lock().recv();
                task.finish(Reply::new())
            })
            .options(fast_options())
            .build(Arc::clone(&host))
            .expect("build pool");

        let id = TaskId::new(8);
        pool.task_start(id, request("app://main/a")).expect("start");
        pool.task_start(id, request("nope://x/"))
            .expect("duplicate start of a live id is a no-op");
        assert_eq!(pool.task_count(), 1);

        release_tx.send(()).expect("release");
        assert!(pool.wait_idle(Duration::from_secs(5)));

        assert!(matches!(
            pool.task_start(id, request("nope://x/")),
            Err(Error::UnknownScheme { .. })
        ));
    }

    #[test]
    fn test_stop_unknown_task_is_noop() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |task: &Task| -> Result<()> { task.finish(Reply::new()) })
            .options(fast_options())
            .build(Arc::clone(&host))
            .expect("build pool");

        pool.task_stop(TaskId::new(99));
        assert!(!pool.is_stopped(TaskId::new(99)));
        assert_eq!(pool.stats().stopped, 0);
    }

    #[test]
    fn test_handler_panic_becomes_failure() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |_: &Task| -> Result<()> { panic!("template missing") })
            .options(fast_options())
            .build(Arc::clone(&host))
            .expect("build pool");

        let id = TaskId::new(3);
        pool.task_start(id, request("app://main/broken")).expect("start");
        assert!(pool.wait_idle(Duration::from_secs(5)));

        assert_eq!(
            host.for_task(id),
            vec![Delivery::Failed(
                id,
                "Handler fault: handler panicked: template missing".to_string()
            )]
        );
    }

    #[test]
    fn test_handler_error_becomes_failure_and_worker_survives() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |task: &Task| -> Result<()> {
                if task.request().path() == "/bad" {
                    return Err(Error::handler("no such view"));
                }
                task.finish(Reply::data("ok"))
            })
            .options(fast_options().with_max_workers(1))
            .build(Arc::clone(&host))
            .expect("build pool");

        pool.task_start(TaskId::new(1), request("app://main/bad")).expect("start");
        pool.task_start(TaskId::new(2), request("app://main/good")).expect("start");
        assert!(pool.wait_idle(Duration::from_secs(5)));

        assert_eq!(
            host.for_task(TaskId::new(1)),
            vec![Delivery::Failed(TaskId::new(1), "Handler fault: no such view".into())]
        );
        assert!(matches!(
            host.for_task(TaskId::new(2)).last(),
            Some(Delivery::Finished(_))
        ));
    }

    #[test]
    fn test_fifo_order_with_single_worker() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |task: &Task| -> Result<()> { task.finish(Reply::new()) })
            .options(fast_options().with_max_workers(1))
            .build(Arc::clone(&host))
            .expect("build pool");

        for raw in 1..=5 {
            pool.task_start(TaskId::new(raw), request("app://main/"))
                .expect("start");
        }
        assert!(pool.wait_idle(Duration::from_secs(5)));

        let finished: Vec<u64> = host
            .deliveries()
            .iter()
            .filter_map(|d| match d {
                Delivery::Finished(id) => Some(id.as_u64()),
                _ => None,
            })
            .collect();
        assert_eq!(finished, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_workers_retire_when_idle() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |task: &Task| -> Result<()> { task.finish(Reply::new()) })
            .options(fast_options().with_max_idle(Duration::from_millis(30)))
            .build(Arc::clone(&host))
            .expect("build pool");

        pool.task_start(TaskId::new(1), request("app://main/")).expect("start");
        assert!(pool.wait_idle(Duration::from_secs(5)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.worker_count() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.worker_count(), 0);

        pool.task_start(TaskId::new(2), request("app://main/")).expect("restart");
        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert!(matches!(
            host.for_task(TaskId::new(2)).last(),
            Some(Delivery::Finished(_))
        ));
    }

    #[test]
    fn test_shutdown_rejects_new_tasks() {
        let host = Arc::new(RecordingHost::default());
        let pool = TaskPool::builder()
            .handler("app", |task: &Task| -> Result<()> { task.finish(Reply::new()) })
            .options(fast_options())
            .build(Arc::clone(&host))
            .expect("build pool");

        pool.task_start(TaskId::new(1), request("app://main/")).expect("start");
        assert!(pool.wait_idle(Duration::from_secs(5)));

        pool.shutdown(true);
        assert!(pool.is_shutdown());
        assert_eq!(pool.worker_count(), 0);
        assert!(matches!(
            pool.task_start(TaskId::new(2), request("app://main/")),
            Err(Error::PoolShutdown)
        ));
    }

    #[test]
    fn test_stats_serialize() {
        let stats = PoolStats {
            tasks: 2,
            pending: 1,
            stopped: 0,
            workers: 1,
        };
        let json = serde_json::to_value(stats).expect("serialize");
        assert_eq!(json["tasks"], 2);
        assert_eq!(json["workers"], 1);
    }
}
