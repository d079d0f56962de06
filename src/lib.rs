//! Scheme Task Pool - serve custom URL schemes for embedded web views.
//!
//! An embedded web view can hand requests for a custom scheme (`app://`,
//! `img://`, ...) to application code instead of the network. The engine
//! delivers *start* and *stop* notifications on its own thread; handlers may
//! run for a long time and must not block it.
//!
//! # Architecture
//!
//! - [`TaskPool`] receives the host's start/stop events, registers a
//!   [`Task`] per request and queues it
//! - up to `max_workers` OS threads run queued tasks through the
//!   [`SchemeHandler`] registered for the scheme, retiring when idle
//! - handlers answer with [`Task::receive`], [`Task::finish`] and
//!   [`Task::fail`]; the pool forwards these to the [`SchemeHost`]
//! - once the host stops a task, nothing more is delivered for it, but its
//!   handler is left to run to completion
//!
//! # Quick Start
//!
//! ```no_run
//! use scheme_task_pool::{Reply, Result, SchemeHost, Task, TaskId, TaskPool};
//!
//! fn serve_pixel(task: &Task) -> Result<()> {
//!     task.finish(Reply::data(vec![0x89, 0x50, 0x4e]).with_content_type("image/png"))
//! }
//!
//! # fn example(host: impl SchemeHost + 'static) -> Result<()> {
//! let pool = TaskPool::builder()
//!     .handler("img", serve_pixel)
//!     .build(host)?;
//!
//! // From the engine's start/stop callbacks:
//! pool.start_url(TaskId::new(1), "img://assets/pixel.png", [("Origin", "app://main")])?;
//! pool.task_stop(TaskId::new(1));
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pool`] | [`TaskPool`], [`Task`], handlers and options |
//! | [`protocol`] | [`SchemeRequest`], [`ResponseMeta`], [`Reply`] |
//! | [`host`] | [`SchemeHost`] delivery boundary |
//! | [`dispatch`] | [`Dispatcher`] callback thread |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Single-consumer callback thread.
pub mod dispatch;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Delivery boundary to the browser engine.
pub mod host;

/// Type-safe identifiers for tasks and workers.
pub mod identifiers;

/// Task pool, tasks, workers and handlers.
pub mod pool;

/// Request decomposition and response types.
pub mod protocol;

// ============================================================================
// Re-exports
// ============================================================================

// Pool types
pub use pool::{
    PoolOptions, PoolStats, SchemeHandler, SchemeHandlers, Task, TaskPool, TaskPoolBuilder,
};

// Protocol types
pub use protocol::{HeaderMap, Reply, ResponseMeta, SchemeRequest};

// Host boundary
pub use host::SchemeHost;

// Dispatcher
pub use dispatch::Dispatcher;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{TaskId, WorkerId};
