//! Custom-scheme task pool.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TaskPool`] | Registry, FIFO queue and elastic worker set |
//! | [`TaskPoolBuilder`] | Fluent configuration builder |
//! | [`PoolOptions`] | Worker ceiling, idle retirement, spawn ratio |
//! | [`Task`] | One in-flight request handed to a handler |
//! | [`SchemeHandler`] | Application code serving one scheme |
//!
//! # Control Flow
//!
//! ```text
//! host ─► TaskPool::task_start ─► queue ─► Worker ─► handler(&Task)
//!                                                    │
//!          host ◄── deliver_* (unless stopped) ◄─────┘ receive/finish/fail
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for pool configuration.
pub mod builder;

/// Task pool implementation.
pub mod core;

/// Scheme handler trait and registry.
pub mod handler;

/// Pool tuning options.
pub mod options;

/// Per-request task state machine.
pub mod task;

mod worker;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::TaskPoolBuilder;
pub use self::core::{PoolStats, TaskPool};
pub use handler::{SchemeHandler, SchemeHandlers};
pub use options::PoolOptions;
pub use task::Task;
