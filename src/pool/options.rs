//! Task pool tuning options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use scheme_task_pool::PoolOptions;
//!
//! let options = PoolOptions::new()
//!     .with_max_workers(8)
//!     .with_max_idle(Duration::from_secs(30));
//!
//! assert_eq!(options.max_workers, 8);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Default ceiling on concurrent worker threads.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default sleep between polls of an idle worker.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(100);

/// Default accumulated idle time after which a worker retires.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(10);

/// Default workers-per-task ratio under which a worker is spawned.
pub const DEFAULT_SPAWN_LOW_WATER: f64 = 1.0;

/// Default pause before a stop check.
pub const DEFAULT_STOP_CHECK_DELAY: Duration = Duration::from_millis(1);

/// Default worker thread name prefix.
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "scheme-worker";

// ============================================================================
// PoolOptions
// ============================================================================

/// Tuning knobs for a [`TaskPool`](crate::TaskPool).
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    /// Upper bound on concurrently running workers.
    pub max_workers: usize,

    /// Sleep between queue polls when a worker finds nothing to do.
    pub idle_poll: Duration,

    /// Idle time after which a worker exits.
    pub max_idle: Duration,

    /// A worker is added while `workers / registered tasks` is below this.
    pub spawn_low_water: f64,

    /// Pause taken before each stop check.
    ///
    /// Narrows, but does not close, the window where a stop races a
    /// delivery. Zero disables it.
    pub stop_check_delay: Duration,

    /// Worker threads are named `<prefix>-<worker id>`.
    pub thread_name_prefix: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl PoolOptions {
    /// Creates options with the default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            idle_poll: DEFAULT_IDLE_POLL,
            max_idle: DEFAULT_MAX_IDLE,
            spawn_low_water: DEFAULT_SPAWN_LOW_WATER,
            stop_check_delay: DEFAULT_STOP_CHECK_DELAY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl PoolOptions {
    /// Sets the worker ceiling.
    #[inline]
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Sets the idle poll interval.
    #[inline]
    #[must_use]
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Sets the idle retirement threshold.
    #[inline]
    #[must_use]
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Sets the spawn low-water ratio.
    #[inline]
    #[must_use]
    pub fn with_spawn_low_water(mut self, ratio: f64) -> Self {
        self.spawn_low_water = ratio;
        self
    }

    /// Sets the pause taken before each stop check.
    #[inline]
    #[must_use]
    pub fn with_stop_check_delay(mut self, delay: Duration) -> Self {
        self.stop_check_delay = delay;
        self
    }

    /// Sets the worker thread name prefix.
    #[inline]
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PoolOptions {
    /// Checks the options for values the pool cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid option.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::config("max_workers must be at least 1"));
        }

        if !(self.spawn_low_water.is_finite() && self.spawn_low_water > 0.0) {
            return Err(Error::config(format!(
                "spawn_low_water must be a positive ratio, got {}",
                self.spawn_low_water
            )));
        }

        if self.idle_poll.is_zero() {
            return Err(Error::config("idle_poll must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
