//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use scheme_task_pool::{PoolOptions, ResponseMeta, SchemeHost, TaskId};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// RecordingHost
// ============================================================================

/// One host-bound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Headers(TaskId, ResponseMeta),
    Data(TaskId, Vec<u8>),
    Finished(TaskId),
    Failed(TaskId, String),
}

impl Delivery {
    pub fn task_id(&self) -> TaskId {
        match self {
            Self::Headers(id, _) | Self::Data(id, _) | Self::Finished(id) | Self::Failed(id, _) => {
                *id
            }
        }
    }
}

/// Host that records every delivery in call order.
#[derive(Debug, Default)]
pub struct RecordingHost {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn for_task(&self, id: TaskId) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .iter()
            .filter(|delivery| delivery.task_id() == id)
            .cloned()
            .collect()
    }

    /// Headers delivered for `id`, if any.
    pub fn headers_for(&self, id: TaskId) -> Option<ResponseMeta> {
        self.for_task(id).into_iter().find_map(|delivery| match delivery {
            Delivery::Headers(_, meta) => Some(meta),
            _ => None,
        })
    }
}

impl SchemeHost for RecordingHost {
    fn deliver_response_headers(&self, id: TaskId, response: &ResponseMeta) {
        self.deliveries
            .lock()
            .push(Delivery::Headers(id, response.clone()));
    }

    fn deliver_data(&self, id: TaskId, data: &[u8]) {
        self.deliveries.lock().push(Delivery::Data(id, data.to_vec()));
    }

    fn deliver_finished(&self, id: TaskId) {
        self.deliveries.lock().push(Delivery::Finished(id));
    }

    fn deliver_failed(&self, id: TaskId, reason: &str) {
        self.deliveries
            .lock()
            .push(Delivery::Failed(id, reason.to_string()));
    }
}

// ============================================================================
// Gate
// ============================================================================

/// One-shot latch handlers block on.
#[derive(Debug, Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock() = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cv.wait(&mut open);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Options with short poll/idle intervals and no stop-check pause.
pub fn fast_options() -> PoolOptions {
    PoolOptions::new()
        .with_idle_poll(Duration::from_millis(5))
        .with_max_idle(Duration::from_millis(500))
        .with_stop_check_delay(Duration::ZERO)
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
