//! Outbound boundary to the browser engine.
//!
//! The host delivers `start`/`stop` events to [`TaskPool`](crate::TaskPool)
//! and receives responses through [`SchemeHost`]. Implementations forward
//! each call to the native task object (e.g. `WKURLSchemeTask`).
//!
//! # Contract
//!
//! For a given task id the pool calls, in order: at most one
//! [`deliver_response_headers`](SchemeHost::deliver_response_headers), any
//! number of [`deliver_data`](SchemeHost::deliver_data), then at most one of
//! [`deliver_finished`](SchemeHost::deliver_finished) or
//! [`deliver_failed`](SchemeHost::deliver_failed). No call is made once the
//! pool has observed a stop for that id.
//!
//! Calls arrive on worker threads, never on the thread that delivered the
//! start/stop events.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::identifiers::TaskId;
use crate::protocol::ResponseMeta;

// ============================================================================
// SchemeHost
// ============================================================================

/// Consumer of task responses.
pub trait SchemeHost: Send + Sync {
    /// Delivers the status line and headers.
    fn deliver_response_headers(&self, id: TaskId, response: &ResponseMeta);

    /// Delivers a chunk of body bytes.
    fn deliver_data(&self, id: TaskId, data: &[u8]);

    /// Signals that the response is complete.
    fn deliver_finished(&self, id: TaskId);

    /// Signals that the resource load failed.
    fn deliver_failed(&self, id: TaskId, reason: &str);
}

impl<H: SchemeHost + ?Sized> SchemeHost for Arc<H> {
    fn deliver_response_headers(&self, id: TaskId, response: &ResponseMeta) {
        (**self).deliver_response_headers(id, response);
    }

    fn deliver_data(&self, id: TaskId, data: &[u8]) {
        (**self).deliver_data(id, data);
    }

    fn deliver_finished(&self, id: TaskId) {
        (**self).deliver_finished(id);
    }

    fn deliver_failed(&self, id: TaskId, reason: &str) {
        (**self).deliver_failed(id, reason);
    }
}

// ============================================================================
// Test Support
// ============================================================================

/// Host deliveries recorded by [`RecordingHost`].
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Delivery {
    Headers(TaskId, ResponseMeta),
    Data(TaskId, Vec<u8>),
    Finished(TaskId),
    Failed(TaskId, String),
}

#[cfg(test)]
impl Delivery {
    pub(crate) fn task_id(&self) -> TaskId {
        match self {
            Self::Headers(id, _) | Self::Data(id, _) | Self::Finished(id) | Self::Failed(id, _) => {
                *id
            }
        }
    }
}

/// Host that records every delivery in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    deliveries: parking_lot::Mutex<Vec<Delivery>>,
}

#[cfg(test)]
impl RecordingHost {
    pub(crate) fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub(crate) fn for_task(&self, id: TaskId) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .iter()
            .filter(|delivery| delivery.task_id() == id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
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
