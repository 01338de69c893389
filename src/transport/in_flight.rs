use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::AbortHandle;
use tracing::{debug, error, warn};

use crate::transport::{JsonRpcNotification, RequestId};
use crate::types::CancelledNotification;

/// Method of the notification a host sends to abandon a request.
pub(crate) const CANCELLED_METHOD: &str = "notifications/cancelled";

/// The request tasks a connection is still running, by request id.
#[derive(Clone, Default)]
pub(crate) struct InFlight {
    tasks: Arc<Mutex<HashMap<RequestId, AbortHandle>>>,
}

impl InFlight {
    /// Records the task started by `spawn` under `id`.
    ///
    /// The map stays locked while `spawn` runs, so the task cannot try to
    /// [`finish`](Self::finish) before its entry exists.
    pub(crate) fn track(&self, id: RequestId, spawn: impl FnOnce() -> AbortHandle) {
        let mut tasks = self.lock();
        let handle = spawn();
        if tasks.insert(id.clone(), handle).is_some() {
            warn!("Request id {} reused while still in flight", id);
        }
    }

    /// Forgets a request whose task has completed.
    pub(crate) fn finish(&self, id: &RequestId) {
        self.lock().remove(id);
    }

    /// Aborts the request named by a `notifications/cancelled` notification.
    /// Unknown or already finished ids are ignored.
    pub(crate) fn cancel(&self, notification: JsonRpcNotification) {
        let params = notification.params.unwrap_or_default();
        match serde_json::from_value::<CancelledNotification>(params) {
            Ok(cancelled) => {
                if let Some(handle) = self.lock().remove(&cancelled.request_id) {
                    handle.abort();
                    debug!(
                        "Cancelled request {} ({})",
                        cancelled.request_id,
                        cancelled.reason.as_deref().unwrap_or("no reason given")
                    );
                }
            }
            Err(e) => error!("Invalid cancellation notification: {}", e),
        }
    }

    /// Aborts every request still running.
    pub(crate) fn abort_all(&self) {
        for (_, handle) in self.lock().drain() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, AbortHandle>> {
        // Only short non-panicking sections run under the lock.
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cancelled(params: serde_json::Value) -> JsonRpcNotification {
        JsonRpcNotification {
            method: CANCELLED_METHOD.to_string(),
            params: Some(params),
            jsonrpc: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_tracked_task() {
        let in_flight = InFlight::default();
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        in_flight.track(RequestId::Number(9), move || abort);
        assert_eq!(in_flight.len(), 1);

        in_flight.cancel(cancelled(json!({"requestId": 9, "reason": "timeout"})));

        assert!(task.await.unwrap_err().is_cancelled());
        assert_eq!(in_flight.len(), 0);
    }

    #[tokio::test]
    async fn test_cancel_ignores_unknown_and_malformed_ids() {
        let in_flight = InFlight::default();
        let task = tokio::spawn(std::future::pending::<()>());
        let abort = task.abort_handle();
        in_flight.track(RequestId::String("a".to_string()), move || abort);

        in_flight.cancel(cancelled(json!({"requestId": "b"})));
        in_flight.cancel(cancelled(json!({"reason": "no id"})));

        assert_eq!(in_flight.len(), 1);
        in_flight.abort_all();
        assert!(task.await.unwrap_err().is_cancelled());
    }
}
