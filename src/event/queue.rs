//! Bounded hand-off between the tail engine and the notification worker

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::event::Alert;

/// Create a bounded alert queue.
///
/// The sending half stays with the tail engine, the receiver goes to
/// [`AlertWorker`](crate::monitoring::AlertWorker).
pub fn alert_channel(capacity: usize) -> (AlertQueue, mpsc::Receiver<Alert>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (AlertQueue { tx }, rx)
}

/// Non-blocking sender side of the alert queue
#[derive(Debug, Clone)]
pub struct AlertQueue {
    tx: mpsc::Sender<Alert>,
}

impl AlertQueue {
    /// Enqueue an alert without waiting.
    ///
    /// Returns `false` when the alert was dropped because the queue is full or
    /// the worker has gone away. Tailing never waits on the worker.
    pub fn enqueue(&self, alert: Alert) -> bool {
        let id = alert.id;
        let kind = alert.kind();
        match self.tx.try_send(alert) {
            Ok(()) => {
                debug!(alert_id = %id, kind = %kind, "Alert queued for dispatch");
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(alert_id = %id, kind = %kind, "Alert queue full, dropping alert");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(alert_id = %id, kind = %kind, "Notification worker stopped, dropping alert");
                false
            }
        }
    }
}
