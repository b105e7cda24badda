//! Notification worker
//!
//! Drains the alert queue and dispatches each alert, so a slow or unreachable
//! webhook never holds up log tailing.

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::event::Alert;
use crate::monitoring::dispatcher::{AlertDispatcher, DispatchOutcome};
use crate::utils::AppError;

/// Running totals kept by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub delivered: u64,
    pub logged_only: u64,
    pub failed: u64,
}

pub struct AlertWorker {
    receiver: mpsc::Receiver<Alert>,
    dispatcher: AlertDispatcher,
    stats: WorkerStats,
}

impl AlertWorker {
    pub fn new(receiver: mpsc::Receiver<Alert>, dispatcher: AlertDispatcher) -> Self {
        Self {
            receiver,
            dispatcher,
            stats: WorkerStats::default(),
        }
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Wait for one alert and dispatch it.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn process_once(&mut self) -> Option<Result<DispatchOutcome, AppError>> {
        let alert = self.receiver.recv().await?;
        let result = self.dispatcher.dispatch(&alert).await;

        match &result {
            Ok(DispatchOutcome::Delivered) => self.stats.delivered += 1,
            Ok(DispatchOutcome::LoggedOnly) => self.stats.logged_only += 1,
            Err(e) => {
                self.stats.failed += 1;
                // Not retried: the next eligible occurrence will try again
                warn!(
                    alert_id = %alert.id,
                    kind = %alert.kind(),
                    error_code = e.error_code(),
                    "Alert not delivered"
                );
            }
        }

        Some(result)
    }

    /// Dispatch alerts until every sender has been dropped
    #[instrument(skip(self), level = "info")]
    pub async fn run(mut self) -> WorkerStats {
        info!(webhook = self.dispatcher.has_sink(), "Starting notification worker");

        while let Some(result) = self.process_once().await {
            debug!(ok = result.is_ok(), "Alert processed");
        }

        info!(
            delivered = self.stats.delivered,
            logged_only = self.stats.logged_only,
            failed = self.stats.failed,
            "Notification worker stopped"
        );
        self.stats
    }
}
