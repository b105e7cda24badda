//! Alert formatting and delivery
//!
//! Turns an [`Alert`] into a human-readable message and hands it to the
//! configured notification sink. Without a sink the alert is only logged.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::event::{Alert, AlertPayload};
use crate::monitoring::error_rate::format_percent;
use crate::monitoring::slack_alert::{severity_color, SlackAttachment, SlackMessage};
use crate::utils::AppError;

const FOOTER_PREFIX: &str = "pool-watcher";

/// Outbound transport for formatted notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one message; only a 2xx response counts as delivered
    async fn send(&self, message: &SlackMessage) -> Result<(), AppError>;
}

/// Successful dispatch result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// No endpoint configured, alert was logged locally
    LoggedOnly,
}

#[derive(Clone)]
pub struct AlertDispatcher {
    sink: Option<Arc<dyn NotificationSink>>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Dispatcher without a sink: alerts are logged, never delivered
    pub fn log_only() -> Self {
        Self { sink: None }
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Format and deliver an alert.
    ///
    /// A delivery failure is returned to the caller but never retried here;
    /// the detector's cooldown has already been consumed.
    #[instrument(skip(self, alert), fields(alert_id = %alert.id, kind = %alert.kind()))]
    pub async fn dispatch(&self, alert: &Alert) -> Result<DispatchOutcome, AppError> {
        let message = build_message(alert);
        let payload = serde_json::to_string(&alert.payload).unwrap_or_default();
        warn!(text = %message.text, payload = %payload, "ALERT");

        let Some(sink) = &self.sink else {
            warn!("SLACK_WEBHOOK_URL not set, skipping notification");
            return Ok(DispatchOutcome::LoggedOnly);
        };

        match sink.send(&message).await {
            Ok(()) => {
                info!("Alert delivered");
                Ok(DispatchOutcome::Delivered)
            }
            Err(e) => {
                error!(error = %e, error_code = e.error_code(), "Alert delivery failed");
                Err(e)
            }
        }
    }
}

/// Build the webhook payload for an alert
pub fn build_message(alert: &Alert) -> SlackMessage {
    SlackMessage {
        text: format_message(alert),
        attachments: vec![SlackAttachment {
            color: severity_color(alert.severity()).to_string(),
            footer: format!("{} | {}", FOOTER_PREFIX, alert.kind()),
            ts: Some(alert.detected_at.timestamp()),
        }],
    }
}

/// Human-readable alert text. Same alert, same text.
pub fn format_message(alert: &Alert) -> String {
    let mut text = match &alert.payload {
        AlertPayload::Failover {
            from_pool, to_pool, ..
        } => format!("FAILOVER DETECTED\nPool switched: {} → {}", from_pool, to_pool),
        AlertPayload::ErrorRate {
            error_rate,
            errors,
            window_len,
            threshold,
            current_pool,
            ..
        } => format!(
            "HIGH ERROR RATE DETECTED\n\
             Error Rate: {}\n\
             Threshold: {}\n\
             Errors: {}/{} requests\n\
             Current Pool: {}",
            format_percent(*error_rate),
            format_percent(*threshold),
            errors,
            window_len,
            current_pool.as_deref().unwrap_or("unknown"),
        ),
    };

    let _ = write!(
        text,
        "\nTime: {}",
        alert.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(record) = alert.record() {
        let _ = write!(
            text,
            "\n\nDetails:\
             \n- Pool: {}\
             \n- Release: {}\
             \n- Upstream: {}\
             \n- Upstream Status: {}\
             \n- Request Time: {}s\
             \n- Upstream Response Time: {}s",
            record.pool,
            record.release,
            record.upstream,
            record.upstream_status,
            record.request_time,
            record.upstream_response_time,
        );
    }

    text
}
