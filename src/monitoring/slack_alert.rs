//! Slack incoming-webhook notification sink
//!
//! Posts a plain `text` message with one colored attachment carrying the
//! severity color and a footer.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use crate::event::Severity;
use crate::monitoring::dispatcher::NotificationSink;
use crate::utils::AppError;

/// Slack webhook message payload
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlackMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<SlackAttachment>,
}

/// Colored side bar + footer under the message
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlackAttachment {
    /// Hex color, e.g. `#E01E5A`
    pub color: String,
    pub footer: String,
    /// Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

/// Slack color constants
pub mod colors {
    /// Critical - red
    pub const CRITICAL: &str = "#E01E5A";
    /// Warning - amber
    pub const WARNING: &str = "#ECB22E";
}

pub fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => colors::CRITICAL,
        Severity::Warning => colors::WARNING,
    }
}

/// Slack incoming-webhook client
#[derive(Debug, Clone)]
pub struct SlackWebhook {
    webhook_url: String,
    client: Client,
}

impl SlackWebhook {
    /// Build a webhook client whose every request is bounded by `timeout`
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            error!(error = %e, "Failed to build HTTP client");
            AppError::internal_error(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }
}

#[async_trait]
impl NotificationSink for SlackWebhook {
    async fn send(&self, message: &SlackMessage) -> Result<(), AppError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send Slack webhook");
                AppError::WebhookTransport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Slack webhook returned error");
            return Err(AppError::WebhookStatus {
                status: status.as_u16(),
                body,
            });
        }

        info!("Slack alert sent successfully");
        Ok(())
    }
}
