//! Alert structure and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::monitoring::LogRecord;

/// Alert severity, mapped to the notification color
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

/// The two conditions the watcher alerts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Failover,
    ErrorRate,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Failover => write!(f, "failover"),
            AlertKind::ErrorRate => write!(f, "error_rate"),
        }
    }
}

/// Structured context carried by an alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertPayload {
    Failover {
        from_pool: String,
        to_pool: String,
        /// Record that revealed the switch
        record: LogRecord,
    },
    ErrorRate {
        /// Fraction in [0, 1]
        error_rate: f64,
        errors: usize,
        window_len: usize,
        /// Fraction in [0, 1]
        threshold: f64,
        current_pool: Option<String>,
        /// Most recent parsed record, if any
        record: Option<LogRecord>,
    },
}

/// A fully-formed alert, immutable once built and safe to hand to the
/// notification worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub payload: AlertPayload,
}

impl Alert {
    pub fn new(payload: AlertPayload, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            detected_at,
            payload,
        }
    }

    pub fn kind(&self) -> AlertKind {
        match self.payload {
            AlertPayload::Failover { .. } => AlertKind::Failover,
            AlertPayload::ErrorRate { .. } => AlertKind::ErrorRate,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.kind() {
            AlertKind::Failover => Severity::Warning,
            AlertKind::ErrorRate => Severity::Critical,
        }
    }

    /// Record used to enrich the notification details
    pub fn record(&self) -> Option<&LogRecord> {
        match &self.payload {
            AlertPayload::Failover { record, .. } => Some(record),
            AlertPayload::ErrorRate { record, .. } => record.as_ref(),
        }
    }
}
