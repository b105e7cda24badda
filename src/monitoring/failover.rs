//! Pool change detection
//!
//! Tracks which upstream pool is serving traffic and raises an alert when it
//! changes. The cooldown only gates the notification: the tracked pool always
//! follows what the log says.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

use crate::event::{Alert, AlertPayload};
use crate::monitoring::cooldown::{Cooldown, CooldownStatus};
use crate::monitoring::LogRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PoolState {
    NoPool,
    Tracking(String),
}

/// What a single observation did to the detector
#[derive(Debug, Clone, PartialEq)]
pub enum FailoverOutcome {
    /// First pool ever seen
    Initial { pool: String },
    Unchanged,
    /// Pool changed during startup replay, no alert
    Historical { from: String, to: String },
    /// Pool changed and the cooldown was still running
    Suppressed {
        from: String,
        to: String,
        remaining_secs: u64,
    },
    Alert(Alert),
}

#[derive(Debug, Clone)]
pub struct FailoverDetector {
    state: PoolState,
    cooldown: Cooldown,
}

impl FailoverDetector {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: PoolState::NoPool,
            cooldown: Cooldown::new(cooldown),
        }
    }

    pub fn current_pool(&self) -> Option<&str> {
        match &self.state {
            PoolState::NoPool => None,
            PoolState::Tracking(pool) => Some(pool),
        }
    }

    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        self.cooldown.last_fired()
    }

    /// Feed one parsed record.
    pub fn observe(
        &mut self,
        record: &LogRecord,
        now: DateTime<Utc>,
        startup_mode: bool,
    ) -> FailoverOutcome {
        if let PoolState::Tracking(current) = &self.state {
            if *current == record.pool {
                return FailoverOutcome::Unchanged;
            }
        }

        let previous = std::mem::replace(&mut self.state, PoolState::Tracking(record.pool.clone()));
        let from = match previous {
            PoolState::NoPool => {
                info!(
                    pool = %record.pool,
                    release = %record.release,
                    upstream = %record.upstream,
                    "Initial pool detected"
                );
                return FailoverOutcome::Initial {
                    pool: record.pool.clone(),
                };
            }
            PoolState::Tracking(pool) => pool,
        };
        let to = record.pool.clone();

        if startup_mode {
            info!(from = %from, to = %to, "Historical failover detected (startup, no alert)");
            return FailoverOutcome::Historical { from, to };
        }

        match self.cooldown.check(now) {
            CooldownStatus::Ready => {
                self.cooldown.stamp(now);
                warn!(from = %from, to = %to, release = %record.release, "Failover detected");
                FailoverOutcome::Alert(Alert::new(
                    AlertPayload::Failover {
                        from_pool: from,
                        to_pool: to,
                        record: record.clone(),
                    },
                    now,
                ))
            }
            CooldownStatus::Active { remaining_secs } => {
                info!(
                    from = %from,
                    to = %to,
                    remaining_secs,
                    "Failover detected, cooldown active"
                );
                FailoverOutcome::Suppressed {
                    from,
                    to,
                    remaining_secs,
                }
            }
        }
    }
}
