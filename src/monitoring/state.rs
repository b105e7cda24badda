use chrono::{DateTime, Utc};

use crate::config::WatcherConfig;
use crate::event::Alert;
use crate::monitoring::error_rate::{AlertContext, ErrorRateMonitor, ErrorRateOutcome};
use crate::monitoring::failover::{FailoverDetector, FailoverOutcome};
use crate::monitoring::LogRecord;

/// All mutable monitoring state, owned by the tail engine.
///
/// Created once at startup, never persisted.
#[derive(Debug, Clone)]
pub struct MonitorState {
    pub failover: FailoverDetector,
    pub error_rate: ErrorRateMonitor,
    /// Byte offset just past the last fully processed line
    pub read_offset: u64,
    /// True until the initial backlog has been drained once
    pub startup_mode: bool,
    pub last_seen_record: Option<LogRecord>,
}

/// Alerts produced by one record (at most one of each kind)
#[derive(Debug, Default)]
pub struct RecordAlerts {
    pub failover: Option<Alert>,
    pub error_rate: Option<Alert>,
}

impl RecordAlerts {
    pub fn into_alerts(self) -> impl Iterator<Item = Alert> {
        self.failover.into_iter().chain(self.error_rate)
    }
}

impl MonitorState {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            failover: FailoverDetector::new(config.alert_cooldown),
            error_rate: ErrorRateMonitor::new(
                config.window_size,
                config.error_rate_threshold,
                config.alert_cooldown,
            ),
            read_offset: 0,
            startup_mode: true,
            last_seen_record: None,
        }
    }

    pub fn current_pool(&self) -> Option<&str> {
        self.failover.current_pool()
    }

    pub fn last_failover_alert_time(&self) -> Option<DateTime<Utc>> {
        self.failover.last_alert_at()
    }

    pub fn last_error_alert_time(&self) -> Option<DateTime<Utc>> {
        self.error_rate.last_alert_at()
    }

    /// Run one record through both detectors.
    ///
    /// Failover is checked first so an error-rate alert on the same line
    /// reports the pool that served it.
    pub fn apply(&mut self, record: LogRecord, now: DateTime<Utc>) -> RecordAlerts {
        let failover = match self.failover.observe(&record, now, self.startup_mode) {
            FailoverOutcome::Alert(alert) => Some(alert),
            _ => None,
        };

        let is_error = record.is_upstream_error();
        self.last_seen_record = Some(record);

        let context = AlertContext {
            current_pool: self.failover.current_pool(),
            last_record: self.last_seen_record.as_ref(),
        };
        let error_rate = match self.error_rate.record(is_error, now, self.startup_mode, context) {
            ErrorRateOutcome::Alert(alert) => Some(alert),
            _ => None,
        };

        RecordAlerts {
            failover,
            error_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AlertKind;
    use crate::monitoring::parse_line;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn config(window_size: usize) -> WatcherConfig {
        WatcherConfig {
            window_size,
            alert_cooldown: Duration::from_secs(300),
            ..WatcherConfig::default()
        }
    }

    #[test]
    fn should_start_in_startup_mode_with_nothing_tracked() {
        // Act
        let state = MonitorState::new(&config(200));

        // Assert
        assert!(state.startup_mode);
        assert_eq!(state.read_offset, 0);
        assert!(state.current_pool().is_none());
        assert!(state.last_failover_alert_time().is_none());
        assert!(state.last_error_alert_time().is_none());
        assert!(state.last_seen_record.is_none());
    }

    #[test]
    fn should_update_state_but_not_alert_during_startup() {
        // Arrange
        let mut state = MonitorState::new(&config(1));
        let mut produced = 0;

        // Act
        for line in ["pool=blue upstream_status=500", "pool=green upstream_status=502"] {
            let record = parse_line(line).unwrap();
            produced += state.apply(record, at(0)).into_alerts().count();
        }

        // Assert
        assert_eq!(produced, 0);
        assert_eq!(state.current_pool(), Some("green"));
        assert_eq!(state.error_rate.window().error_count(), 1);
        assert_eq!(state.last_seen_record.as_ref().map(|r| r.upstream_status), Some(502));
    }

    #[test]
    fn should_raise_both_kinds_from_one_record() {
        // Arrange
        let mut state = MonitorState::new(&config(1));
        state.apply(parse_line("pool=blue upstream_status=200").unwrap(), at(0));
        state.startup_mode = false;

        // Act
        let alerts = state.apply(parse_line("pool=green upstream_status=503").unwrap(), at(1));

        // Assert
        let kinds: Vec<AlertKind> = alerts.into_alerts().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![AlertKind::Failover, AlertKind::ErrorRate]);
    }

    #[test]
    fn should_report_new_pool_in_error_rate_alert() {
        // Arrange
        let mut state = MonitorState::new(&config(1));
        state.apply(parse_line("pool=blue upstream_status=200").unwrap(), at(0));
        state.startup_mode = false;

        // Act
        let alerts = state.apply(parse_line("pool=green upstream_status=503").unwrap(), at(1));

        // Assert
        match alerts.error_rate.map(|a| a.payload) {
            Some(crate::event::AlertPayload::ErrorRate { current_pool, .. }) => {
                assert_eq!(current_pool.as_deref(), Some("green"));
            }
            other => panic!("Expected error-rate alert, got {:?}", other),
        }
    }
}
