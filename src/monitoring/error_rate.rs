//! Rolling upstream 5xx rate over the last N requests

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::event::{Alert, AlertPayload};
use crate::monitoring::cooldown::{Cooldown, CooldownStatus};
use crate::monitoring::window::SlidingWindow;
use crate::monitoring::LogRecord;

/// No verdict below this many samples (or the window size, if smaller)
pub const MIN_SAMPLES: usize = 50;

/// Result of evaluating the current window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorRateVerdict {
    InsufficientData { samples: usize, min_required: usize },
    WithinThreshold { rate: f64, errors: usize, total: usize },
    Breached { rate: f64, errors: usize, total: usize },
}

/// What a single outcome did to the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorRateOutcome {
    NoVerdict,
    Healthy,
    /// Breach seen during startup replay, no alert
    Historical { rate: f64 },
    Suppressed { rate: f64, remaining_secs: u64 },
    Alert(Alert),
}

/// Context used to enrich an error-rate alert
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertContext<'a> {
    pub current_pool: Option<&'a str>,
    pub last_record: Option<&'a LogRecord>,
}

#[derive(Debug, Clone)]
pub struct ErrorRateMonitor {
    window: SlidingWindow,
    /// Fraction, compared unrounded
    threshold: f64,
    min_samples: usize,
    cooldown: Cooldown,
    recovery_logged: bool,
}

impl ErrorRateMonitor {
    pub fn new(window_size: usize, threshold: f64, cooldown: Duration) -> Self {
        let window = SlidingWindow::new(window_size);
        let min_samples = MIN_SAMPLES.min(window.capacity());
        Self {
            window,
            threshold,
            min_samples,
            cooldown: Cooldown::new(cooldown),
            recovery_logged: false,
        }
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    pub fn last_alert_at(&self) -> Option<DateTime<Utc>> {
        self.cooldown.last_fired()
    }

    /// Evaluate the window as it stands
    pub fn evaluate(&self) -> ErrorRateVerdict {
        let total = self.window.len();
        let rate = match self.window.error_rate() {
            Some(rate) if total >= self.min_samples => rate,
            _ => {
                return ErrorRateVerdict::InsufficientData {
                    samples: total,
                    min_required: self.min_samples,
                }
            }
        };
        let errors = self.window.error_count();

        if rate > self.threshold {
            ErrorRateVerdict::Breached { rate, errors, total }
        } else {
            ErrorRateVerdict::WithinThreshold { rate, errors, total }
        }
    }

    /// Append one outcome and decide whether to alert.
    pub fn record(
        &mut self,
        is_error: bool,
        now: DateTime<Utc>,
        startup_mode: bool,
        context: AlertContext<'_>,
    ) -> ErrorRateOutcome {
        self.window.push(is_error);

        match self.evaluate() {
            ErrorRateVerdict::InsufficientData { .. } => ErrorRateOutcome::NoVerdict,
            ErrorRateVerdict::WithinThreshold { rate, errors, total } => {
                debug!(
                    error_rate = %format_percent(rate),
                    errors,
                    total,
                    status = "ok",
                    "Error rate"
                );
                self.note_recovery(now, rate, errors);
                ErrorRateOutcome::Healthy
            }
            ErrorRateVerdict::Breached { rate, errors, total } => {
                debug!(
                    error_rate = %format_percent(rate),
                    errors,
                    total,
                    status = "above_threshold",
                    "Error rate"
                );
                self.on_breach(rate, errors, total, now, startup_mode, context)
            }
        }
    }

    fn on_breach(
        &mut self,
        rate: f64,
        errors: usize,
        total: usize,
        now: DateTime<Utc>,
        startup_mode: bool,
        context: AlertContext<'_>,
    ) -> ErrorRateOutcome {
        if startup_mode {
            info!(
                error_rate = %format_percent(rate),
                "Historical high error rate (startup, no alert)"
            );
            return ErrorRateOutcome::Historical { rate };
        }

        match self.cooldown.check(now) {
            CooldownStatus::Ready => {
                self.cooldown.stamp(now);
                self.recovery_logged = false;
                warn!(
                    error_rate = %format_percent(rate),
                    threshold = %format_percent(self.threshold),
                    errors,
                    total,
                    "High error rate"
                );
                ErrorRateOutcome::Alert(Alert::new(
                    AlertPayload::ErrorRate {
                        error_rate: rate,
                        errors,
                        window_len: total,
                        threshold: self.threshold,
                        current_pool: context.current_pool.map(str::to_string),
                        record: context.last_record.cloned(),
                    },
                    now,
                ))
            }
            CooldownStatus::Active { remaining_secs } => {
                warn!(
                    error_rate = %format_percent(rate),
                    remaining_secs,
                    "Error rate above threshold, cooldown active"
                );
                ErrorRateOutcome::Suppressed {
                    rate,
                    remaining_secs,
                }
            }
        }
    }

    /// Log once per alert episode when a full, error-free window follows an
    /// alert whose cooldown has run out. No state beyond the log flag changes.
    fn note_recovery(&mut self, now: DateTime<Utc>, rate: f64, errors: usize) {
        if self.recovery_logged || self.cooldown.last_fired().is_none() {
            return;
        }
        if errors == 0 && self.window.is_full() && self.cooldown.is_ready(now) {
            info!(error_rate = %format_percent(rate), "Error rate recovered");
            self.recovery_logged = true;
        }
    }
}

/// Percentage for display only, two decimals
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}
