use chrono::{DateTime, Utc};
use std::time::Duration;

/// Result of checking a cooldown gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    /// Never fired, or the period has fully elapsed
    Ready,
    /// Still cooling down
    Active { remaining_secs: u64 },
}

/// Minimum interval between two alerts of the same kind.
///
/// "Never fired" is its own state rather than the Unix epoch, so the first
/// alert does not depend on clock arithmetic.
#[derive(Debug, Clone)]
pub struct Cooldown {
    period: Duration,
    last_fired: Option<DateTime<Utc>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    /// Ready once strictly more than `period` has passed since the last fire
    pub fn check(&self, now: DateTime<Utc>) -> CooldownStatus {
        let Some(last) = self.last_fired else {
            return CooldownStatus::Ready;
        };

        // A clock that went backwards counts as zero elapsed
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed > self.period {
            CooldownStatus::Ready
        } else {
            let remaining = self.period - elapsed;
            CooldownStatus::Active {
                remaining_secs: remaining.as_secs(),
            }
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.check(now) == CooldownStatus::Ready
    }

    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.last_fired = Some(now);
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }
}
