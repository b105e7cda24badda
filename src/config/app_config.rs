use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for the outbound webhook call
pub const MAX_WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// Where the tailer starts reading on boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPosition {
    /// Reprocess the whole file from offset 0 with alerts suppressed
    #[default]
    Beginning,
    /// Skip existing content and only watch new writes
    End,
}

impl FromStr for StartPosition {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginning" | "start" => Ok(StartPosition::Beginning),
            "end" | "tail" => Ok(StartPosition::End),
            _ => Err(()),
        }
    }
}

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub log_file: PathBuf,
    pub window_size: usize,
    /// Breach threshold as a fraction (2% -> 0.02)
    pub error_rate_threshold: f64,
    pub alert_cooldown: Duration,
    /// `None` runs in log-only mode
    pub slack_webhook_url: Option<String>,
    pub start_position: StartPosition,
    pub poll_interval: Duration,
    pub file_wait_interval: Duration,
    pub health_check_marker: Option<String>,
    pub webhook_timeout: Duration,
    pub alert_queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("/var/log/nginx/access.log"),
            window_size: 200,
            error_rate_threshold: 0.02,
            alert_cooldown: Duration::from_secs(300),
            slack_webhook_url: None,
            start_position: StartPosition::Beginning,
            poll_interval: Duration::from_millis(500),
            file_wait_interval: Duration::from_secs(2),
            health_check_marker: None,
            webhook_timeout: Duration::from_secs(MAX_WEBHOOK_TIMEOUT_SECS),
            alert_queue_capacity: 64,
        }
    }
}

impl WatcherConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset or blank keys take their defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let log_file = get("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        let window_size = parse_or("WINDOW_SIZE", get("WINDOW_SIZE"), defaults.window_size)?;
        if window_size == 0 {
            return Err(ConfigError::OutOfRange {
                key: "WINDOW_SIZE",
                reason: "must be at least 1",
            });
        }

        let threshold_percent: f64 = parse_or("ERROR_RATE_THRESHOLD", get("ERROR_RATE_THRESHOLD"), 2.0)?;
        if !(0.0..=100.0).contains(&threshold_percent) {
            return Err(ConfigError::OutOfRange {
                key: "ERROR_RATE_THRESHOLD",
                reason: "must be a percentage between 0 and 100",
            });
        }

        let cooldown_secs: u64 = parse_or("ALERT_COOLDOWN_SEC", get("ALERT_COOLDOWN_SEC"), 300)?;

        let slack_webhook_url = get("SLACK_WEBHOOK_URL");
        if slack_webhook_url.is_none() {
            tracing::warn!("SLACK_WEBHOOK_URL is not set, alerts will only be logged");
        }

        let start_position = match get("START_POSITION") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "START_POSITION",
                value: raw.clone(),
            })?,
            None => defaults.start_position,
        };

        let poll_interval_ms: u64 = parse_or("POLL_INTERVAL_MS", get("POLL_INTERVAL_MS"), 500)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::OutOfRange {
                key: "POLL_INTERVAL_MS",
                reason: "must be at least 1",
            });
        }

        let file_wait_secs: u64 = parse_or("FILE_WAIT_INTERVAL_SEC", get("FILE_WAIT_INTERVAL_SEC"), 2)?;
        if file_wait_secs == 0 {
            return Err(ConfigError::OutOfRange {
                key: "FILE_WAIT_INTERVAL_SEC",
                reason: "must be at least 1",
            });
        }

        let webhook_timeout_secs: u64 = parse_or(
            "WEBHOOK_TIMEOUT_SEC",
            get("WEBHOOK_TIMEOUT_SEC"),
            MAX_WEBHOOK_TIMEOUT_SECS,
        )?;

        let alert_queue_capacity = parse_or(
            "ALERT_QUEUE_CAPACITY",
            get("ALERT_QUEUE_CAPACITY"),
            defaults.alert_queue_capacity,
        )?;
        if alert_queue_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                key: "ALERT_QUEUE_CAPACITY",
                reason: "must be at least 1",
            });
        }

        Ok(Self {
            log_file,
            window_size,
            error_rate_threshold: threshold_percent / 100.0,
            alert_cooldown: Duration::from_secs(cooldown_secs),
            slack_webhook_url,
            start_position,
            poll_interval: Duration::from_millis(poll_interval_ms),
            file_wait_interval: Duration::from_secs(file_wait_secs),
            health_check_marker: get("HEALTH_CHECK_MARKER"),
            webhook_timeout: Duration::from_secs(
                webhook_timeout_secs.clamp(1, MAX_WEBHOOK_TIMEOUT_SECS),
            ),
            alert_queue_capacity,
        })
    }

    /// Whether a notification endpoint is configured
    pub fn webhook_configured(&self) -> bool {
        self.slack_webhook_url.is_some()
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid value for {key}: {reason}")]
    OutOfRange {
        key: &'static str,
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn should_use_defaults_when_nothing_is_set() {
        // Act
        let config = WatcherConfig::from_lookup(|_| None).unwrap();

        // Assert
        assert_eq!(config.log_file, PathBuf::from("/var/log/nginx/access.log"));
        assert_eq!(config.window_size, 200);
        assert!((config.error_rate_threshold - 0.02).abs() < f64::EPSILON);
        assert_eq!(config.alert_cooldown, Duration::from_secs(300));
        assert!(config.slack_webhook_url.is_none());
        assert_eq!(config.start_position, StartPosition::Beginning);
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
        assert!(config.health_check_marker.is_none());
    }

    #[test]
    fn should_read_all_documented_keys() {
        // Arrange
        let lookup = lookup_from(&[
            ("LOG_FILE", "/tmp/access.log"),
            ("WINDOW_SIZE", "100"),
            ("ERROR_RATE_THRESHOLD", "5"),
            ("ALERT_COOLDOWN_SEC", "60"),
            ("SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T/B/X"),
            ("START_POSITION", "end"),
            ("POLL_INTERVAL_MS", "250"),
            ("HEALTH_CHECK_MARKER", "/healthz"),
        ]);

        // Act
        let config = WatcherConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.log_file, PathBuf::from("/tmp/access.log"));
        assert_eq!(config.window_size, 100);
        assert!((config.error_rate_threshold - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.alert_cooldown, Duration::from_secs(60));
        assert!(config.webhook_configured());
        assert_eq!(config.start_position, StartPosition::End);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.health_check_marker.as_deref(), Some("/healthz"));
    }

    #[test]
    fn should_treat_blank_webhook_as_log_only_mode() {
        // Arrange
        let lookup = lookup_from(&[("SLACK_WEBHOOK_URL", "   ")]);

        // Act
        let config = WatcherConfig::from_lookup(lookup).unwrap();

        // Assert
        assert!(!config.webhook_configured());
    }

    #[test]
    fn should_reject_malformed_numbers() {
        // Arrange
        let lookup = lookup_from(&[("WINDOW_SIZE", "lots")]);

        // Act
        let result = WatcherConfig::from_lookup(lookup);

        // Assert
        match result {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "WINDOW_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn should_reject_zero_window() {
        // Arrange
        let lookup = lookup_from(&[("WINDOW_SIZE", "0")]);

        // Act & Assert
        assert!(matches!(
            WatcherConfig::from_lookup(lookup),
            Err(ConfigError::OutOfRange { key: "WINDOW_SIZE", .. })
        ));
    }

    #[test]
    fn should_reject_threshold_outside_percentage_range() {
        // Arrange
        let lookup = lookup_from(&[("ERROR_RATE_THRESHOLD", "150")]);

        // Act & Assert
        assert!(WatcherConfig::from_lookup(lookup).is_err());
    }

    #[test]
    fn should_reject_unknown_start_position() {
        // Arrange
        let lookup = lookup_from(&[("START_POSITION", "middle")]);

        // Act & Assert
        assert!(matches!(
            WatcherConfig::from_lookup(lookup),
            Err(ConfigError::InvalidValue { key: "START_POSITION", .. })
        ));
    }

    #[test]
    fn should_clamp_webhook_timeout_to_ten_seconds() {
        // Arrange
        let lookup = lookup_from(&[("WEBHOOK_TIMEOUT_SEC", "60")]);

        // Act
        let config = WatcherConfig::from_lookup(lookup).unwrap();

        // Assert
        assert_eq!(config.webhook_timeout, Duration::from_secs(10));
    }
}
