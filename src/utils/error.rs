use std::path::PathBuf;

use crate::config::ConfigError;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured log path exists but cannot be tailed
    #[error("log path {} is a directory", .0.display())]
    InvalidLogPath(PathBuf),

    #[error("failed to read log file {}: {source}", path.display())]
    LogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("webhook request failed: {0}")]
    WebhookTransport(String),

    #[error("webhook returned {status}: {body}")]
    WebhookStatus { status: u16, body: String },

    #[error("{0}")]
    InternalError(String),
}

impl AppError {
    /// Short stable code, logged as a structured field
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG",
            AppError::InvalidLogPath(_) => "LOG_PATH",
            AppError::LogRead { .. } => "LOG_READ",
            AppError::WebhookTransport(_) => "WEBHOOK_TRANSPORT",
            AppError::WebhookStatus { .. } => "WEBHOOK_STATUS",
            AppError::InternalError(_) => "INTERNAL",
        }
    }

    /// Fatal errors stop the watcher; everything else is logged and retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Config(_) | AppError::InvalidLogPath(_))
    }

    pub fn log_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::LogRead {
            path: path.into(),
            source,
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_treat_config_and_log_path_errors_as_fatal() {
        // Arrange
        let config = AppError::from(ConfigError::InvalidValue {
            key: "WINDOW_SIZE",
            value: "abc".to_string(),
        });
        let path = AppError::InvalidLogPath(PathBuf::from("/var/log"));

        // Assert
        assert!(config.is_fatal());
        assert!(path.is_fatal());
    }

    #[test]
    fn should_treat_io_and_webhook_errors_as_recoverable() {
        // Arrange
        let read = AppError::log_read(
            "/var/log/nginx/access.log",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        let webhook = AppError::WebhookStatus {
            status: 500,
            body: "oops".to_string(),
        };

        // Assert
        assert!(!read.is_fatal());
        assert!(!webhook.is_fatal());
        assert_eq!(read.error_code(), "LOG_READ");
        assert_eq!(webhook.error_code(), "WEBHOOK_STATUS");
    }

    #[test]
    fn should_include_path_in_invalid_log_path_message() {
        // Arrange
        let err = AppError::InvalidLogPath(PathBuf::from("/var/log/nginx"));

        // Act
        let message = err.to_string();

        // Assert
        assert_eq!(message, "log path /var/log/nginx is a directory");
    }
}
