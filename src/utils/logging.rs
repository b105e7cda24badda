//! Logging initialisation
//!
//! Structured JSON logs on stdout, plus a daily rolling file when
//! `WATCHER_LOG_DIR` is set.

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,pool_watcher=debug";

/// Initialises the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info,pool_watcher=debug`.
/// When `WATCHER_LOG_DIR` is set, logs are also written to
/// `<dir>/pool-watcher.log.YYYY-MM-DD`.
///
/// The returned `WorkerGuard` must be held by `main`, otherwise buffered file
/// output is lost on exit.
pub fn init_logging() -> Option<WorkerGuard> {
    let (file_layer, guard) = match std::env::var("WATCHER_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let file_appender = rolling::daily(dir.trim(), "pool-watcher.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_current_span(true)
                .flatten_event(false)
                .with_ansi(false)
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    let stdout_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_current_span(true)
        .flatten_event(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .or_else(|err| {
            use std::error::Error;
            if err
                .source()
                .and_then(|s| s.downcast_ref::<tracing::dispatcher::SetGlobalDefaultError>())
                .is_some()
            {
                // Already initialised
                return Ok(());
            }
            eprintln!("Failed to initialize tracing: {}", err);
            Err(err)
        })
        .ok();

    guard
}

