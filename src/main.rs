use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use pool_watcher::config::WatcherConfig;
use pool_watcher::event::alert_channel;
use pool_watcher::monitoring::{AlertDispatcher, AlertWorker, SlackWebhook, TailEngine};
use pool_watcher::shutdown::shutdown_signal;
use pool_watcher::utils::logging::init_logging;
use pool_watcher::utils::AppError;

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Environment
    dotenvy::dotenv().ok();

    // 2. Logging (guard flushes the file writer on exit)
    let _log_guard = init_logging();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, error_code = e.error_code(), "Watcher stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    // 3. Configuration
    let config = WatcherConfig::from_env()?;

    tracing::info!(
        log_file = %config.log_file.display(),
        window_size = config.window_size,
        error_rate_threshold = config.error_rate_threshold,
        alert_cooldown_secs = config.alert_cooldown.as_secs(),
        webhook = config.webhook_configured(),
        "Starting pool watcher"
    );

    // 4. Notification worker
    let dispatcher = match config.slack_webhook_url.as_deref() {
        Some(url) => AlertDispatcher::new(Arc::new(SlackWebhook::new(url, config.webhook_timeout)?)),
        None => AlertDispatcher::log_only(),
    };
    let (queue, receiver) = alert_channel(config.alert_queue_capacity);
    let worker = tokio::spawn(AlertWorker::new(receiver, dispatcher).run());

    // 5. Tail until shutdown; dropping the engine closes the queue
    let engine = TailEngine::new(&config, queue);
    let result = engine.run(shutdown_signal()).await;

    // 6. Give an in-flight notification one webhook timeout to finish
    let grace = config.webhook_timeout + Duration::from_secs(1);
    match tokio::time::timeout(grace, worker).await {
        Ok(Ok(stats)) => tracing::info!(?stats, "Notification worker drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Notification worker panicked"),
        Err(_) => tracing::warn!(grace_secs = grace.as_secs(), "Notification worker did not finish in time"),
    }

    result
}
