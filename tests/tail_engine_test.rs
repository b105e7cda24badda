//! Tail engine integration tests
//!
//! Drives the engine over real files in a unique temp directory and checks the
//! alerts that reach the notification queue.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pool_watcher::config::WatcherConfig;
use pool_watcher::event::{alert_channel, Alert, AlertKind, AlertPayload};
use pool_watcher::monitoring::TailEngine;
use pool_watcher::utils::AppError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

mod helpers {
    use super::*;

    pub fn temp_log() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pool_watcher_it_{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir.join("access.log")
    }

    pub fn append_lines(path: &Path, lines: &[String]) {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    pub fn request(pool: &str, status: u16) -> String {
        format!(
            r#"172.18.0.1 - - [19/Oct/2026:10:00:00 +0000] "GET /version HTTP/1.1" {status} 12 "-" "curl/8.5.0" pool={pool} release={pool}-v1.0.0 upstream_status={status} upstream=172.18.0.2:3000 request_time=0.004 upstream_response_time=0.003"#
        )
    }

    pub fn config(path: &Path) -> WatcherConfig {
        WatcherConfig {
            log_file: path.to_path_buf(),
            poll_interval: Duration::from_millis(20),
            file_wait_interval: Duration::from_millis(20),
            ..WatcherConfig::default()
        }
    }

    pub fn drain(rx: &mut mpsc::Receiver<Alert>) -> Vec<Alert> {
        let mut alerts = Vec::new();
        while let Ok(alert) = rx.try_recv() {
            alerts.push(alert);
        }
        alerts
    }

    pub fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }
}

use helpers::*;

#[test]
fn should_raise_single_failover_for_repeated_pool() {
    // Arrange
    let path = temp_log();
    fs::write(&path, "").unwrap();
    let (queue, mut rx) = alert_channel(16);
    let mut engine = TailEngine::new(&config(&path), queue);
    engine.backfill().unwrap();

    // Act
    append_lines(
        &path,
        &[
            request("blue", 200),
            request("blue", 200),
            request("blue", 200),
            request("green", 200),
        ],
    );
    engine.poll().unwrap();

    // Assert
    let alerts = drain(&mut rx);
    assert_eq!(alerts.len(), 1);
    match &alerts[0].payload {
        AlertPayload::Failover { from_pool, to_pool, record } => {
            assert_eq!(from_pool, "blue");
            assert_eq!(to_pool, "green");
            assert_eq!(record.release, "green-v1.0.0");
        }
        other => panic!("Expected failover, got {:?}", other),
    }
    cleanup(&path);
}

#[test]
fn should_alert_once_when_error_rate_breaches_after_minimum_samples() {
    // Arrange
    let path = temp_log();
    fs::write(&path, "").unwrap();
    let (queue, mut rx) = alert_channel(16);
    let mut engine = TailEngine::new(&config(&path), queue);
    engine.backfill().unwrap();

    let mut lines: Vec<String> = (0..48).map(|_| request("blue", 200)).collect();
    lines.push(request("blue", 502));
    lines.push(request("blue", 503));

    // Act
    append_lines(&path, &lines);
    let summary = engine.poll().unwrap();

    // Assert
    assert_eq!(summary.records_parsed, 50);
    let alerts = drain(&mut rx);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind(), AlertKind::ErrorRate);
    match &alerts[0].payload {
        AlertPayload::ErrorRate {
            errors,
            window_len,
            current_pool,
            ..
        } => {
            assert_eq!(*errors, 2);
            assert_eq!(*window_len, 50);
            assert_eq!(current_pool.as_deref(), Some("blue"));
        }
        other => panic!("Expected error rate alert, got {:?}", other),
    }
    cleanup(&path);
}

#[test]
fn should_not_alert_on_history_but_alert_on_live_change() {
    // Arrange
    let path = temp_log();
    let mut history: Vec<String> = (0..60).map(|_| request("green", 500)).collect();
    history.push(request("blue", 200));
    append_lines(&path, &history);
    let (queue, mut rx) = alert_channel(16);
    let mut engine = TailEngine::new(&config(&path), queue);

    // Act
    let backfill = engine.backfill().unwrap();
    let after_backfill = drain(&mut rx);
    append_lines(&path, &[request("green", 200)]);
    engine.poll().unwrap();

    // Assert
    assert_eq!(backfill.records_parsed, 61);
    assert!(after_backfill.is_empty());
    let kinds: Vec<AlertKind> = drain(&mut rx).iter().map(|a| a.kind()).collect();
    assert!(kinds.contains(&AlertKind::Failover));
    cleanup(&path);
}

#[tokio::test]
async fn should_follow_file_created_after_start_until_shutdown() {
    // Arrange
    let path = temp_log();
    let (queue, mut rx) = alert_channel(16);
    let engine = TailEngine::new(&config(&path), queue);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(engine.run(async {
        let _ = stop_rx.await;
    }));

    // Act
    tokio::time::sleep(Duration::from_millis(100)).await;
    append_lines(&path, &[request("blue", 200)]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    append_lines(&path, &[request("green", 200)]);
    let alert = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;

    // Assert
    let alert = alert.expect("alert within timeout").expect("queue open");
    assert_eq!(alert.kind(), AlertKind::Failover);
    assert!(matches!(result, Ok(Ok(Ok(())))));
    cleanup(&path);
}

#[tokio::test]
async fn should_stop_with_fatal_error_when_path_is_directory() {
    // Arrange
    let path = temp_log();
    fs::create_dir_all(&path).unwrap();
    let (queue, _rx) = alert_channel(4);
    let engine = TailEngine::new(&config(&path), queue);

    // Act
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run(std::future::pending::<()>()),
    )
    .await
    .expect("run returns");

    // Assert
    match result {
        Err(e) => {
            assert!(e.is_fatal());
            assert!(matches!(e, AppError::InvalidLogPath(_)));
        }
        Ok(()) => panic!("Expected fatal error"),
    }
    cleanup(&path);
}
