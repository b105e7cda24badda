//! Access log tail engine
//!
//! Follows a single proxy access log by byte offset:
//! - Waits for the file to appear
//! - Drains the existing content once with alerting suppressed (backfill)
//! - Then polls for appended lines and feeds every record through the detectors
//! - Restarts from offset 0 when the file shrinks (truncation or rotation)
//!
//! Alerts are handed to the notification queue and never awaited here.

use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::future::Future;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{StartPosition, WatcherConfig};
use crate::event::AlertQueue;
use crate::monitoring::error_rate::format_percent;
use crate::monitoring::log_parser::LineParser;
use crate::monitoring::state::MonitorState;
use crate::utils::AppError;

/// Upper bound on bytes read per chunk
const MAX_READ_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Lines longer than this are skipped, terminated or not
const MAX_LINE_LEN: usize = 1024 * 1024;

/// Tail engine result type
pub type TailResult<T> = Result<T, AppError>;

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPhase {
    AwaitingFile,
    Backfilling,
    Live,
}

/// What one line did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Not a request line (or a health check)
    Skipped,
    /// `alerts` counts only alerts accepted by the queue
    Processed { alerts: usize },
}

/// Counters for a single poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Non-blank complete lines seen
    pub lines_read: usize,
    pub records_parsed: usize,
    /// Alerts accepted by the notification queue
    pub alerts_queued: usize,
    pub bytes_consumed: u64,
    /// The file shrank and was re-read from the start
    pub rotated: bool,
}

pub struct TailEngine {
    path: PathBuf,
    parser: LineParser,
    state: MonitorState,
    alerts: AlertQueue,
    phase: TailPhase,
    start_position: StartPosition,
    poll_interval: Duration,
    file_wait_interval: Duration,
    /// Inside an oversized line whose terminator has not been read yet
    discarding_line: bool,
}

impl TailEngine {
    pub fn new(config: &WatcherConfig, alerts: AlertQueue) -> Self {
        info!(
            log_file = %config.log_file.display(),
            start_position = ?config.start_position,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "TailEngine initialized"
        );

        Self {
            path: config.log_file.clone(),
            parser: LineParser::with_health_check_marker(config.health_check_marker.clone()),
            state: MonitorState::new(config),
            alerts,
            phase: TailPhase::AwaitingFile,
            start_position: config.start_position,
            poll_interval: config.poll_interval,
            file_wait_interval: config.file_wait_interval,
            discarding_line: false,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn phase(&self) -> TailPhase {
        self.phase
    }

    /// Feed one line through parsing and both detectors
    pub fn process_line(&mut self, line: &str) -> LineOutcome {
        self.process_line_at(line, Utc::now())
    }

    pub fn process_line_at(&mut self, line: &str, now: DateTime<Utc>) -> LineOutcome {
        let Some(record) = self.parser.parse(line) else {
            return LineOutcome::Skipped;
        };

        debug!(
            pool = %record.pool,
            release = %record.release,
            upstream = %record.upstream,
            upstream_status = record.upstream_status,
            "Request"
        );

        let mut queued = 0;
        for alert in self.state.apply(record, now).into_alerts() {
            // A full queue drops the alert; the cooldown stays consumed
            if self.alerts.enqueue(alert) {
                queued += 1;
            }
        }

        LineOutcome::Processed { alerts: queued }
    }

    /// `Ok(true)` once the log file exists, `Ok(false)` while it does not
    pub fn log_file_exists(&self) -> TailResult<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => Err(AppError::InvalidLogPath(self.path.clone())),
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::log_read(&self.path, e)),
        }
    }

    /// Read and process every complete line appended since the last poll.
    ///
    /// The offset only advances past lines ending in `\n`, so a line still
    /// being written is picked up whole on a later poll.
    pub fn poll(&mut self) -> TailResult<PollSummary> {
        let mut file = File::open(&self.path).map_err(|e| self.read_error(e))?;
        let meta = file.metadata().map_err(|e| self.read_error(e))?;
        if meta.is_dir() {
            return Err(AppError::InvalidLogPath(self.path.clone()));
        }

        let mut summary = PollSummary::default();
        let file_len = meta.len();

        if file_len < self.state.read_offset {
            warn!(
                previous_offset = self.state.read_offset,
                current_size = file_len,
                "Log file truncated or rotated, reading from the beginning"
            );
            self.state.read_offset = 0;
            self.discarding_line = false;
            summary.rotated = true;
        }

        if file_len == self.state.read_offset {
            return Ok(summary);
        }

        let mut buf = Vec::with_capacity(64 * 1024);
        loop {
            file.seek(SeekFrom::Start(self.state.read_offset))
                .map_err(|e| self.read_error(e))?;

            buf.clear();
            let read = (&mut file)
                .take(MAX_READ_CHUNK_BYTES as u64)
                .read_to_end(&mut buf)
                .map_err(|e| self.read_error(e))?;
            if read == 0 {
                break;
            }

            // Drop the rest of an oversized line skipped on an earlier read
            let start = if self.discarding_line {
                match buf.iter().position(|b| *b == b'\n') {
                    Some(pos) => {
                        self.discarding_line = false;
                        pos + 1
                    }
                    None => buf.len(),
                }
            } else {
                0
            };

            let complete = buf[start..]
                .iter()
                .rposition(|b| *b == b'\n')
                .map_or(start, |pos| start + pos + 1);

            for raw in buf[start..complete].split(|b| *b == b'\n') {
                self.process_raw_line(raw, &mut summary);
            }

            let partial = buf.len() - complete;
            let consumed = if partial > MAX_LINE_LEN {
                warn!(bytes = partial, "Skipping oversized unterminated line");
                self.discarding_line = true;
                buf.len()
            } else {
                complete
            };
            if consumed == 0 {
                break;
            }

            self.state.read_offset += consumed as u64;
            summary.bytes_consumed += consumed as u64;

            if read < MAX_READ_CHUNK_BYTES {
                break;
            }
        }

        Ok(summary)
    }

    fn process_raw_line(&mut self, raw: &[u8], summary: &mut PollSummary) {
        if raw.len() > MAX_LINE_LEN {
            warn!(bytes = raw.len(), "Skipping oversized line");
            return;
        }

        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return;
        }

        summary.lines_read += 1;
        if let LineOutcome::Processed { alerts } = self.process_line(line) {
            summary.records_parsed += 1;
            summary.alerts_queued += alerts;
        }
    }

    fn read_error(&self, source: io::Error) -> AppError {
        AppError::log_read(&self.path, source)
    }

    /// Drain the existing file content with alerting suppressed, then go live
    pub fn backfill(&mut self) -> TailResult<PollSummary> {
        self.phase = TailPhase::Backfilling;
        self.state.startup_mode = true;

        let summary = match self.start_position {
            StartPosition::Beginning => {
                info!(log_file = %self.path.display(), "Processing existing log content");
                self.poll()?
            }
            StartPosition::End => {
                let len = fs::metadata(&self.path)
                    .map_err(|e| self.read_error(e))?
                    .len();
                info!(offset = len, "Skipping existing log content");
                self.state.read_offset = len;
                PollSummary::default()
            }
        };

        self.finish_backfill(&summary);
        Ok(summary)
    }

    fn finish_backfill(&mut self, summary: &PollSummary) {
        let window = self.state.error_rate.window();
        info!(
            requests = summary.records_parsed,
            lines = summary.lines_read,
            offset = self.state.read_offset,
            "Processed existing requests"
        );
        if let Some(rate) = window.error_rate() {
            info!(
                error_rate = %format_percent(rate),
                errors = window.error_count(),
                total = window.len(),
                "Initial error rate"
            );
        }
        info!(pool = self.state.current_pool().unwrap_or("none"), "Current pool");

        self.state.startup_mode = false;
        self.phase = TailPhase::Live;
        info!("Startup complete, monitoring for new events");
    }

    /// Sleep until the log file exists. A directory at the path is fatal.
    pub async fn wait_for_file(&mut self) -> TailResult<()> {
        self.phase = TailPhase::AwaitingFile;
        let mut attempt: u64 = 0;

        loop {
            match self.log_file_exists() {
                Ok(true) => {
                    info!(log_file = %self.path.display(), "Log file found");
                    return Ok(());
                }
                Ok(false) => {
                    attempt += 1;
                    info!(log_file = %self.path.display(), attempt, "Waiting for log file");
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    warn!(error = %e, error_code = e.error_code(), attempt, "Cannot stat log file, retrying");
                }
            }
            tokio::time::sleep(self.file_wait_interval).await;
        }
    }

    /// Run until `shutdown` completes or a fatal error occurs.
    ///
    /// Read errors after startup are logged and retried on the next tick.
    pub async fn run<F>(mut self, shutdown: F) -> TailResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested while waiting for log file");
                return Ok(());
            }
            found = self.wait_for_file() => found?,
        }

        loop {
            match self.backfill() {
                Ok(_) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, error_code = e.error_code(), "Backfill failed, retrying");
                }
            }
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(offset = self.state.read_offset, "Stopping tail engine");
                    break;
                }
                _ = ticker.tick() => match self.poll() {
                    Ok(summary) if summary.lines_read > 0 || summary.rotated => {
                        debug!(
                            lines = summary.lines_read,
                            records = summary.records_parsed,
                            alerts = summary.alerts_queued,
                            offset = self.state.read_offset,
                            "Poll complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(error = %e, error_code = e.error_code(), "Failed to read log file");
                    }
                },
            }
        }

        Ok(())
    }
}
