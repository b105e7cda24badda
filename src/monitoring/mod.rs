//! Access log monitoring
//!
//! - Log line parsing and the tail engine
//! - Failover and error-rate detectors with per-kind cooldowns
//! - Slack webhook notifications and the worker that sends them

pub mod cooldown;
pub mod dispatcher;
pub mod error_rate;
pub mod failover;
pub mod log_parser;
pub mod log_watcher;
pub mod processor;
pub mod slack_alert;
pub mod state;
pub mod window;

pub use dispatcher::{AlertDispatcher, DispatchOutcome, NotificationSink};
pub use log_parser::{parse_line, LineParser, LogRecord};
pub use log_watcher::{PollSummary, TailEngine, TailPhase};
pub use processor::{AlertWorker, WorkerStats};
pub use slack_alert::SlackWebhook;
pub use state::MonitorState;
