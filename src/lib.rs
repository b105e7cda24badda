//! Blue/green pool watcher
//!
//! Tails a reverse-proxy access log, detects pool failovers and sustained
//! upstream 5xx error rates, and posts cooldown-gated alerts to Slack.

pub mod config;
pub mod event;
pub mod monitoring;
pub mod shutdown;
pub mod utils;
