//! Access log line parsing
//!
//! Extracts the `key=value` tokens the proxy writes into each access log line.
//! Fields are matched independently, so their order and any surrounding text
//! do not matter.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static POOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bpool=(\w+)").expect("valid regex"));
static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brelease=([\w.\-]+)").expect("valid regex"));
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bupstream_status=(\d+)").expect("valid regex"));
static UPSTREAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bupstream=([\d.:]+)").expect("valid regex"));
static REQUEST_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brequest_time=([\d.]+)").expect("valid regex"));
static UPSTREAM_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bupstream_response_time=([\d.]+)").expect("valid regex"));

const UNKNOWN: &str = "unknown";

/// One proxied request, as seen in the access log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub pool: String,
    /// `"unknown"` when absent
    pub release: String,
    /// `"unknown"` when absent
    pub upstream: String,
    pub upstream_status: u16,
    /// Seconds, 0 when absent
    pub request_time: f64,
    /// Seconds, 0 when absent
    pub upstream_response_time: f64,
}

impl LogRecord {
    /// True iff the upstream answered with a 5xx
    pub fn is_upstream_error(&self) -> bool {
        (500..600).contains(&self.upstream_status)
    }
}

/// Parse a raw access log line.
///
/// Returns `None` unless both a pool and a numeric upstream status are
/// present. Malformed numbers never fail the call: a bad status rejects the
/// line, bad timings fall back to 0.
pub fn parse_line(line: &str) -> Option<LogRecord> {
    let pool = capture(&POOL_RE, line)?;
    let upstream_status = capture(&STATUS_RE, line)?.parse::<u16>().ok()?;

    Some(LogRecord {
        pool: pool.to_string(),
        release: capture(&RELEASE_RE, line).unwrap_or(UNKNOWN).to_string(),
        upstream: capture(&UPSTREAM_RE, line).unwrap_or(UNKNOWN).to_string(),
        upstream_status,
        request_time: parse_seconds(capture(&REQUEST_TIME_RE, line)),
        upstream_response_time: parse_seconds(capture(&UPSTREAM_TIME_RE, line)),
    })
}

fn capture<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn parse_seconds(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Line parser with an optional health-check pre-filter.
///
/// Lines containing the marker (e.g. `/healthz`) are dropped before parsing so
/// synthetic traffic never reaches the error window.
#[derive(Debug, Clone, Default)]
pub struct LineParser {
    health_check_marker: Option<String>,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_health_check_marker(marker: Option<String>) -> Self {
        Self {
            health_check_marker: marker.filter(|m| !m.is_empty()),
        }
    }

    pub fn is_health_check(&self, line: &str) -> bool {
        self.health_check_marker
            .as_deref()
            .is_some_and(|marker| line.contains(marker))
    }

    pub fn parse(&self, line: &str) -> Option<LogRecord> {
        if self.is_health_check(line) {
            return None;
        }
        parse_line(line)
    }
}
