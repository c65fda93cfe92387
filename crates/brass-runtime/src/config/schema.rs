//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [logging.filters]
//! brass_framework = "trace"
//!
//! [polling]
//! timeout_secs = 30
//! update_types = ["message_created", "message_callback"]
//!
//! [retry]
//! rate_limit_intervals_ms = [1000, 2000, 5000, 10000]
//!
//! [dispatch]
//! queue_capacity = 100
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use brass_core::{DEFAULT_RATE_LIMIT_INTERVALS, DEFAULT_UPLOAD_RETRY_INTERVALS, RetryPolicy};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrassConfig {
    pub logging: LoggingConfig,
    pub polling: PollingConfig,
    pub retry: RetryConfig,
    pub dispatch: DispatchConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout. `json` needs the `json-log` feature and falls back to
/// `full` without it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub span_events: SpanEventConfig,
    /// Show thread ids.
    pub thread_ids: bool,
    /// Show source file and line.
    pub file_location: bool,
    /// Required when `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Per-module levels, e.g. `brass_framework = "debug"`.
    pub filters: HashMap<String, LogLevel>,
}

// =============================================================================
// Polling
// =============================================================================

/// `[polling]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Long-poll timeout sent to the platform.
    pub timeout_secs: u64,
    /// Maximum updates per batch (1..=1000).
    pub limit: u32,
    /// Update types to request; empty means all.
    pub update_types: Vec<String>,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            limit: 100,
            update_types: Vec::new(),
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl PollingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

// =============================================================================
// Retry
// =============================================================================

/// `[retry]` section: wait schedules for retryable platform errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub rate_limit_intervals_ms: Vec<u64>,
    pub upload_retry_intervals_ms: Vec<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let millis = |d: &[Duration]| d.iter().map(|d| d.as_millis() as u64).collect();
        Self {
            rate_limit_intervals_ms: millis(&DEFAULT_RATE_LIMIT_INTERVALS),
            upload_retry_intervals_ms: millis(&DEFAULT_UPLOAD_RETRY_INTERVALS),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let durations =
            |ms: &[u64]| -> Vec<Duration> { ms.iter().copied().map(Duration::from_millis).collect() };
        RetryPolicy::default()
            .with_rate_limit_intervals(durations(&self.rate_limit_intervals_ms))
            .with_upload_retry_intervals(durations(&self.upload_retry_intervals_ms))
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// `[dispatch]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Capacity of the queue between the poller and the dispatcher.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
        }
    }
}
