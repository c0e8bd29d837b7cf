//! Configuration of the logging bootstrap.

use std::collections::HashMap;

use serde_json::Value;

use super::Severity;

/// Comprehensive configuration for the logging bootstrap.
///
/// The [`Default`] is what [`initialize`](crate::initialize) uses: `info` and above, the
/// [`default_severity_overrides`], no static fields, no timestamp, compact JSON.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum severity for loggers without an override.
    pub level: Severity,

    /// Logger-name prefixes paired with their minimum severity, used to make chatty
    /// third-party crates less verbose.
    pub severity_overrides: Vec<(String, Severity)>,

    /// A map of key-value pairs that are statically defined at initialization and included
    /// at the top level of every log entry.
    pub static_top_level_fields: HashMap<String, Value>,

    /// If `true`, every log entry carries an ISO 8601 `timestamp` field.
    pub timestamp: bool,

    /// Output format of the JSON sink.
    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Info,
            severity_overrides: default_severity_overrides(),
            static_top_level_fields: HashMap::new(),
            timestamp: false,
            log_format: LogFormat::CompactJson,
        }
    }
}

/// Defines the output format of the JSON sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact, single-line JSON format.
    CompactJson,

    /// Pretty-printed, multi-line JSON format, for reading logs locally.
    PrettyJson,
}

/// Loggers known to be noisy at `info`, lowered to `warning`.
pub fn default_severity_overrides() -> Vec<(String, Severity)> {
    vec![("aws_smithy_runtime".to_owned(), Severity::Warning)]
}
