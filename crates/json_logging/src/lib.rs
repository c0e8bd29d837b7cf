//! `json_logging` makes every log line of a process come out as one JSON object on standard
//! output, whichever logging API produced it.
//!
//! It offers:
//! - A [`StructuredLayer`] that turns [`tracing`] events (and the fields of their enclosing spans)
//!   into [`LogRecord`]s.
//! - A [`LegacyBridge`] that does the same for [`log`] records, including their key-values.
//! - A [`RootLogger`] owning the process-wide [`Sink`]s and severity filter, and a
//!   [`JsonSink`] rendering records as line-delimited JSON.
//! - The [`initialize`] and [`initialize_for_hosted_function`] entry points wiring all of the
//!   above together and installing a panic hook that reports panics through [`report_uncaught`].
//!
//! Every emitted line carries `event`, `level` and `logger`, plus any context fields at the top
//! level, and `exception` / `stack_info` when requested.
//!
//! # Example
//!
//! ```
//! fn main() -> Result<(), json_logging::LoggerError> {
//!     json_logging::initialize()?;
//!
//!     // {"event":"info inf","level":"info","logger":"legacy"}
//!     log::info!(target: "legacy", "info {}", "inf");
//!
//!     // {"event":"error","level":"error","logger":"structured","some_value":"err"}
//!     tracing::error!(target: "structured", some_value = "err", "error");
//!
//!     // Filtered out, the minimum severity is `info`
//!     tracing::debug!("debug");
//!
//!     Ok(())
//! }
//! ```

mod bootstrap;
mod chain;
mod config;
mod formatter;
mod legacy;
mod record;
mod root;
mod storage;
mod structured;
mod uncaught;

#[cfg(test)]
mod test_utils;

pub use tracing::Level;

pub use self::{
    bootstrap::{
        configure, initialize, initialize_for_hosted_function, initialize_for_hosted_function_with,
        initialize_with,
    },
    chain::{
        AddLogLevel, AddLoggerName, AddTimestamp, FilterByLevel, FormatExceptionInfo, Outcome,
        ProcessingChain, Processor, StackInfoRenderer,
    },
    config::{LogFormat, LoggingConfig, default_severity_overrides},
    formatter::{JsonSink, JsonSinkConfig, Sink},
    legacy::LegacyBridge,
    record::{ExceptionInfo, LogRecord, Origin, Severity},
    root::{RootLogger, SeverityFilter},
    structured::StructuredLayer,
    uncaught::{PanicReport, report_uncaught},
};

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}

mod keys {
    use std::sync::LazyLock;

    use rustc_hash::FxHashSet;

    pub(crate) const EVENT: &str = "event";
    pub(crate) const MESSAGE: &str = "message";
    pub(crate) const LEVEL: &str = "level";
    pub(crate) const LOGGER: &str = "logger";
    pub(crate) const EXCEPTION: &str = "exception";
    pub(crate) const STACK_INFO: &str = "stack_info";
    pub(crate) const TIMESTAMP: &str = "timestamp";
    pub(crate) const CRITICAL: &str = "critical";

    /// Keys owned by the processing chain, which callers cannot set as plain context.
    pub(crate) static RESERVED_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
        [
            EVENT, MESSAGE, LEVEL, LOGGER, EXCEPTION, STACK_INFO, TIMESTAMP, CRITICAL,
        ]
        .iter()
        .copied()
        .collect()
    });
}

/// Errors that can occur while setting up or emitting logs.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Represents an error in configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Represents an error during JSON serialization.
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Represents a failure to write a rendered line to its destination.
    #[error("Failed to write log line: {0}")]
    Io(#[from] std::io::Error),

    /// The hosted-function setup expected a sink installed by the host, but the root logger
    /// had none.
    #[error("No pre-existing sink is attached to the root logger")]
    NoSinkToRemove,

    /// Another global `tracing` subscriber was installed before ours.
    #[error("Failed to install the global tracing subscriber: {0}")]
    SetGlobalDispatcher(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Another global `log` logger was installed before ours.
    #[error("Failed to install the global `log` logger: {0}")]
    SetLogger(#[from] log::SetLoggerError),
}

/// Emits a `critical` record through the [`tracing`] API.
///
/// Accepts the same arguments as [`tracing::error!`]; the record is rendered with
/// `"level": "critical"`.
///
/// ```
/// json_logging::critical!(target: "billing", invoice_id = 42, "ledger out of balance");
/// ```
#[macro_export]
macro_rules! critical {
    (target: $target:expr, $($arg:tt)+) => {
        $crate::__private::tracing::error!(target: $target, critical = true, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__private::tracing::error!(critical = true, $($arg)+)
    };
}
