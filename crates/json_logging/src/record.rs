//! The single record representation both logging APIs are normalized into before rendering.

use std::{
    backtrace::Backtrace,
    error::Error,
    fmt::{self, Write as _},
};

use serde_json::{Map, Value};
use tracing::Level;

/// Severity of a [`LogRecord`], ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Diagnostic detail. `TRACE` records of either API are reported as `debug` too.
    Debug,

    /// Routine operational messages.
    Info,

    /// Something unexpected that the process recovered from.
    Warning,

    /// An operation failed.
    Error,

    /// The process cannot reasonably continue.
    Critical,
}

impl Severity {
    /// Lowercase name, as rendered in the `level` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// The [`tracing`] level used when filtering records of this severity.
    ///
    /// `Critical` shares `ERROR` with `Error`, so a `Critical` minimum filters like `Error`.
    pub fn as_level(self) -> Level {
        match self {
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    pub(crate) fn from_level(level: Level, critical: bool) -> Self {
        match level {
            Level::ERROR if critical => Self::Critical,
            Level::ERROR => Self::Error,
            Level::WARN => Self::Warning,
            Level::INFO => Self::Info,
            _ => Self::Debug,
        }
    }

    pub(crate) fn from_log_level(level: log::Level, critical: bool) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Self::Debug,
            log::Level::Info => Self::Info,
            log::Level::Warn => Self::Warning,
            log::Level::Error if critical => Self::Critical,
            log::Level::Error => Self::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which logging API produced a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A [`tracing`] event. Fully processed before it reaches the sinks.
    Structured,

    /// A [`log`] record. Sinks run their foreign pre-chain on it before rendering.
    Legacy,
}

/// An error captured at a logging call site, with the backtrace of that call site.
#[derive(Clone, Debug)]
pub struct ExceptionInfo {
    message: String,
    causes: Vec<String>,
    traceback: String,
}

impl ExceptionInfo {
    /// Captures an error, its `source()` chain and the current backtrace.
    pub fn capture(error: &(dyn Error + 'static)) -> Self {
        let causes = std::iter::successors(error.source(), |&cause| cause.source())
            .map(ToString::to_string)
            .collect();

        Self {
            message: error.to_string(),
            causes,
            traceback: Backtrace::force_capture().to_string(),
        }
    }

    /// Captures a value that is not an [`Error`], e.g. a `log` key-value captured with `Display`.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
            traceback: Backtrace::force_capture().to_string(),
        }
    }

    /// The `Display` representation of the captured error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExceptionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;

        if !self.causes.is_empty() {
            f.write_str("\n\nCaused by:")?;
            for (index, cause) in self.causes.iter().enumerate() {
                write!(f, "\n    {index}: {cause}")?;
            }
        }

        write!(f, "\n\nTraceback:\n{}", self.traceback)
    }
}

/// Renders the stack of the current call site, for records that asked for `stack_info`.
pub(crate) fn capture_stack() -> String {
    let mut rendered = String::from("Stack:\n");
    // Writing into a `String` cannot fail
    let _ = write!(rendered, "{}", Backtrace::force_capture());
    rendered
}

/// One log event, whichever API emitted it.
///
/// The processing chain turns the typed attributes (`severity`, `logger`, `exception`,
/// `stack_info`) into entries of `fields`, which is what the sinks render alongside `event`.
#[derive(Clone, Debug)]
pub struct LogRecord {
    /// Severity of the record.
    pub severity: Severity,

    /// Dotted or `::`-separated name of the emitting logger (the `tracing`/`log` target).
    pub logger: String,

    /// The primary human-readable message.
    pub event: String,

    /// Caller-supplied context, rendered at the top level of the JSON object.
    pub fields: Map<String, Value>,

    /// Exception information, if the record was emitted with an `exception` value.
    pub exception: Option<ExceptionInfo>,

    /// Rendered stack of the call site, if the record was emitted with `stack_info = true`.
    pub stack_info: Option<String>,

    /// The API that produced the record.
    pub origin: Origin,
}

impl LogRecord {
    /// Creates a record without context fields.
    pub fn new(
        severity: Severity,
        logger: impl Into<String>,
        event: impl Into<String>,
        origin: Origin,
    ) -> Self {
        Self {
            severity,
            logger: logger.into(),
            event: event.into(),
            fields: Map::new(),
            exception: None,
            stack_info: None,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[derive(Debug)]
    struct Wrapped(io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("failed to load settings")
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn severities_map_onto_both_apis() {
        assert_eq!(Severity::from_level(Level::TRACE, false), Severity::Debug);
        assert_eq!(Severity::from_level(Level::WARN, false), Severity::Warning);
        assert_eq!(Severity::from_level(Level::ERROR, true), Severity::Critical);
        assert_eq!(Severity::from_level(Level::INFO, true), Severity::Info);
        assert_eq!(
            Severity::from_log_level(log::Level::Error, false),
            Severity::Error
        );
        assert_eq!(
            Severity::from_log_level(log::Level::Trace, false),
            Severity::Debug
        );
        assert!(Severity::Critical > Severity::Error);
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn exception_info_renders_causes_and_traceback() {
        let error = Wrapped(io::Error::new(io::ErrorKind::NotFound, "settings.toml"));
        let rendered = ExceptionInfo::capture(&error).to_string();

        assert!(rendered.starts_with("failed to load settings"));
        assert!(rendered.contains("Caused by:\n    0: settings.toml"));
        assert!(rendered.contains("Traceback:\n"));
    }

    #[test]
    fn plain_messages_have_no_causes() {
        let rendered = ExceptionInfo::from_message("whatever").to_string();

        assert!(rendered.starts_with("whatever\n\nTraceback:\n"));
        assert!(!rendered.contains("Caused by"));
    }
}
