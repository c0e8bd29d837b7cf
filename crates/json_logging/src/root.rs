//! The process-wide root logger: the sinks every record is handed to, and the severity filter
//! deciding which records get that far.

use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use super::{LogRecord, LoggerError, Severity, formatter::Sink};

/// Minimum severity of the root logger before any setup, and after [`RootLogger::reset`].
const DEFAULT_LEVEL: Severity = Severity::Warning;

#[derive(Debug)]
struct FilterState {
    level: Severity,
    overrides: Vec<(String, Severity)>,
}

impl FilterState {
    /// The minimum severity for `logger`: that of the most specific override covering it, or the
    /// default level.
    fn threshold(&self, logger: &str) -> Severity {
        self.overrides
            .iter()
            .filter(|(prefix, _)| covers(prefix, logger))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or(self.level, |&(_, severity)| severity)
    }
}

/// Whether `logger` is `prefix` itself or one of its `::`-separated descendants.
fn covers(prefix: &str, logger: &str) -> bool {
    logger
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// A shared handle to a minimum severity plus per-logger overrides.
///
/// Overrides apply to a logger and its descendants in the module path, and the most specific
/// one wins: an override for `aws_smithy_runtime` also applies to
/// `aws_smithy_runtime::client::orchestrator`, but not to `aws_smithy_runtime_api`.
#[derive(Clone, Debug)]
pub struct SeverityFilter(Arc<RwLock<FilterState>>);

impl SeverityFilter {
    /// Creates a filter with the given minimum severity and no overrides.
    pub fn new(level: Severity) -> Self {
        Self(Arc::new(RwLock::new(FilterState {
            level,
            overrides: Vec::new(),
        })))
    }

    /// Whether a record of `severity` from `logger` passes the filter.
    pub fn would_enable(&self, logger: &str, severity: Severity) -> bool {
        let state = self.0.read().unwrap_or_else(PoisonError::into_inner);
        severity.as_level() <= state.threshold(logger).as_level()
    }

    /// The minimum severity applied to loggers without an override.
    pub fn level(&self) -> Severity {
        self.0.read().unwrap_or_else(PoisonError::into_inner).level
    }

    fn update(&self, f: impl FnOnce(&mut FilterState)) {
        let mut state = self.0.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

/// The root every log record is routed to, owning the sinks and the severity filter.
///
/// A process normally uses the single instance returned by [`RootLogger::global`], which the
/// [`initialize`](crate::initialize) functions configure. Independent instances are useful
/// together with scoped `tracing` dispatchers, e.g. to keep tests isolated from each other.
#[derive(Debug)]
pub struct RootLogger {
    sinks: RwLock<Vec<Arc<dyn Sink>>>,
    filter: SeverityFilter,
}

impl Default for RootLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl RootLogger {
    /// Creates a root logger without sinks, letting `warning` and above through.
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
            filter: SeverityFilter::new(DEFAULT_LEVEL),
        }
    }

    /// The process-wide root logger.
    pub fn global() -> Arc<Self> {
        static GLOBAL: LazyLock<Arc<RootLogger>> = LazyLock::new(|| Arc::new(RootLogger::new()));
        Arc::clone(&GLOBAL)
    }

    /// Attaches a sink. Sinks are not deduplicated: attaching two JSON sinks writes every line
    /// twice.
    pub fn add_sink(&self, sink: Arc<dyn Sink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Detaches and returns the most recently attached sink.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::NoSinkToRemove`] if no sink is attached.
    pub fn remove_last_sink(&self) -> Result<Arc<dyn Sink>, LoggerError> {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(LoggerError::NoSinkToRemove)
    }

    /// Number of attached sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Sets the minimum severity for loggers without an override.
    pub fn set_level(&self, level: Severity) {
        self.filter.update(|state| state.level = level);
    }

    /// Sets the minimum severity for a logger and its descendants in the module path.
    pub fn set_logger_level(&self, logger: impl Into<String>, level: Severity) {
        let logger = logger.into();
        self.filter.update(|state| {
            state.overrides.retain(|(existing, _)| *existing != logger);
            state.overrides.push((logger, level));
        });
    }

    /// The minimum severity for loggers without an override.
    pub fn level(&self) -> Severity {
        self.filter.level()
    }

    /// A handle to this root's severity filter, reflecting later changes.
    pub fn filter(&self) -> SeverityFilter {
        self.filter.clone()
    }

    /// Whether a record of `severity` from `logger` would be emitted.
    pub fn enabled(&self, logger: &str, severity: Severity) -> bool {
        self.filter.would_enable(logger, severity)
    }

    /// Hands a record to every attached sink.
    ///
    /// All sinks are tried even if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by a sink.
    pub fn log(&self, record: &LogRecord) -> Result<(), LoggerError> {
        // Sinks emit outside the lock, a sink may itself log
        let sinks = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut result = Ok(());
        for sink in sinks {
            if let Err(error) = sink.emit(record) {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    /// Detaches all sinks and restores the initial severity filter.
    pub fn reset(&self) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.filter.update(|state| {
            state.level = DEFAULT_LEVEL;
            state.overrides.clear();
        });
    }
}
