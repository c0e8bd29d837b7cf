//! Reporting of failures that would otherwise end the process without a JSON log line.

use std::{error::Error, fmt, panic::PanicHookInfo};

/// A panic, captured by the panic hook so that it can be reported as an error.
#[derive(Debug, Clone)]
pub struct PanicReport {
    message: String,
    location: Option<String>,
}

impl PanicReport {
    /// Creates a report from a panic message and the `file:line:column` it was raised at.
    pub fn new(message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Captures the payload and location of a panic.
    pub fn from_hook_info(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };

        Self::new(message, info.location().map(ToString::to_string))
    }
}

impl fmt::Display for PanicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "panicked at {location}: {}", self.message),
            None => write!(f, "panicked: {}", self.message),
        }
    }
}

impl Error for PanicReport {}

/// Logs an error that is about to end the process as a single `error` record with the event
/// `"Uncaught error"` and the rendered error in the `exception` field.
///
/// The panic hook installed by [`initialize`](crate::initialize) calls this with a
/// [`PanicReport`]. Call it directly for errors returned from `main`:
///
/// ```
/// fn run() -> Result<(), std::io::Error> {
///     Err(std::io::Error::other("something!"))
/// }
///
/// if let Err(error) = run() {
///     json_logging::report_uncaught(&error);
/// }
/// ```
pub fn report_uncaught(error: &(dyn Error + 'static)) {
    tracing::error!(exception = error, "Uncaught error");
}

/// Replaces the default panic hook with one reporting panics through [`report_uncaught`].
pub(crate) fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        report_uncaught(&PanicReport::from_hook_info(info));
    }));
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        LoggingConfig, RootLogger, configure,
        test_utils::{SharedBuffer, subscriber},
    };

    #[test]
    fn uncaught_errors_are_one_error_line() {
        let buffer = SharedBuffer::default();
        let root = Arc::new(RootLogger::new());
        configure(&root, LoggingConfig::default(), buffer.clone()).unwrap();

        tracing::subscriber::with_default(subscriber(&root), || {
            report_uncaught(&std::io::Error::other("something!"));
        });

        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["event"], "Uncaught error");
        assert_eq!(lines[0]["level"], "error");
        assert_eq!(lines[0]["logger"], "json_logging::uncaught");
        let exception = lines[0]["exception"].as_str().unwrap();
        assert!(exception.starts_with("something!"));
        assert!(exception.contains("Traceback"));
    }

    #[test]
    fn panic_reports_render_location_and_message() {
        let report = PanicReport::new("index out of bounds", Some("src/main.rs:3:5".to_owned()));
        assert_eq!(
            report.to_string(),
            "panicked at src/main.rs:3:5: index out of bounds"
        );
        assert_eq!(PanicReport::new("boom", None).to_string(), "panicked: boom");
    }
}
