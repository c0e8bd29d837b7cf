//! Entry points configuring the process-wide root logger and routing both logging APIs to it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use serde_json::ser::{CompactFormatter, PrettyFormatter};
use tracing_subscriber::{Registry, fmt::MakeWriter, layer::SubscriberExt};

use super::{
    JsonSink, JsonSinkConfig, LegacyBridge, LogFormat, LoggerError, LoggingConfig,
    ProcessingChain, RootLogger, Sink, StructuredLayer, uncaught,
};

/// Whether the global `tracing` subscriber points at the global root.
static TRACING_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Whether the global `log` logger points at the global root.
static LOG_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Sets up JSON logging on standard output for the whole process.
///
/// This sets the minimum severity to `info`, attaches a JSON sink writing to standard output,
/// routes both [`tracing`] events and [`log`] records through it, makes noisy third-party
/// loggers log at `warning` and above only, and reports panics as `"Uncaught error"` records.
///
/// The panic hook runs before unwinding starts, so a panic later caught with
/// [`std::panic::catch_unwind`] is reported as well.
///
/// Call it once, early in `main`. Calling it again attaches a second sink, and every line is
/// then written twice.
///
/// # Errors
///
/// Returns [`LoggerError`] if another global `tracing` subscriber or `log` logger was
/// installed first. No sink is attached in that case.
pub fn initialize() -> Result<Arc<RootLogger>, LoggerError> {
    initialize_with(LoggingConfig::default(), std::io::stdout)
}

/// Like [`initialize`], with an explicit configuration and output destination.
///
/// The global adapters are installed by the first successful call only, so `config.timestamp`
/// applies to `tracing` events as configured by that call.
///
/// # Errors
///
/// Returns [`LoggerError`] if the configuration is invalid, or if another global `tracing`
/// subscriber or `log` logger was installed first. The root logger is left unchanged.
pub fn initialize_with<W>(
    config: LoggingConfig,
    make_writer: W,
) -> Result<Arc<RootLogger>, LoggerError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let root = RootLogger::global();
    let sink = json_sink(&config, make_writer)?;

    install_global_adapters(&root, config.timestamp)?;
    attach(&root, config, sink);
    uncaught::install_panic_hook();

    Ok(root)
}

/// Sets up JSON logging inside a hosting environment that attaches its own sink to the root
/// logger before our code runs, such as a serverless function runtime.
///
/// The most recently attached sink is removed first (test harnesses may attach theirs in front
/// of the host's), then [`initialize`] runs, so that every line is written once.
///
/// # Errors
///
/// Returns [`LoggerError::NoSinkToRemove`] if no sink is attached, and any error [`initialize`]
/// can return. The host's sink stays attached on failure.
pub fn initialize_for_hosted_function() -> Result<Arc<RootLogger>, LoggerError> {
    initialize_for_hosted_function_with(LoggingConfig::default(), std::io::stdout)
}

/// Like [`initialize_for_hosted_function`], with an explicit configuration and output
/// destination.
///
/// # Errors
///
/// See [`initialize_for_hosted_function`] and [`initialize_with`].
pub fn initialize_for_hosted_function_with<W>(
    config: LoggingConfig,
    make_writer: W,
) -> Result<Arc<RootLogger>, LoggerError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let root = RootLogger::global();
    let sink = json_sink(&config, make_writer)?;

    let host_sink = root.remove_last_sink()?;
    if let Err(error) = install_global_adapters(&root, config.timestamp) {
        root.add_sink(host_sink);
        return Err(error);
    }
    tracing::debug!(?host_sink, "Removed the sink installed by the host");

    attach(&root, config, sink);
    uncaught::install_panic_hook();

    Ok(root)
}

/// Configures a root logger without touching any process-wide state: sets its minimum
/// severity, attaches a JSON sink writing to `make_writer` and applies the severity overrides.
///
/// Combine it with a [`StructuredLayer`] in a scoped `tracing` dispatcher, or a
/// [`LegacyBridge`], to log to an isolated root.
///
/// # Errors
///
/// Returns [`LoggerError::Configuration`] if a static top-level field uses a reserved key.
pub fn configure<W>(
    root: &RootLogger,
    config: LoggingConfig,
    make_writer: W,
) -> Result<(), LoggerError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let sink = json_sink(&config, make_writer)?;
    attach(root, config, sink);
    Ok(())
}

fn json_sink<W>(config: &LoggingConfig, make_writer: W) -> Result<Arc<dyn Sink>, LoggerError>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let sink_config = JsonSinkConfig {
        static_top_level_fields: config.static_top_level_fields.clone(),
        foreign_pre_chain: ProcessingChain::base(config.timestamp),
    };

    Ok(match config.log_format {
        LogFormat::CompactJson => Arc::new(JsonSink::new(
            sink_config,
            make_writer,
            CompactFormatter,
        )?),
        LogFormat::PrettyJson => Arc::new(JsonSink::new(
            sink_config,
            make_writer,
            PrettyFormatter::new(),
        )?),
    })
}

fn attach(root: &RootLogger, config: LoggingConfig, sink: Arc<dyn Sink>) {
    root.set_level(config.level);
    root.add_sink(sink);
    for (logger, severity) in config.severity_overrides {
        root.set_logger_level(logger, severity);
    }
}

/// Points the global `tracing` dispatcher and `log` logger at `root`. Each is installed at most
/// once, so a call failing on one of them can be retried without touching the other.
fn install_global_adapters(root: &Arc<RootLogger>, timestamp: bool) -> Result<(), LoggerError> {
    if !TRACING_INSTALLED.load(Ordering::Acquire) {
        let subscriber = Registry::default().with(StructuredLayer::new(
            Arc::clone(root),
            ProcessingChain::base(timestamp),
        ));
        tracing::subscriber::set_global_default(subscriber)?;
        TRACING_INSTALLED.store(true, Ordering::Release);
    }

    if !LOG_INSTALLED.load(Ordering::Acquire) {
        log::set_boxed_logger(Box::new(LegacyBridge::new(Arc::clone(root))))?;
        log::set_max_level(log::LevelFilter::Trace);
        LOG_INSTALLED.store(true, Ordering::Release);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::HashMap;

    use log::Log as _;
    use serde_json::json;

    use super::*;
    use crate::{
        Severity,
        test_utils::{SharedBuffer, subscriber},
    };

    #[test]
    fn configure_attaches_one_sink_per_call() {
        let buffer = SharedBuffer::default();
        let root = Arc::new(RootLogger::new());

        configure(&root, LoggingConfig::default(), buffer.clone()).unwrap();
        assert_eq!(root.sink_count(), 1);
        assert_eq!(root.level(), Severity::Info);

        configure(&root, LoggingConfig::default(), buffer.clone()).unwrap();
        tracing::subscriber::with_default(subscriber(&root), || {
            tracing::info!(target: "app", "twice");
        });

        assert_eq!(root.sink_count(), 2);
        assert_eq!(buffer.json_lines().len(), 2);
    }

    #[test]
    fn invalid_configuration_leaves_the_root_untouched() {
        let root = RootLogger::new();
        let config = LoggingConfig {
            static_top_level_fields: HashMap::from([("event".to_owned(), json!("x"))]),
            ..LoggingConfig::default()
        };

        let result = configure(&root, config, SharedBuffer::default());

        assert!(matches!(result, Err(LoggerError::Configuration(_))));
        assert_eq!(root.sink_count(), 0);
        assert_eq!(root.level(), Severity::Warning);
    }

    #[test]
    fn static_fields_and_timestamps_are_rendered() {
        let buffer = SharedBuffer::default();
        let root = Arc::new(RootLogger::new());
        let config = LoggingConfig {
            static_top_level_fields: HashMap::from([("service".to_owned(), json!("billing"))]),
            timestamp: true,
            ..LoggingConfig::default()
        };
        configure(&root, config, buffer.clone()).unwrap();

        LegacyBridge::new(Arc::clone(&root)).log(
            &log::Record::builder()
                .level(log::Level::Warn)
                .target("app")
                .args(format_args!("low balance"))
                .build(),
        );

        let line = &buffer.json_lines()[0];
        assert_eq!(line["service"], "billing");
        assert_eq!(line["level"], "warning");
        assert!(line["timestamp"].is_string());
    }

    #[test]
    fn pretty_output_is_still_valid_json() {
        let buffer = SharedBuffer::default();
        let root = Arc::new(RootLogger::new());
        let config = LoggingConfig {
            log_format: LogFormat::PrettyJson,
            ..LoggingConfig::default()
        };
        configure(&root, config, buffer.clone()).unwrap();

        tracing::subscriber::with_default(subscriber(&root), || {
            tracing::info!(target: "app", "pretty");
        });

        let output = buffer.contents();
        assert!(output.lines().count() > 1);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["event"], "pretty");
    }
}
