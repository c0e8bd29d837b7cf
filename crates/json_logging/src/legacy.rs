//! Provides [`LegacyBridge`], the adapter routing [`log`] records to a [`RootLogger`].

use std::sync::Arc;

use log::kv::{self, Key, Source as _, VisitSource};
use serde_json::{Map, Value};

use super::{ExceptionInfo, LogRecord, Origin, RootLogger, Severity, keys, record::capture_stack};

/// A [`log::Log`] implementation handing `log` records to a [`RootLogger`].
///
/// The formatted arguments become the event, the target becomes the logger name and key-values
/// become context fields. Records are passed on unprocessed: each sink runs its foreign
/// pre-chain on them.
///
/// Key-values named `exception` (captured with `:err`), `stack_info` and `critical` are
/// interpreted the same way as the fields of `tracing` events:
///
/// ```
/// # let err = std::io::Error::other("whatever");
/// log::error!(exception:err = err; "exception {}", "exc");
/// ```
#[derive(Debug)]
pub struct LegacyBridge {
    root: Arc<RootLogger>,
}

impl LegacyBridge {
    /// Creates a bridge logging to `root`.
    pub fn new(root: Arc<RootLogger>) -> Self {
        Self { root }
    }

    /// Normalizes a `log` record.
    pub fn to_log_record(record: &log::Record<'_>) -> LogRecord {
        let mut key_values = KeyValues::default();
        // Our visitor never fails, only the source could
        let _ = record.key_values().visit(&mut key_values);

        let severity = Severity::from_log_level(record.level(), key_values.critical);
        let mut log_record = LogRecord::new(
            severity,
            record.target(),
            record.args().to_string(),
            Origin::Legacy,
        );
        log_record.fields = key_values.fields;
        log_record.exception = key_values.exception;
        log_record.stack_info = key_values.stack_info;
        log_record
    }
}

impl log::Log for LegacyBridge {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.root.enabled(
            metadata.target(),
            Severity::from_log_level(metadata.level(), false),
        )
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            let _ = self.root.log(&Self::to_log_record(record));
        }
    }

    fn flush(&self) {}
}

#[derive(Debug, Default)]
struct KeyValues {
    fields: Map<String, Value>,
    exception: Option<ExceptionInfo>,
    stack_info: Option<String>,
    critical: bool,
}

impl<'kvs> VisitSource<'kvs> for KeyValues {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        match key.as_str() {
            keys::EXCEPTION => {
                self.exception = Some(match value.to_borrowed_error() {
                    Some(error) => ExceptionInfo::capture(error),
                    None => ExceptionInfo::from_message(value.to_string()),
                });
            }
            keys::STACK_INFO => {
                if value.to_bool() == Some(true) {
                    self.stack_info = Some(capture_stack());
                }
            }
            keys::CRITICAL => self.critical = value.to_bool() == Some(true),
            key if keys::RESERVED_KEYS.contains(key) => {
                tracing::warn!(
                    "Attempting to log a reserved key `{key}` (value: {value}) as context. \
                     Skipping."
                );
            }
            key => {
                self.fields.insert(key.to_owned(), to_json(&value));
            }
        }
        Ok(())
    }
}

fn to_json(value: &kv::Value<'_>) -> Value {
    if let Some(boolean) = value.to_bool() {
        Value::from(boolean)
    } else if let Some(integer) = value.to_i64() {
        Value::from(integer)
    } else if let Some(integer) = value.to_u64() {
        Value::from(integer)
    } else if let Some(float) = value.to_f64() {
        Value::from(float)
    } else if let Some(string) = value.to_borrowed_str() {
        Value::from(string)
    } else {
        Value::from(value.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use log::Log;
    use serde_json::json;

    use super::*;
    use crate::{LoggingConfig, configure, test_utils::SharedBuffer};

    fn bridge(buffer: &SharedBuffer) -> LegacyBridge {
        let root = Arc::new(RootLogger::new());
        configure(&root, LoggingConfig::default(), buffer.clone()).unwrap();
        LegacyBridge::new(root)
    }

    fn emit(
        bridge: &LegacyBridge,
        level: log::Level,
        target: &str,
        args: std::fmt::Arguments<'_>,
    ) {
        bridge.log(
            &log::Record::builder()
                .level(level)
                .target(target)
                .args(args)
                .build(),
        );
    }

    #[test]
    fn records_at_or_above_info_become_one_line_each() {
        let buffer = SharedBuffer::default();
        let bridge = bridge(&buffer);

        for (level, args) in [
            (log::Level::Info, format_args!("info {}", "inf")),
            (log::Level::Debug, format_args!("debug {}", "deb")),
            (log::Level::Error, format_args!("error {}", "err")),
        ] {
            emit(&bridge, level, "test_log_1", args);
        }

        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            json!({"event": "info inf", "level": "info", "logger": "test_log_1"})
        );
        assert_eq!(lines[1]["event"], "error err");
        assert_eq!(lines[1]["level"], "error");
    }

    #[test]
    fn key_values_become_context_and_exception() {
        let err = std::io::Error::other("whatever");
        let key_values: [(&str, kv::Value<'_>); 4] = [
            ("exception", kv::Value::from_dyn_error(&err)),
            ("attempt", kv::Value::from(3_u64)),
            ("user", kv::Value::from("alice")),
            ("level", kv::Value::from("fake")),
        ];

        let record = LegacyBridge::to_log_record(
            &log::Record::builder()
                .level(log::Level::Error)
                .target("test_log_1")
                .args(format_args!("exception {}", "exc"))
                .key_values(&key_values)
                .build(),
        );

        assert_eq!(record.event, "exception exc");
        assert_eq!(record.severity, Severity::Error);
        assert_eq!(
            Value::Object(record.fields),
            json!({"attempt": 3, "user": "alice"})
        );
        assert_eq!(record.exception.unwrap().message(), "whatever");
    }

    #[test]
    fn exception_lines_carry_a_traceback() {
        let buffer = SharedBuffer::default();
        let bridge = bridge(&buffer);
        let err = std::io::Error::other("whatever");
        let key_values = [("exception", kv::Value::from_dyn_error(&err))];

        bridge.log(
            &log::Record::builder()
                .level(log::Level::Error)
                .target("test_log_1")
                .args(format_args!("exception {}", "exc"))
                .key_values(&key_values)
                .build(),
        );

        let lines = buffer.json_lines();
        assert_eq!(lines[0]["event"], "exception exc");
        assert!(lines[0]["exception"].as_str().unwrap().contains("Traceback"));
    }

    #[test]
    fn stack_info_renders_the_call_site_stack() {
        let buffer = SharedBuffer::default();
        let bridge = bridge(&buffer);
        let requested = [("stack_info", kv::Value::from(true))];
        let declined = [("stack_info", kv::Value::from(false))];

        for key_values in [&requested, &declined] {
            bridge.log(
                &log::Record::builder()
                    .level(log::Level::Info)
                    .target("test_log_1")
                    .args(format_args!("where am I"))
                    .key_values(key_values)
                    .build(),
            );
        }

        let lines = buffer.json_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0]["stack_info"].as_str().unwrap().starts_with("Stack:\n"));
        assert_eq!(
            lines[1],
            json!({"event": "where am I", "level": "info", "logger": "test_log_1"})
        );
    }

    #[test]
    fn critical_flag_raises_errors_to_critical() {
        let key_values = [("critical", kv::Value::from(true))];
        let record = LegacyBridge::to_log_record(
            &log::Record::builder()
                .level(log::Level::Error)
                .args(format_args!("disk full"))
                .key_values(&key_values)
                .build(),
        );

        assert_eq!(record.severity, Severity::Critical);
        assert!(record.fields.is_empty());
    }

    #[test]
    fn noisy_loggers_are_filtered_by_the_bridge() {
        let buffer = SharedBuffer::default();
        let bridge = bridge(&buffer);

        emit(
            &bridge,
            log::Level::Info,
            "aws_smithy_runtime::client",
            format_args!("sending request"),
        );

        assert!(buffer.contents().is_empty());
        assert!(!bridge.enabled(
            &log::Metadata::builder()
                .level(log::Level::Info)
                .target("aws_smithy_runtime")
                .build()
        ));
    }
}
