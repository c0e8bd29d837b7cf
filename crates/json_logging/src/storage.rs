//! Captures the fields of `tracing` events and spans into a form a [`LogRecord`] can be built
//! from.

use std::{error::Error, fmt};

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};

use super::{ExceptionInfo, LogRecord, Origin, Severity, keys, record::capture_stack};

/// Holds key-value data recorded for a span or an event.
///
/// Spans keep one in their extensions, so that events emitted inside them inherit the context.
#[derive(Clone, Debug, Default)]
pub(crate) struct Storage {
    /// The collected context fields.
    values: Map<String, Value>,

    /// The primary message of an event, if captured.
    message: Option<String>,

    /// An error recorded under the `exception` key.
    exception: Option<ExceptionInfo>,

    /// The call-site stack, rendered when `stack_info = true` is recorded.
    stack_info: Option<String>,

    /// Whether `critical = true` was recorded.
    critical: bool,
}

impl Storage {
    /// Records a context value, skipping (with a warning) keys owned by the processing chain.
    pub(crate) fn record_value(&mut self, key: &str, value: Value) {
        if keys::RESERVED_KEYS.contains(key) {
            tracing::warn!(
                "Attempting to log a reserved key `{key}` (value: {value:?}) as context. Skipping."
            );
        } else {
            self.values.insert(key.to_owned(), value);
        }
    }

    pub(crate) fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub(crate) fn is_critical(&self) -> bool {
        self.critical
    }

    /// Fills in the values of `parent` that this storage does not set itself.
    pub(crate) fn inherit(&mut self, parent: &Map<String, Value>) {
        for (key, value) in parent {
            if !self.values.contains_key(key) {
                self.values.insert(key.clone(), value.clone());
            }
        }
    }

    /// Overwrites values with the ones recorded later on the same span.
    pub(crate) fn update(&mut self, recorded: Self) {
        self.values.extend(recorded.values);
    }

    /// Builds a structured record from the captured fields.
    ///
    /// Without a message, the logger name is used as the event, like events without one do in
    /// `tracing`'s own formatters.
    pub(crate) fn into_record(self, severity: Severity, logger: &str) -> LogRecord {
        let event = self.message.unwrap_or_else(|| logger.to_owned());
        let mut record = LogRecord::new(severity, logger, event, Origin::Structured);
        record.fields = self.values;
        record.exception = self.exception;
        record.stack_info = self.stack_info;
        record
    }

    fn record_flag(&mut self, field: &Field, value: bool) -> bool {
        match field.name() {
            keys::STACK_INFO => {
                if value {
                    self.stack_info = Some(capture_stack());
                }
                true
            }
            keys::CRITICAL => {
                self.critical = value;
                true
            }
            _ => false,
        }
    }

    fn record_field(&mut self, field: &Field, value: Value) {
        if field.name() == keys::MESSAGE {
            if self.message.is_none() {
                self.message = Some(value.to_string());
            }
        } else {
            self.record_value(field_name(field), value);
        }
    }
}

/// The field name, without the `r#` prefix of raw identifiers.
fn field_name(field: &Field) -> &'static str {
    let name = field.name();
    name.strip_prefix("r#").unwrap_or(name)
}

// Implement `Visit` to capture span or event fields into the `Storage` map.
impl Visit for Storage {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record_field(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_field(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record_field(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if !self.record_flag(field, value) {
            self.record_field(field, Value::from(value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == keys::MESSAGE {
            self.message = Some(value.to_string()); // `record_str()` is preferred for `message`
        } else {
            self.record_value(field_name(field), Value::from(value));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if field.name() == keys::EXCEPTION {
            self.exception = Some(ExceptionInfo::capture(value));
        } else {
            self.record_field(field, Value::from(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == keys::MESSAGE {
            if self.message.is_none() {
                // Only use debug if `record_str()` hasn't set it
                self.message = Some(format!("{value:?}"));
            }
        } else if field.name() == keys::EXCEPTION {
            self.exception = Some(ExceptionInfo::from_message(format!("{value:?}")));
        } else {
            self.record_value(field_name(field), Value::from(format!("{value:?}")));
        }
    }
}
