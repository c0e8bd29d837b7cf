//! Provides the [`Sink`] abstraction and [`JsonSink`], which renders [`LogRecord`]s as one JSON
//! object per line.

use std::{borrow::Cow, collections::HashMap, fmt, io::Write};

use serde::ser::{SerializeMap, Serializer};
use serde_json::{Value, ser::Formatter};
use tracing_subscriber::fmt::MakeWriter;

use super::{LogRecord, LoggerError, Origin, Outcome, ProcessingChain, keys};

/// A destination for finalized log records, attached to a [`RootLogger`](crate::RootLogger).
pub trait Sink: fmt::Debug + Send + Sync {
    /// Writes a record to the destination.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError`] if the record could not be serialized or written.
    fn emit(&self, record: &LogRecord) -> Result<(), LoggerError>;
}

/// Configuration for creating a [`JsonSink`].
#[derive(Debug, Default)]
pub struct JsonSinkConfig {
    /// A map of key-value pairs that are statically defined at initialization and included at the
    /// top level of every log entry.
    pub static_top_level_fields: HashMap<String, Value>,

    /// Processors run on records of the legacy [`log`] API before rendering. Records of the
    /// [`tracing`] API have already been processed by the [`StructuredLayer`].
    ///
    /// [`StructuredLayer`]: crate::StructuredLayer
    pub foreign_pre_chain: ProcessingChain,
}

/// A [`Sink`] rendering each record as a JSON object followed by a newline.
///
/// The object starts with `event`, followed by the static top-level fields and the record's
/// fields. It requires a [`MakeWriter`] to determine the output destination and a
/// [`serde_json::ser::Formatter`] to control the JSON output style (compact or pretty-printed).
pub struct JsonSink<W, F> {
    dst_writer: W,
    formatter: F,
    static_top_level_fields: HashMap<String, Value>,
    foreign_pre_chain: ProcessingChain,
}

impl<W, F> fmt::Debug for JsonSink<W, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSink")
            .field("static_top_level_fields", &self.static_top_level_fields)
            .field("foreign_pre_chain", &self.foreign_pre_chain)
            .finish_non_exhaustive()
    }
}

impl<W, F> JsonSink<W, F>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    F: Formatter + Clone + Send + Sync + 'static,
{
    /// Creates a new [`JsonSink`] with the specified configuration, writer and formatter.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::Configuration`] if a static top-level field uses a reserved key.
    pub fn new(config: JsonSinkConfig, dst_writer: W, formatter: F) -> Result<Self, LoggerError> {
        for key in config.static_top_level_fields.keys() {
            if keys::RESERVED_KEYS.contains(key.as_str()) {
                return Err(LoggerError::Configuration(format!(
                    "A reserved key `{key}` was included in `static_top_level_fields` of the \
                     JSON sink"
                )));
            }
        }

        Ok(Self {
            dst_writer,
            formatter,
            static_top_level_fields: config.static_top_level_fields,
            foreign_pre_chain: config.foreign_pre_chain,
        })
    }

    /// Serializes a processed record into a memory buffer.
    fn serialize(&self, record: &LogRecord) -> Result<Vec<u8>, LoggerError> {
        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, self.formatter.clone());
        let mut map_serializer = serializer.serialize_map(None)?;

        map_serializer.serialize_entry(keys::EVENT, &record.event)?;

        for (key, value) in &self.static_top_level_fields {
            map_serializer.serialize_entry(key, value)?;
        }

        for (key, value) in record
            .fields
            .iter()
            .filter(|(key, _value)| !self.static_top_level_fields.contains_key(key.as_str()))
        {
            map_serializer.serialize_entry(key, value)?;
        }

        map_serializer.end()?;
        Ok(buffer)
    }

    /// Flush memory buffer into an output stream with a trailing newline.
    ///
    /// Should be done by a single `write_all` call to avoid fragmentation of log because of
    /// multithreading.
    fn flush(&self, mut buffer: Vec<u8>) -> Result<(), std::io::Error> {
        buffer.write_all(b"\n")?;
        self.dst_writer.make_writer().write_all(&buffer)
    }
}

impl<W, F> Sink for JsonSink<W, F>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    F: Formatter + Clone + Send + Sync + 'static,
{
    fn emit(&self, record: &LogRecord) -> Result<(), LoggerError> {
        let record = match record.origin {
            Origin::Structured => Cow::Borrowed(record),
            Origin::Legacy => {
                let mut record = record.clone();
                if self.foreign_pre_chain.run(&mut record) == Outcome::Drop {
                    return Ok(());
                }
                Cow::Owned(record)
            }
        };

        let serialized = self.serialize(&record)?;
        self.flush(serialized)?;
        Ok(())
    }
}
