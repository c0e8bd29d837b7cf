//! The processing chain: ordered transformations applied to a [`LogRecord`] before rendering.

use std::fmt;

use serde_json::Value;
use time::format_description::well_known::Iso8601;

use super::{LogRecord, keys, root::SeverityFilter};

/// What the chain should do with a record after a [`Processor`] ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Hand the record to the next processor.
    Continue,

    /// Discard the record; later processors and the sinks never see it.
    Drop,
}

/// A single step of a [`ProcessingChain`].
pub trait Processor: fmt::Debug + Send + Sync {
    /// Enriches or reshapes the record in place.
    fn process(&self, record: &mut LogRecord) -> Outcome;
}

/// Adds the lowercase severity name as the `level` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddLogLevel;

impl Processor for AddLogLevel {
    fn process(&self, record: &mut LogRecord) -> Outcome {
        record
            .fields
            .insert(keys::LEVEL.to_owned(), Value::from(record.severity.as_str()));
        Outcome::Continue
    }
}

/// Adds the emitting logger's name as the `logger` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddLoggerName;

impl Processor for AddLoggerName {
    fn process(&self, record: &mut LogRecord) -> Outcome {
        record
            .fields
            .insert(keys::LOGGER.to_owned(), Value::from(record.logger.as_str()));
        Outcome::Continue
    }
}

/// Moves an explicitly requested stack capture into the `stack_info` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct StackInfoRenderer;

impl Processor for StackInfoRenderer {
    fn process(&self, record: &mut LogRecord) -> Outcome {
        if let Some(stack) = record.stack_info.take() {
            record
                .fields
                .insert(keys::STACK_INFO.to_owned(), Value::from(stack));
        }
        Outcome::Continue
    }
}

/// Renders exception information (message, causes and traceback) into the `exception` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormatExceptionInfo;

impl Processor for FormatExceptionInfo {
    fn process(&self, record: &mut LogRecord) -> Outcome {
        if let Some(exception) = record.exception.take() {
            record
                .fields
                .insert(keys::EXCEPTION.to_owned(), Value::from(exception.to_string()));
        }
        Outcome::Continue
    }
}

/// Adds the current UTC time in ISO 8601 format as the `timestamp` field.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddTimestamp;

impl Processor for AddTimestamp {
    fn process(&self, record: &mut LogRecord) -> Outcome {
        if let Ok(time) = time::UtcDateTime::now().format(&Iso8601::DEFAULT) {
            record
                .fields
                .insert(keys::TIMESTAMP.to_owned(), Value::from(time));
        }
        Outcome::Continue
    }
}

/// Drops records below the minimum severity configured for their logger.
#[derive(Clone, Debug)]
pub struct FilterByLevel {
    filter: SeverityFilter,
}

impl FilterByLevel {
    /// Creates a processor consulting the given filter, usually [`RootLogger::filter`].
    ///
    /// [`RootLogger::filter`]: crate::RootLogger::filter
    pub fn new(filter: SeverityFilter) -> Self {
        Self { filter }
    }
}

impl Processor for FilterByLevel {
    fn process(&self, record: &mut LogRecord) -> Outcome {
        if self.filter.would_enable(&record.logger, record.severity) {
            Outcome::Continue
        } else {
            Outcome::Drop
        }
    }
}

/// An ordered sequence of [`Processor`]s.
#[derive(Debug, Default)]
pub struct ProcessingChain {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessingChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// The chain every record goes through: optional timestamp, then level, logger name,
    /// stack info and exception info, in that order.
    pub fn base(timestamp: bool) -> Self {
        let chain = if timestamp {
            Self::new().with(AddTimestamp)
        } else {
            Self::new()
        };

        chain
            .with(AddLogLevel)
            .with(AddLoggerName)
            .with(StackInfoRenderer)
            .with(FormatExceptionInfo)
    }

    /// Appends a processor to the end of the chain.
    pub fn with(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    /// Appends all processors of another chain, keeping their order.
    pub fn then(mut self, other: Self) -> Self {
        self.processors.extend(other.processors);
        self
    }

    /// Runs the processors in order, stopping at the first one that drops the record.
    pub fn run(&self, record: &mut LogRecord) -> Outcome {
        for processor in &self.processors {
            if processor.process(record) == Outcome::Drop {
                return Outcome::Drop;
            }
        }
        Outcome::Continue
    }

    /// Number of processors in the chain.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Whether the chain has no processors.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
