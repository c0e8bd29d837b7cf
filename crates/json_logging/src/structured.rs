//! Provides [`StructuredLayer`], the adapter routing [`tracing`] events to a [`RootLogger`].

use std::sync::Arc;

use tracing::{
    Event, Metadata, Subscriber,
    span::{Attributes, Id, Record},
    subscriber::Interest,
};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

use super::{FilterByLevel, Outcome, ProcessingChain, RootLogger, Severity, storage::Storage};

/// A [`tracing_subscriber::Layer`] turning `tracing` events into [`LogRecord`]s.
///
/// Every event is normalized into a record whose context holds the event's fields plus the
/// fields of its enclosing spans (the event's own fields take precedence). The record is then
/// run through the structured chain (the root's level filter followed by the given chain) and
/// handed to the root's sinks, fully processed.
///
/// Recording an error under the `exception` field attaches exception information:
///
/// ```
/// # let err = std::io::Error::other("whatever");
/// tracing::error!(
///     exception = &err as &(dyn std::error::Error + 'static),
///     some_value = "exc",
///     "exception"
/// );
/// ```
///
/// [`LogRecord`]: crate::LogRecord
#[derive(Debug)]
pub struct StructuredLayer {
    root: Arc<RootLogger>,
    chain: Arc<ProcessingChain>,
}

impl StructuredLayer {
    /// Creates a layer logging to `root`, processing records with `chain` after filtering them
    /// by the root's severity filter.
    ///
    /// The chain is assembled once here and shared by every event.
    pub fn new(root: Arc<RootLogger>, chain: ProcessingChain) -> Self {
        let chain = ProcessingChain::new()
            .with(FilterByLevel::new(root.filter()))
            .then(chain);

        Self {
            root,
            chain: Arc::new(chain),
        }
    }
}

impl<S> Layer<S> for StructuredLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The root's filter can change after callsites are registered
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata.is_span()
            || self.root.enabled(
                metadata.target(),
                Severity::from_level(*metadata.level(), false),
            )
    }

    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut storage = Storage::default();
        attrs.record(&mut storage);

        if let Some(parent_span) = span.parent() {
            if let Some(parent_storage) = parent_span.extensions().get::<Storage>() {
                storage.inherit(parent_storage.values());
            }
        }

        span.extensions_mut().insert(storage);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let mut recorded = Storage::default();
        values.record(&mut recorded);

        let mut extensions = span.extensions_mut();
        if let Some(storage) = extensions.get_mut::<Storage>() {
            storage.update(recorded);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut storage = Storage::default();
        event.record(&mut storage);

        if let Some(span) = ctx.event_span(event) {
            if let Some(span_storage) = span.extensions().get::<Storage>() {
                storage.inherit(span_storage.values());
            }
        }

        let metadata = event.metadata();
        let severity = Severity::from_level(*metadata.level(), storage.is_critical());
        let mut record = storage.into_record(severity, metadata.target());

        if self.chain.run(&mut record) == Outcome::Continue {
            let _ = self.root.log(&record);
        }
    }
}
