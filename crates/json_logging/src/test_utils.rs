use std::sync::Arc;

use tracing_subscriber::{Registry, layer::SubscriberExt};

use crate::{ProcessingChain, RootLogger, StructuredLayer};

#[path = "../tests/common.rs"]
mod common;

pub(crate) use common::SharedBuffer;

/// A subscriber routing `tracing` events to `root`, for use with
/// [`tracing::subscriber::with_default`].
pub(crate) fn subscriber(root: &Arc<RootLogger>) -> impl tracing::Subscriber + Send + Sync {
    Registry::default().with(StructuredLayer::new(
        Arc::clone(root),
        ProcessingChain::base(false),
    ))
}
