//! Event publishing: sink capability and fan-out
//!
//! A [`Sink`] is one downstream delivery target. [`Fanout`] delivers each
//! event to every configured sink independently, reporting how many accepted
//! it alongside a joined error for the ones that did not. The fan-out knows
//! nothing about sink types; those live behind the builder registry.

pub mod registry;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, PublishError};
use crate::models::Event;

pub use registry::{SinkConfig, SinkRegistry};
pub use webhook::WebhookSink;

/// Sends events to one downstream target (webhook, queue, ...)
#[async_trait]
pub trait Sink: Send + Sync {
    /// Unique sink identifier from configuration
    fn id(&self) -> &str;

    /// Sink type tag ("http", ...)
    fn kind(&self) -> &str;

    /// Deliver one event
    async fn publish(&self, event: &Event) -> Result<(), PublishError>;
}

impl std::fmt::Debug for dyn Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Dispatches events to all configured sinks
pub struct Fanout {
    sinks: Vec<Arc<dyn Sink>>,
}

impl Fanout {
    /// Build a dispatcher over the given sinks
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        Self { sinks }
    }

    /// Forward the event to every registered sink
    ///
    /// Returns the number of sinks that accepted the event and, when any
    /// failed, one joined error naming each failing sink. Zero configured
    /// sinks is valid and yields `(0, None)`.
    pub async fn publish(&self, event: &Event) -> (usize, Option<Error>) {
        let mut delivered = 0;
        let mut errors = Vec::new();

        for sink in &self.sinks {
            match sink.publish(event).await {
                Ok(()) => delivered += 1,
                Err(err) => errors.push(Error::Sink {
                    kind: sink.kind().to_string(),
                    sink_id: sink.id().to_string(),
                    source: Box::new(err),
                }),
            }
        }

        (delivered, Error::join(errors))
    }

    /// Number of active sinks, for observability
    pub fn size(&self) -> usize {
        self.sinks.len()
    }
}
