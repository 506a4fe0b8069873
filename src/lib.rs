//! varta - News harvesting pipeline
//!
//! Crawls provider feeds, enriches articles with page metadata, drops
//! already-published ones, and fans the rest out to configured sinks.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Environment-driven configuration
//! - [`providers`] - Provider registry and feed fetchers
//! - [`crawler`] - Crawl scheduling, page enrichment, per-provider pipeline
//! - [`parser`] - HTML metadata extraction
//! - [`publisher`] - Sink fan-out and the sink type registry
//! - [`storage`] - TTL dedupe cache (SQLite)
//! - [`harvester`] - Wiring and the periodic run loop
//! - [`models`] - Core data structures
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use varta::config::Config;
//! use varta::harvester::Harvester;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let harvester = Harvester::new(&config)?;
//!     harvester.run(CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod harvester;
pub mod models;
pub mod parser;
pub mod providers;
pub mod publisher;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::CrawlService;
    pub use crate::error::{Error, FetchError, PublishError, Result, StoreError};
    pub use crate::harvester::Harvester;
    pub use crate::models::{Article, Event};
    pub use crate::providers::{Fetcher, Provider, ProviderRegistry};
    pub use crate::publisher::{Fanout, Sink, SinkRegistry};
    pub use crate::storage::DedupeStore;
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::{Article, Event};
