//! Harvester runtime: wiring and the crawl loop
//!
//! Builds the pipeline out of configuration (provider registry, sink
//! registry, dedupe store, enricher, crawl service) and runs one pass
//! immediately, then one per interval, until cancelled. Pass-level errors are
//! logged and the loop proceeds to the next tick; they never stop the
//! process.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::crawler::{CrawlService, HttpPageClient, PageEnricher, ProviderProcessor};
use crate::error::{Error, Result};
use crate::providers::{FetcherRegistry, ProviderRegistry};
use crate::publisher::{registry::load_sink_configs, Fanout, SinkRegistry};
use crate::storage::{new_store, DedupeStore, StoreOptions};

/// The assembled harvesting runtime
pub struct Harvester {
    providers: ProviderRegistry,
    service: CrawlService,
    store: Arc<dyn DedupeStore>,
    fanout_size: usize,
    crawl_interval: std::time::Duration,
}

impl Harvester {
    /// Wire the full pipeline from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let providers = ProviderRegistry::load(&config.providers_file)?;
        let provider_ids: Vec<&str> = providers.all().iter().map(|p| p.id.as_str()).collect();
        tracing::info!(count = provider_ids.len(), ids = ?provider_ids, "providers registry loaded");

        let sink_configs = load_sink_configs(&config.sinks_file)?;
        let sinks = SinkRegistry::with_defaults().build_all(&sink_configs)?;
        if sinks.is_empty() {
            return Err(Error::config("no sinks configured"));
        }
        tracing::info!(count = sinks.len(), "sink registry loaded");
        let fanout = Arc::new(Fanout::new(sinks));
        let fanout_size = fanout.size();

        let store = new_store(
            &config.storage_type,
            &config.sqlite_path,
            StoreOptions {
                article_ttl: config.article_ttl,
                cleanup_interval: config.cleanup_interval,
            },
        )?;
        tracing::info!(
            storage_type = %config.storage_type,
            path = %config.sqlite_path.display(),
            article_ttl_secs = config.article_ttl.as_secs(),
            cleanup_interval_secs = config.cleanup_interval.as_secs(),
            "storage initialized"
        );

        let fetchers = Arc::new(FetcherRegistry::with_defaults(config.request_timeout)?);
        let enricher = Arc::new(PageEnricher::new(Arc::new(HttpPageClient::new(
            config.request_timeout,
        )?)));

        let processor = Arc::new(ProviderProcessor::new(
            fetchers,
            Some(enricher),
            fanout,
            Some(Arc::clone(&store)),
        ));

        Ok(Self {
            providers,
            service: CrawlService::new(processor),
            store,
            fanout_size,
            crawl_interval: config.crawl_interval,
        })
    }

    /// Run the crawl loop until the token is cancelled
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        let providers = self.providers.all();
        if providers.is_empty() {
            tracing::warn!("no providers configured; harvester idle");
            token.cancelled().await;
            self.close_store();
            return Ok(());
        }

        tracing::info!(
            providers_count = providers.len(),
            sinks_count = self.fanout_size,
            crawl_interval_secs = self.crawl_interval.as_secs(),
            "harvester loop starting"
        );

        self.run_once(&token, providers).await;

        let mut ticker = tokio::time::interval(self.crawl_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await; // the immediate first tick was the pass above

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("harvester loop exiting");
                    self.close_store();
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.run_once(&token, providers).await;
                }
            }
        }
    }

    /// Run a single pass; pass failures are logged, never fatal
    pub async fn run_once(&self, token: &CancellationToken, providers: &[crate::providers::Provider]) {
        let start = std::time::Instant::now();
        tracing::info!(providers_count = providers.len(), "crawl started");

        match self.service.run(token, providers).await {
            Ok(()) => tracing::info!(
                providers_count = providers.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "crawl completed"
            ),
            Err(err) => tracing::error!(error = %err, "crawl finished with errors"),
        }
    }

    /// Providers loaded at startup
    pub fn providers(&self) -> &[crate::providers::Provider] {
        self.providers.all()
    }

    fn close_store(&self) {
        if let Err(err) = self.store.close() {
            tracing::error!(error = %err, "storage close failed");
        }
    }

    /// Close the backing store (used by one-shot runs)
    pub fn shutdown(&self) {
        self.close_store();
    }
}
