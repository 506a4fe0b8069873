//! Crawl scheduling: one pass over all configured providers
//!
//! [`CrawlService::run`] executes a single harvesting pass. Providers are
//! distributed to a bounded worker pool over a shared job queue; failures are
//! collected through a result channel sized to the provider count so workers
//! never block reporting them. Cancellation is observed at loop boundaries
//! only: an in-flight provider is allowed to finish, and not-yet-started ones
//! are skipped without being counted as failures.

pub mod client;
pub mod enricher;
pub mod processor;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::providers::Provider;

pub use client::{HttpPageClient, PageClient, PageResponse};
pub use enricher::PageEnricher;
pub use processor::ProviderProcessor;

/// Upper bound on concurrently processed providers
const MAX_PROVIDER_WORKERS: usize = 10;

/// Runs the per-provider pipeline across all providers, one pass at a time
pub struct CrawlService {
    processor: Arc<ProviderProcessor>,
}

impl CrawlService {
    pub fn new(processor: Arc<ProviderProcessor>) -> Self {
        Self { processor }
    }

    /// Execute one complete harvesting pass
    ///
    /// Returns a joined error combining every provider-level failure; a pass
    /// with some failing and some succeeding providers is informational for
    /// the caller, not fatal. Cancellation is never reported as an error.
    pub async fn run(&self, token: &CancellationToken, providers: &[Provider]) -> Result<()> {
        if providers.is_empty() {
            return Err(Error::config("no providers configured for crawling"));
        }

        let errors = self.run_all(token, providers).await;
        match Error::join(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_all(&self, token: &CancellationToken, providers: &[Provider]) -> Vec<Error> {
        let worker_count = providers.len().min(MAX_PROVIDER_WORKERS);

        let (job_tx, job_rx) = mpsc::channel::<Provider>(1);
        let (err_tx, mut err_rx) = mpsc::channel::<Error>(providers.len());
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let processor = Arc::clone(&self.processor);
            let token = token.clone();
            let job_rx = Arc::clone(&job_rx);
            let err_tx = err_tx.clone();

            handles.push(tokio::spawn(async move {
                provider_worker(processor, token, job_rx, err_tx, worker_id).await;
            }));
        }
        drop(err_tx);

        for provider in providers {
            if token.is_cancelled() {
                break;
            }
            if job_tx.send(provider.clone()).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        for handle in handles {
            let _ = handle.await;
        }

        let mut errors = Vec::new();
        while let Some(err) = err_rx.recv().await {
            errors.push(err);
        }
        errors
    }
}

async fn provider_worker(
    processor: Arc<ProviderProcessor>,
    token: CancellationToken,
    job_rx: Arc<Mutex<mpsc::Receiver<Provider>>>,
    err_tx: mpsc::Sender<Error>,
    worker_id: usize,
) {
    loop {
        let provider = { job_rx.lock().await.recv().await };
        let Some(provider) = provider else { return };

        // skipped units are not failures
        if token.is_cancelled() {
            return;
        }

        if let Err(err) = processor.process(&token, &provider, worker_id).await {
            tracing::error!(
                worker_id,
                provider_id = %provider.id,
                error = %err,
                "provider crawl failed"
            );
            let _ = err_tx.send(err).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use crate::error::FetchError;
    use crate::models::Article;
    use crate::providers::{Fetcher, FetcherRegistry};
    use crate::publisher::Fanout;

    struct FlakyFetcher {
        fail_providers: HashSet<String>,
        fetched: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn fetch(&self, provider: &Provider) -> std::result::Result<Vec<Article>, FetchError> {
            self.fetched.lock().unwrap().push(provider.id.clone());
            if self.fail_providers.contains(&provider.id) {
                return Err(FetchError::Status {
                    status: 503,
                    snippet: "unavailable".into(),
                });
            }
            Ok(Vec::new())
        }
    }

    fn provider(id: &str) -> Provider {
        Provider {
            id: id.into(),
            name: id.to_uppercase(),
            kind: "flaky-type".into(),
            source_url: "https://example.com/feed".into(),
            response_format: "xml".into(),
            ..Default::default()
        }
    }

    fn service(fetcher: Arc<FlakyFetcher>) -> CrawlService {
        let mut registry = FetcherRegistry::new();
        registry.register_for_type("flaky-type", fetcher);
        CrawlService::new(Arc::new(ProviderProcessor::new(
            Arc::new(registry),
            None,
            Arc::new(Fanout::new(Vec::new())),
            None,
        )))
    }

    #[tokio::test]
    async fn empty_provider_list_is_a_config_error() {
        let service = service(Arc::new(FlakyFetcher {
            fail_providers: HashSet::new(),
            fetched: StdMutex::new(Vec::new()),
        }));
        let err = service.run(&CancellationToken::new(), &[]).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn pass_aggregates_every_provider_failure() {
        let fetcher = Arc::new(FlakyFetcher {
            fail_providers: HashSet::from(["p2".to_string(), "p4".to_string()]),
            fetched: StdMutex::new(Vec::new()),
        });
        let service = service(fetcher.clone());

        let providers: Vec<Provider> = ["p1", "p2", "p3", "p4"].map(provider).to_vec();
        let err = service
            .run(&CancellationToken::new(), &providers)
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("provider p2"));
        assert!(msg.contains("provider p4"));
        assert!(!msg.contains("provider p1"));
        assert_eq!(fetcher.fetched.lock().unwrap().len(), 4, "all dispatched");
    }

    #[tokio::test]
    async fn clean_pass_returns_ok() {
        let service = service(Arc::new(FlakyFetcher {
            fail_providers: HashSet::new(),
            fetched: StdMutex::new(Vec::new()),
        }));
        let providers = vec![provider("p1"), provider("p2")];
        service
            .run(&CancellationToken::new(), &providers)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn pre_cancelled_pass_reports_no_errors() {
        let fetcher = Arc::new(FlakyFetcher {
            fail_providers: HashSet::from(["p1".to_string()]),
            fetched: StdMutex::new(Vec::new()),
        });
        let service = service(fetcher.clone());

        let token = CancellationToken::new();
        token.cancel();

        let providers = vec![provider("p1"), provider("p2")];
        service.run(&token, &providers).await.unwrap();
        assert!(
            fetcher.fetched.lock().unwrap().is_empty(),
            "no units started after cancellation"
        );
    }
}
