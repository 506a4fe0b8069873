//! Per-provider pipeline: fetch → filter → enrich → publish → mark
//!
//! One `process` call runs the whole pipeline for one provider, strictly in
//! sequence. Dedupe lookups fail open (a cache outage must not drop fresh
//! content) and dedupe marks fail soft (a missed mark risks one future
//! duplicate, which is the accepted lesser failure). Per-article publish
//! failures are collected and joined, never fail-fast.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::crawler::enricher::PageEnricher;
use crate::error::{Error, Result};
use crate::models::{Article, Event};
use crate::providers::{FetcherRegistry, Provider};
use crate::publisher::Fanout;
use crate::storage::DedupeStore;

/// Runs the full pipeline for one provider at a time
pub struct ProviderProcessor {
    registry: Arc<FetcherRegistry>,
    enricher: Option<Arc<PageEnricher>>,
    fanout: Arc<Fanout>,
    store: Option<Arc<dyn DedupeStore>>,
}

impl ProviderProcessor {
    pub fn new(
        registry: Arc<FetcherRegistry>,
        enricher: Option<Arc<PageEnricher>>,
        fanout: Arc<Fanout>,
        store: Option<Arc<dyn DedupeStore>>,
    ) -> Self {
        Self {
            registry,
            enricher,
            fanout,
            store,
        }
    }

    /// Fetch, filter, enrich and publish articles for one provider
    pub async fn process(
        &self,
        token: &CancellationToken,
        provider: &Provider,
        worker_id: usize,
    ) -> Result<()> {
        let start = Instant::now();

        let fetcher = self
            .registry
            .fetcher_for(provider)
            .map_err(|e| Error::for_provider(&provider.id, e.into()))?;

        let mut articles = fetcher
            .fetch(provider)
            .await
            .map_err(|e| Error::for_provider(&provider.id, e.into()))?;

        let fetched_count = articles.len();
        if self.store.is_some() && fetched_count > 0 {
            articles = self.filter_new_articles(provider, articles);
        }

        if let Some(enricher) = &self.enricher {
            articles = enricher.enrich(token, provider, articles).await;
        }

        if articles.is_empty() {
            tracing::info!(
                worker_id,
                provider_id = %provider.id,
                articles_fetched = fetched_count,
                articles_fresh = 0,
                articles_published = 0,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "provider crawl completed"
            );
            return Ok(());
        }

        let fresh_count = articles.len();
        let (published, publish_err) = self.publish_articles(provider, articles).await;

        tracing::info!(
            worker_id,
            provider_id = %provider.id,
            articles_fetched = fetched_count,
            articles_fresh = fresh_count,
            articles_published = published,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "provider crawl completed"
        );

        match publish_err {
            Some(err) => Err(Error::for_provider(&provider.id, err)),
            None => Ok(()),
        }
    }

    /// Publish each article, returning the count accepted by at least one
    /// sink and the joined per-article errors
    async fn publish_articles(
        &self,
        provider: &Provider,
        articles: Vec<Article>,
    ) -> (usize, Option<Error>) {
        let mut errors = Vec::new();
        let mut published = 0;

        for article in articles {
            let article_id = article.id.clone();
            let event = Event::new(&provider.id, &provider.name, article);
            let (delivered, err) = self.fanout.publish(&event).await;

            if let Some(err) = err {
                tracing::error!(
                    provider_id = %provider.id,
                    article_id = %article_id,
                    error = %err,
                    "failed to publish article"
                );
                errors.push(Error::for_article(&article_id, err));
            }

            // marked seen only when at least one sink accepted it; a fully
            // failed fan-out leaves the article eligible for the next pass
            if delivered > 0 {
                published += 1;
                if let Some(store) = &self.store {
                    if let Err(mark_err) = store.mark_article(&article_id) {
                        tracing::error!(
                            provider_id = %provider.id,
                            article_id = %article_id,
                            error = %mark_err,
                            "failed to cache published article"
                        );
                    }
                }
            }
        }

        (published, Error::join(errors))
    }

    /// Drop articles the dedupe store already knows, preserving fetch order
    fn filter_new_articles(&self, provider: &Provider, articles: Vec<Article>) -> Vec<Article> {
        let Some(store) = &self.store else {
            return articles;
        };

        let mut fresh = Vec::with_capacity(articles.len());
        for article in articles {
            match store.seen_article(&article.id) {
                Err(err) => {
                    tracing::error!(
                        provider_id = %provider.id,
                        article_id = %article.id,
                        error = %err,
                        "dedupe lookup failed"
                    );
                    fresh.push(article);
                }
                Ok(true) => {
                    tracing::debug!(
                        provider_id = %provider.id,
                        article_id = %article.id,
                        "article skipped (already published)"
                    );
                }
                Ok(false) => fresh.push(article),
            }
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{FetchError, PublishError, StoreError};
    use crate::providers::Fetcher;
    use crate::publisher::Sink;

    struct FixedFetcher {
        articles: Vec<Article>,
    }

    #[async_trait]
    impl Fetcher for FixedFetcher {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _provider: &Provider) -> std::result::Result<Vec<Article>, FetchError> {
            Ok(self.articles.clone())
        }
    }

    struct RecordingSink {
        published: Mutex<Vec<String>>,
        fail_ids: HashSet<String>,
    }

    impl RecordingSink {
        fn new(fail_ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                published: Mutex::new(Vec::new()),
                fail_ids: fail_ids.iter().map(|s| s.to_string()).collect(),
            })
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        fn id(&self) -> &str {
            "rec"
        }

        fn kind(&self) -> &str {
            "stub"
        }

        async fn publish(&self, event: &Event) -> std::result::Result<(), PublishError> {
            if self.fail_ids.contains(&event.article.id) {
                return Err(PublishError::Status {
                    status: 500,
                    snippet: "down".into(),
                });
            }
            self.published.lock().unwrap().push(event.article.id.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        seen: Mutex<HashSet<String>>,
        fail_lookups: bool,
    }

    impl DedupeStore for MemoryStore {
        fn seen_article(&self, id: &str) -> std::result::Result<bool, StoreError> {
            if self.fail_lookups {
                return Err(StoreError::Closed);
            }
            Ok(self.seen.lock().unwrap().contains(id))
        }

        fn mark_article(&self, id: &str) -> std::result::Result<(), StoreError> {
            self.seen.lock().unwrap().insert(id.to_string());
            Ok(())
        }

        fn close(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    fn provider() -> Provider {
        Provider {
            id: "prov".into(),
            name: "Prov".into(),
            kind: "fixed-type".into(),
            source_url: "https://example.com/feed".into(),
            response_format: "xml".into(),
            ..Default::default()
        }
    }

    fn article(id: &str) -> Article {
        Article {
            id: id.into(),
            url: format!("https://example.com/{id}"),
            provider_id: "prov".into(),
            ..Default::default()
        }
    }

    fn registry_with(articles: Vec<Article>) -> Arc<FetcherRegistry> {
        let mut registry = FetcherRegistry::new();
        registry.register_for_type("fixed-type", Arc::new(FixedFetcher { articles }));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn publishes_only_unseen_articles_and_marks_them() {
        let store = Arc::new(MemoryStore::default());
        store.mark_article("a1").unwrap();

        let sink = RecordingSink::new(&[]);
        let processor = ProviderProcessor::new(
            registry_with(vec![article("a1"), article("a2")]),
            None,
            Arc::new(Fanout::new(vec![sink.clone()])),
            Some(store.clone()),
        );

        processor
            .process(&CancellationToken::new(), &provider(), 0)
            .await
            .unwrap();

        assert_eq!(*sink.published.lock().unwrap(), vec!["a2".to_string()]);
        assert!(store.seen_article("a2").unwrap(), "a2 marked after publish");
    }

    #[tokio::test]
    async fn publish_failure_is_joined_and_does_not_stop_the_batch() {
        let store = Arc::new(MemoryStore::default());
        let sink = RecordingSink::new(&["a1"]);
        let processor = ProviderProcessor::new(
            registry_with(vec![article("a1"), article("a2")]),
            None,
            Arc::new(Fanout::new(vec![sink.clone()])),
            Some(store.clone()),
        );

        let err = processor
            .process(&CancellationToken::new(), &provider(), 0)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("article a1"));
        assert_eq!(*sink.published.lock().unwrap(), vec!["a2".to_string()]);
        assert!(!store.seen_article("a1").unwrap(), "failed publish not marked");
        assert!(store.seen_article("a2").unwrap());
    }

    #[tokio::test]
    async fn dedupe_lookup_failures_fail_open() {
        let store = Arc::new(MemoryStore {
            fail_lookups: true,
            ..Default::default()
        });
        let sink = RecordingSink::new(&[]);
        let processor = ProviderProcessor::new(
            registry_with(vec![article("a1")]),
            None,
            Arc::new(Fanout::new(vec![sink.clone()])),
            Some(store),
        );

        processor
            .process(&CancellationToken::new(), &provider(), 0)
            .await
            .unwrap();
        assert_eq!(*sink.published.lock().unwrap(), vec!["a1".to_string()]);
    }

    #[tokio::test]
    async fn empty_result_after_filtering_is_success() {
        let store = Arc::new(MemoryStore::default());
        store.mark_article("a1").unwrap();

        let sink = RecordingSink::new(&[]);
        let processor = ProviderProcessor::new(
            registry_with(vec![article("a1")]),
            None,
            Arc::new(Fanout::new(vec![sink.clone()])),
            Some(store),
        );

        processor
            .process(&CancellationToken::new(), &provider(), 0)
            .await
            .unwrap();
        assert!(sink.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_fetcher_is_an_error() {
        let processor = ProviderProcessor::new(
            Arc::new(FetcherRegistry::new()),
            None,
            Arc::new(Fanout::new(Vec::new())),
            None,
        );

        let err = processor
            .process(&CancellationToken::new(), &provider(), 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no fetcher registered"));
    }

    #[tokio::test]
    async fn fully_failed_fanout_leaves_article_unmarked() {
        let store = Arc::new(MemoryStore::default());
        let sink = RecordingSink::new(&["a1"]);
        let processor = ProviderProcessor::new(
            registry_with(vec![article("a1")]),
            None,
            Arc::new(Fanout::new(vec![sink])),
            Some(store.clone()),
        );

        let err = processor
            .process(&CancellationToken::new(), &provider(), 0)
            .await;
        assert!(err.is_err());
        assert!(!store.seen_article("a1").unwrap());
    }
}
