//! Article page enricher
//!
//! For a batch of articles from one provider, fetches each article's page and
//! overlays any title/description/image metadata found there. Work is spread
//! over a bounded worker pool, gated by a shared rate limiter honoring the
//! provider's request delay, and tolerates cancellation mid-batch: the output
//! always has the input's length, with untouched slots holding the originals.

use std::sync::Arc;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::crawler::client::{body_snippet, PageClient};
use crate::error::FetchError;
use crate::models::Article;
use crate::parser::{resolve_url, MetaSelectors};
use crate::providers::Provider;

/// Page bodies larger than this are truncated before parsing
const MAX_HTML_BODY_BYTES: usize = 1 << 20;

/// Upper bound on concurrent page fetches within one batch
const MAX_ARTICLE_WORKERS: usize = 10;

/// Leading bytes of an error response kept for diagnostics
const ERROR_SNIPPET_BYTES: usize = 1024;

type DelayLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Fetches article pages and overlays discovered metadata
pub struct PageEnricher {
    client: Arc<dyn PageClient>,
    selectors: MetaSelectors,
}

impl PageEnricher {
    pub fn new(client: Arc<dyn PageClient>) -> Self {
        Self {
            client,
            selectors: MetaSelectors::new(),
        }
    }

    /// Enrich a batch of one provider's articles
    ///
    /// Per-article failures keep the original article in its slot and log a
    /// warning; the batch never shrinks. On cancellation, slots whose fetch
    /// had not started are returned as-is and no further pages are fetched.
    pub async fn enrich(
        self: &Arc<Self>,
        token: &CancellationToken,
        provider: &Provider,
        articles: Vec<Article>,
    ) -> Vec<Article> {
        let mut out = articles.clone();
        if articles.is_empty() {
            return out;
        }

        let worker_count = articles.len().min(MAX_ARTICLE_WORKERS);
        let limiter: Option<Arc<DelayLimiter>> = Quota::with_period(provider.request_delay())
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        let (job_tx, job_rx) = mpsc::channel::<usize>(worker_count);
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, Article)>(articles.len());
        let job_rx = Arc::new(Mutex::new(job_rx));
        let input = Arc::new(articles);

        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let enricher = Arc::clone(self);
            let token = token.clone();
            let provider = provider.clone();
            let limiter = limiter.clone();
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let input = Arc::clone(&input);

            handles.push(tokio::spawn(async move {
                enricher
                    .article_worker(token, provider, limiter, job_rx, result_tx, input)
                    .await;
            }));
        }
        drop(result_tx);

        for idx in 0..input.len() {
            if token.is_cancelled() {
                break;
            }
            if job_tx.send(idx).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        for handle in handles {
            let _ = handle.await;
        }

        while let Some((idx, article)) = result_rx.recv().await {
            out[idx] = article;
        }

        out
    }

    async fn article_worker(
        &self,
        token: CancellationToken,
        provider: Provider,
        limiter: Option<Arc<DelayLimiter>>,
        job_rx: Arc<Mutex<mpsc::Receiver<usize>>>,
        result_tx: mpsc::Sender<(usize, Article)>,
        input: Arc<Vec<Article>>,
    ) {
        loop {
            if token.is_cancelled() {
                return;
            }

            let idx = { job_rx.lock().await.recv().await };
            let Some(idx) = idx else { return };

            if token.is_cancelled() {
                return;
            }

            if let Some(limiter) = &limiter {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = limiter.until_ready() => {}
                }
                if token.is_cancelled() {
                    return;
                }
            }

            let article = input[idx].clone();
            let enriched = match self.fetch_and_parse(&provider, &article).await {
                Ok(updated) => updated,
                Err(err) => {
                    tracing::warn!(
                        provider_id = %provider.id,
                        url = %article.url,
                        error = %err,
                        "article metadata scrape failed"
                    );
                    article
                }
            };
            let _ = result_tx.send((idx, enriched)).await;
        }
    }

    async fn fetch_and_parse(
        &self,
        provider: &Provider,
        article: &Article,
    ) -> Result<Article, FetchError> {
        let headers = provider.headers();

        tracing::debug!(
            provider_id = %provider.id,
            url = %article.url,
            "scraping article metadata"
        );

        let response = self.client.get(&article.url, &headers).await?;
        if response.status() != 200 {
            return Err(FetchError::Status {
                status: response.status(),
                snippet: body_snippet(response.body(), ERROR_SNIPPET_BYTES),
            });
        }

        let mut body = response.body();
        if body.len() > MAX_HTML_BODY_BYTES {
            tracing::debug!(
                provider_id = %provider.id,
                url = %article.url,
                original = body.len(),
                kept = MAX_HTML_BODY_BYTES,
                "html body truncated"
            );
            body = &body[..MAX_HTML_BODY_BYTES];
        }

        let text = String::from_utf8_lossy(body);
        let meta = self.selectors.extract(&text);

        let mut updated = article.clone();
        if !meta.title.is_empty() {
            updated.title = meta.title;
        }
        if !meta.description.is_empty() {
            updated.description = meta.description;
        }
        if !meta.image_url.is_empty() {
            updated.image_url = resolve_url(&meta.image_url, &article.url);
        }
        Ok(updated)
    }
}
