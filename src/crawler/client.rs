//! Page-fetch capability used by fetchers and the enricher
//!
//! The [`PageClient`] trait keeps HTTP behind a seam so tests can inject
//! canned transports, and so every component shares one tuned reqwest client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::error::FetchError;

/// A minimal HTTP response: status plus the full body
#[derive(Debug, Clone)]
pub struct PageResponse {
    status: u16,
    body: Bytes,
}

impl PageResponse {
    pub fn new(status: u16, body: Bytes) -> Self {
        Self { status, body }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Abstraction over HTTP GETs so callers can inject mocks or other transports
#[async_trait]
pub trait PageClient: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<PageResponse, FetchError>;
}

/// reqwest-backed [`PageClient`] with a fixed per-request timeout
pub struct HttpPageClient {
    client: Client,
}

impl HttpPageClient {
    /// Build a client with the given per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the underlying client cannot be created
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageClient for HttpPageClient {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<PageResponse, FetchError> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(PageResponse::new(status, body))
    }
}

/// First portion of a response body, trimmed, for error diagnostics
pub(crate) fn body_snippet(body: &[u8], max_len: usize) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    let mut end = max_len.min(trimmed.len());
    // avoid splitting a multi-byte character
    while end < trimmed.len() && !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    if end < trimmed.len() {
        format!("{}...", &trimmed[..end])
    } else {
        trimmed.to_string()
    }
}
