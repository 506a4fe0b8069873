//! HTTP webhook sink
//!
//! Delivers events as JSON payloads to a configured HTTP endpoint. The
//! method, headers and timeout come from the sink's registry entry.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::error::PublishError;
use crate::models::Event;
use crate::publisher::Sink;

pub(crate) const SINK_TYPE_HTTP: &str = "http";

const DEFAULT_METHOD: &str = "POST";
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const ERROR_SNIPPET_BYTES: usize = 512;

/// HTTP endpoint settings for one webhook sink
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpSinkConfig {
    pub url: String,

    /// HTTP method, defaulting to POST
    #[serde(default)]
    pub method: String,

    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_seconds: u64,
}

/// Webhook sink posting events as JSON
#[derive(Debug)]
pub struct WebhookSink {
    id: String,
    method: Method,
    url: String,
    headers: HashMap<String, String>,
    client: Client,
}

impl WebhookSink {
    /// Build a webhook sink from its registry entry
    pub fn new(id: &str, config: &HttpSinkConfig) -> Result<Self, PublishError> {
        if config.url.trim().is_empty() {
            return Err(PublishError::InvalidConfig {
                sink_id: id.to_string(),
                reason: "http.url is required".to_string(),
            });
        }

        let method_name = if config.method.trim().is_empty() {
            DEFAULT_METHOD
        } else {
            config.method.trim()
        };
        let method = Method::from_str(&method_name.to_ascii_uppercase()).map_err(|_| {
            PublishError::InvalidConfig {
                sink_id: id.to_string(),
                reason: format!("unsupported http method {method_name:?}"),
            }
        })?;

        let timeout = if config.timeout_seconds == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            config.timeout_seconds
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            id: id.to_string(),
            method,
            url: config.url.trim().to_string(),
            headers: config.headers.clone(),
            client,
        })
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &str {
        SINK_TYPE_HTTP
    }

    async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        let mut request = self
            .client
            .request(self.method.clone(), &self.url)
            .json(event);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                snippet: crate::crawler::client::body_snippet(&body, ERROR_SNIPPET_BYTES),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Article;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: String) -> HttpSinkConfig {
        HttpSinkConfig {
            url,
            method: String::new(),
            headers: HashMap::from([("X-Token".to_string(), "secret".to_string())]),
            timeout_seconds: 0,
        }
    }

    #[tokio::test]
    async fn posts_event_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Token", "secret"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new("hook-1", &config(format!("{}/hook", server.uri()))).unwrap();
        let event = Event::new("prov", "Prov", Article::default());
        sink.publish(&event).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_carries_snippet() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("rejected payload"))
            .mount(&server)
            .await;

        let sink = WebhookSink::new("hook-1", &config(format!("{}/hook", server.uri()))).unwrap();
        let event = Event::new("prov", "Prov", Article::default());
        let err = sink.publish(&event).await.unwrap_err();
        match err {
            PublishError::Status { status, snippet } => {
                assert_eq!(status, 422);
                assert_eq!(snippet, "rejected payload");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_url_is_rejected_at_build_time() {
        let err = WebhookSink::new("hook-1", &config(String::new())).unwrap_err();
        assert!(matches!(err, PublishError::InvalidConfig { .. }));
    }

    #[test]
    fn bad_method_is_rejected_at_build_time() {
        let mut cfg = config("https://example.com/hook".into());
        cfg.method = "N O T".into();
        let err = WebhookSink::new("hook-1", &cfg).unwrap_err();
        assert!(matches!(err, PublishError::InvalidConfig { .. }));
    }
}
