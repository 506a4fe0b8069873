//! Unified error handling for the varta crate
//!
//! Domain-specific errors (fetching, publishing, storage) are defined as
//! separate enums and folded into a single [`Error`] used across module
//! boundaries. Independent failures from one harvesting pass are kept
//! side by side in [`Error::Aggregate`] rather than replacing one another,
//! so a pass's failure report can enumerate every cause.

use thiserror::Error;

/// Errors raised while fetching provider feeds or article pages
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status, with the leading bytes of the body
    #[error("status {status} body: {snippet}")]
    Status { status: u16, snippet: String },

    /// Sitemap XML could not be decoded
    #[error("decode sitemap: {0}")]
    Sitemap(#[from] quick_xml::DeError),

    /// Feed fetch succeeded but yielded no records
    #[error("{provider_id} sitemap returned no records")]
    EmptyFeed { provider_id: String },

    /// Provider handed to a fetcher of the wrong type
    #[error("fetcher {fetcher} received incompatible provider type {kind:?}")]
    IncompatibleProvider { fetcher: String, kind: String },

    /// Provider is missing its source URL
    #[error("provider {provider_id:?} source_url is empty")]
    MissingSourceUrl { provider_id: String },

    /// No fetcher registered for the provider's id or type
    #[error("no fetcher registered for provider {provider_id:?} (type {kind:?})")]
    NoFetcher { provider_id: String, kind: String },
}

/// Errors raised by sink deliveries
#[derive(Error, Debug)]
pub enum PublishError {
    /// HTTP transport failure
    #[error("http request: {0}")]
    Http(#[from] reqwest::Error),

    /// Sink answered with a non-success status
    #[error("http response status {status}: {snippet}")]
    Status { status: u16, snippet: String },

    /// Event payload could not be serialized
    #[error("marshal event: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Sink configuration was invalid at build time
    #[error("sink {sink_id:?}: {reason}")]
    InvalidConfig { sink_id: String, reason: String },

    /// No builder registered for the sink type
    #[error("no sink registered for type {kind:?}")]
    UnknownKind { kind: String },
}

/// Errors raised by the dedupe store
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite-level failure
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Filesystem failure while preparing the store
    #[error("create storage directory: {0}")]
    Io(#[from] std::io::Error),

    /// Store type string not recognized at construction
    #[error("unsupported storage type {0:?}")]
    UnsupportedType(String),

    /// Persistent store requested without a path
    #[error("sqlite storage requires a path")]
    MissingPath,

    /// A concurrent store user panicked while holding the connection
    #[error("store lock poisoned")]
    Poisoned,

    /// Store used after close
    #[error("store is closed")]
    Closed,
}

/// Unified error type for the varta crate
#[derive(Error, Debug)]
pub enum Error {
    /// Feed or page fetch errors
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Sink delivery errors
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// Dedupe store errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration and validation errors
    #[error("config error: {0}")]
    Config(String),

    /// An error attributed to one provider's pass
    #[error("provider {provider_id}: {source}")]
    Provider {
        provider_id: String,
        #[source]
        source: Box<Error>,
    },

    /// An error attributed to one article's publish
    #[error("article {article_id}: {source}")]
    Article {
        article_id: String,
        #[source]
        source: Box<Error>,
    },

    /// A sink's failure, annotated with its type and id
    #[error("{kind} sink[{sink_id}]: {source}")]
    Sink {
        kind: String,
        sink_id: String,
        #[source]
        source: Box<PublishError>,
    },

    /// Several independent errors from one operation, kept side by side
    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<Error>),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error with the provider it belongs to
    pub fn for_provider(provider_id: impl Into<String>, source: Error) -> Self {
        Self::Provider {
            provider_id: provider_id.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an error with the article it belongs to
    pub fn for_article(article_id: impl Into<String>, source: Error) -> Self {
        Self::Article {
            article_id: article_id.into(),
            source: Box::new(source),
        }
    }

    /// Join independent errors into one, flattening nested aggregates.
    ///
    /// Returns `None` when the list is empty so callers can treat a clean
    /// pass as `Ok(())`. A single error is returned as itself.
    pub fn join(errs: Vec<Error>) -> Option<Error> {
        let mut flat = Vec::with_capacity(errs.len());
        for err in errs {
            match err {
                Error::Aggregate(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Error::Aggregate(flat)),
        }
    }
}

fn format_aggregate(errs: &[Error]) -> String {
    let parts: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
    parts.join("; ")
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_empty_is_none() {
        assert!(Error::join(Vec::new()).is_none());
    }

    #[test]
    fn join_single_returns_it_unwrapped() {
        let joined = Error::join(vec![Error::config("bad interval")]).unwrap();
        assert!(matches!(joined, Error::Config(_)));
    }

    #[test]
    fn join_many_enumerates_every_cause() {
        let joined = Error::join(vec![
            Error::for_article("a1", Error::config("x")),
            Error::for_article("a2", Error::config("y")),
        ])
        .unwrap();
        let msg = joined.to_string();
        assert!(msg.contains("article a1"));
        assert!(msg.contains("article a2"));
    }

    #[test]
    fn join_flattens_nested_aggregates() {
        let inner = Error::join(vec![Error::config("a"), Error::config("b")]).unwrap();
        let joined = Error::join(vec![inner, Error::config("c")]).unwrap();
        match joined {
            Error::Aggregate(list) => assert_eq!(list.len(), 3),
            other => panic!("expected aggregate, got {other}"),
        }
    }
}
