//! Core data structures shared across the pipeline
//!
//! An [`Article`] is produced by a provider fetcher, optionally enriched with
//! page metadata, and wrapped in an [`Event`] at fan-out time. The pipeline
//! keeps no copy of either beyond the dedupe mark.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single harvested link and its metadata
///
/// The id is stable and content-derived (typically a hash of the canonical
/// URL) and unique within one provider's result set. The enricher only ever
/// overlays `title`, `description` and `image_url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Stable identifier, unique within the provider's results
    pub id: String,

    /// Headline, possibly empty until enrichment
    pub title: String,

    /// Canonical article URL
    pub url: String,

    /// Summary text, possibly empty until enrichment
    #[serde(default)]
    pub description: String,

    /// Lead image URL, possibly empty until enrichment
    #[serde(default)]
    pub image_url: String,

    /// Keywords attached by the fetcher, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    /// Publication timestamp reported by the source, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,

    /// Id of the provider that produced this article
    #[serde(default)]
    pub provider_id: String,
}

/// The envelope delivered to every sink
///
/// `collected_at` is stamped at the moment of fan-out, not at fetch time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub provider_id: String,
    pub provider_name: String,
    pub article: Article,
    pub collected_at: DateTime<Utc>,
}

impl Event {
    /// Build the publish envelope for one provider + article
    pub fn new(provider_id: &str, provider_name: &str, article: Article) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            provider_name: provider_name.to_string(),
            article,
            collected_at: Utc::now(),
        }
    }
}
