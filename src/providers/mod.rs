//! Provider definitions and registry loading
//!
//! A [`Provider`] describes one configured news source: where to fetch its
//! feed, how fast to hit it, and an opaque key/value bag (request headers
//! etc.) consumed by fetchers. Providers are loaded once at startup from a
//! TOML or JSON registry file and never mutated afterwards; the pipeline
//! clones them freely into worker tasks.

pub mod fetcher;
pub mod sitemap;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use fetcher::{Fetcher, FetcherRegistry};
pub use sitemap::GoogleNewsFetcher;

const DEFAULT_REQUEST_DELAY_MS: u64 = 500;

/// Keys recognized in the provider config bag when building request headers.
pub const CONFIG_USER_AGENT: &str = "user_agent";
pub const CONFIG_ACCEPT: &str = "accept";
pub const CONFIG_ACCEPT_LANGUAGE: &str = "accept_language";
pub const CONFIG_CACHE_CONTROL: &str = "cache_control";

/// One configured news source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provider {
    /// Unique identifier
    pub id: String,

    /// Human-readable display name
    pub name: String,

    /// Provider type tag, used for fetcher resolution
    #[serde(rename = "type")]
    pub kind: String,

    /// Feed URL the fetcher pulls from
    pub source_url: String,

    /// Response format tag (e.g. "xml")
    pub response_format: String,

    /// Throttle between page requests for this provider, in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Opaque key/value configuration bag (e.g. request headers)
    #[serde(default)]
    pub config: HashMap<String, String>,
}

impl Provider {
    /// Per-request throttle duration; zero means unthrottled
    ///
    /// Registry loading fills in the default for entries that leave the
    /// delay unset, so an explicit zero only appears on hand-built providers.
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Trimmed value for a config key, or the fallback when absent/blank
    pub fn config_str<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        match self.config.get(key) {
            Some(raw) if !raw.trim().is_empty() => raw.trim(),
            _ => fallback,
        }
    }

    /// Common request headers declared in the provider config bag
    pub fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::with_capacity(4);
        for (key, header) in [
            (CONFIG_USER_AGENT, "User-Agent"),
            (CONFIG_ACCEPT, "Accept"),
            (CONFIG_ACCEPT_LANGUAGE, "Accept-Language"),
            (CONFIG_CACHE_CONTROL, "Cache-Control"),
        ] {
            let value = self.config_str(key, "");
            if !value.is_empty() {
                headers.insert(header.to_string(), value.to_string());
            }
        }
        headers
    }

    fn sanitize(mut self) -> Self {
        self.id = self.id.trim().to_string();
        self.name = self.name.trim().to_string();
        self.kind = self.kind.trim().to_string();
        self.source_url = self.source_url.trim().to_string();
        self.response_format = self.response_format.trim().to_string();
        if self.request_delay_ms == 0 {
            self.request_delay_ms = DEFAULT_REQUEST_DELAY_MS;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config("provider id is required"));
        }
        for (field, value) in [
            ("name", &self.name),
            ("type", &self.kind),
            ("source_url", &self.source_url),
            ("response_format", &self.response_format),
        ] {
            if value.is_empty() {
                return Err(Error::config(format!(
                    "{field} is required for provider {:?}",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    providers: Vec<Provider>,
}

/// The set of providers loaded from a registry file
///
/// An explicit value passed into the pipeline constructors; there is no
/// crate-level provider state.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// Load and validate a provider registry from a TOML or JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("read providers file {}: {e}", path.display())))?;

        let file: RegistryFile = decode_registry(path, &raw)?;
        if file.providers.is_empty() {
            return Err(Error::config("providers file contains no providers entries"));
        }

        let mut providers = Vec::with_capacity(file.providers.len());
        let mut seen = std::collections::HashSet::new();
        for (i, entry) in file.providers.into_iter().enumerate() {
            let provider = entry.sanitize();
            provider
                .validate()
                .map_err(|e| Error::config(format!("provider[{i}]: {e}")))?;
            if !seen.insert(provider.id.clone()) {
                return Err(Error::config(format!(
                    "duplicate provider id {:?}",
                    provider.id
                )));
            }
            providers.push(provider);
        }

        Ok(Self { providers })
    }

    /// Build a registry from already-validated providers (used by tests)
    pub fn from_providers(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// All configured providers, in file order
    pub fn all(&self) -> &[Provider] {
        &self.providers
    }

    /// Provider entry for the given id, if present
    pub fn by_id(&self, id: &str) -> Option<&Provider> {
        let id = id.trim();
        self.providers.iter().find(|p| p.id == id)
    }
}

pub(crate) fn decode_registry<T: serde::de::DeserializeOwned>(path: &Path, raw: &str) -> Result<T> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "toml" => toml::from_str(raw)
            .map_err(|e| Error::config(format!("decode toml registry {}: {e}", path.display()))),
        "json" => serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("decode json registry {}: {e}", path.display()))),
        other => Err(Error::config(format!(
            "registry file format {other:?} not recognized (expected TOML or JSON)"
        ))),
    }
}

pub(crate) use decode_registry as decode_registry_file;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(name: &str, contents: &str) -> tempfile::TempPath {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("varta-test-{}-{name}", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        tempfile::TempPath::from_path(path)
    }

    #[test]
    fn loads_toml_registry() {
        let path = write_file(
            "providers.toml",
            r#"
            [[providers]]
            id = "anandabazar"
            name = "Anandabazar"
            type = "google_news_sitemap"
            source_url = "https://example.com/sitemap.xml"
            response_format = "xml"
            request_delay_ms = 250

            [providers.config]
            user_agent = "varta/0.1"
            "#,
        );

        let reg = ProviderRegistry::load(&path).unwrap();
        assert_eq!(reg.all().len(), 1);
        let p = reg.by_id("anandabazar").unwrap();
        assert_eq!(p.request_delay(), Duration::from_millis(250));
        assert_eq!(p.headers().get("User-Agent").unwrap(), "varta/0.1");
    }

    #[test]
    fn loads_json_registry() {
        let path = write_file(
            "providers.json",
            r#"{"providers":[{"id":"p1","name":"P1","type":"t","source_url":"u","response_format":"xml"}]}"#,
        );
        let reg = ProviderRegistry::load(&path).unwrap();
        assert_eq!(reg.all()[0].id, "p1");
        // unset delay falls back to the default throttle
        assert_eq!(reg.all()[0].request_delay(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let path = write_file(
            "dup.json",
            r#"{"providers":[
                {"id":"p1","name":"A","type":"t","source_url":"u","response_format":"xml"},
                {"id":"p1","name":"B","type":"t","source_url":"u","response_format":"xml"}
            ]}"#,
        );
        let err = ProviderRegistry::load(&path).unwrap_err();
        assert!(err.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn rejects_missing_fields() {
        let path = write_file(
            "missing.json",
            r#"{"providers":[{"id":"p1","name":"","type":"t","source_url":"u","response_format":"xml"}]}"#,
        );
        let err = ProviderRegistry::load(&path).unwrap_err();
        assert!(err.to_string().contains("name is required"));
    }

    #[test]
    fn blank_config_values_fall_back() {
        let mut provider = Provider {
            id: "p".into(),
            ..Default::default()
        };
        provider.config.insert(CONFIG_ACCEPT.into(), "   ".into());
        assert_eq!(provider.config_str(CONFIG_ACCEPT, "text/html"), "text/html");
        assert!(provider.headers().is_empty());
    }
}
