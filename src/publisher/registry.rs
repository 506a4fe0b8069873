//! Sink configuration loading and type-keyed sink builders
//!
//! Sink definitions live in a TOML/JSON registry file. Each entry carries a
//! type tag; a [`SinkRegistry`] maps type tags to builder closures, so adding
//! a sink type is a registration, never a change to the fan-out.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, PublishError, Result};
use crate::providers::decode_registry_file;
use crate::publisher::webhook::{HttpSinkConfig, WebhookSink, SINK_TYPE_HTTP};
use crate::publisher::Sink;

/// One sink entry declared in the registry file
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Disabled sinks are kept in the file but never built
    #[serde(default)]
    pub enabled: Option<bool>,

    /// HTTP settings, required for type "http"
    #[serde(default)]
    pub http: Option<HttpSinkConfig>,
}

impl SinkConfig {
    /// Enabled flag, defaulting to true
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    fn sanitize(mut self) -> Self {
        self.id = self.id.trim().to_string();
        self.kind = self.kind.trim().to_ascii_lowercase();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::config("sink id is required"));
        }
        if self.kind.is_empty() {
            return Err(Error::config(format!(
                "type is required for sink {:?}",
                self.id
            )));
        }
        if self.kind == SINK_TYPE_HTTP && self.http.is_none() {
            return Err(Error::config(format!(
                "http config required for sink {:?}",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SinkFile {
    sinks: Vec<SinkConfig>,
}

/// Load, sanitize and validate the sink registry file
pub fn load_sink_configs(path: &Path) -> Result<Vec<SinkConfig>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("read sinks file {}: {e}", path.display())))?;
    let file: SinkFile = decode_registry_file(path, &raw)?;
    if file.sinks.is_empty() {
        return Err(Error::config("sinks file contains no sinks entries"));
    }

    let mut configs = Vec::with_capacity(file.sinks.len());
    let mut seen = std::collections::HashSet::new();
    for (i, entry) in file.sinks.into_iter().enumerate() {
        let config = entry.sanitize();
        config
            .validate()
            .map_err(|e| Error::config(format!("sinks[{i}]: {e}")))?;
        if !seen.insert(config.id.clone()) {
            return Err(Error::config(format!("duplicate sink id {:?}", config.id)));
        }
        configs.push(config);
    }
    Ok(configs)
}

type SinkBuilder = Box<dyn Fn(&SinkConfig) -> std::result::Result<Arc<dyn Sink>, PublishError> + Send + Sync>;

/// Maps sink type tags to builders
#[derive(Default)]
pub struct SinkRegistry {
    builders: HashMap<String, SinkBuilder>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry wired with the built-in sink types
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SINK_TYPE_HTTP, |config| {
            let http = config.http.as_ref().ok_or_else(|| PublishError::InvalidConfig {
                sink_id: config.id.clone(),
                reason: "missing http configuration".to_string(),
            })?;
            Ok(Arc::new(WebhookSink::new(&config.id, http)?) as Arc<dyn Sink>)
        });
        registry
    }

    /// Associate a builder with a sink type tag
    pub fn register<F>(&mut self, kind: &str, builder: F)
    where
        F: Fn(&SinkConfig) -> std::result::Result<Arc<dyn Sink>, PublishError>
            + Send
            + Sync
            + 'static,
    {
        let key = kind.trim().to_ascii_lowercase();
        if key.is_empty() {
            return;
        }
        self.builders.insert(key, Box::new(builder));
    }

    /// Build the sink for one config entry
    pub fn sink_for(&self, config: &SinkConfig) -> std::result::Result<Arc<dyn Sink>, PublishError> {
        let builder = self
            .builders
            .get(&config.kind.to_ascii_lowercase())
            .ok_or_else(|| PublishError::UnknownKind {
                kind: config.kind.clone(),
            })?;
        builder(config)
    }

    /// Instantiate sinks for every enabled config entry
    pub fn build_all(&self, configs: &[SinkConfig]) -> Result<Vec<Arc<dyn Sink>>> {
        let mut sinks = Vec::new();
        for config in configs {
            if !config.is_enabled() {
                tracing::debug!(sink_id = %config.id, "sink disabled, skipping");
                continue;
            }
            let sink = self.sink_for(config)?;
            sinks.push(sink);
        }
        Ok(sinks)
    }
}
