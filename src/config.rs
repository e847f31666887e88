use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::aggregator::DEFAULT_BASE_URL;
use crate::error::HubError;
use crate::model::{ProviderKind, SourceKey};
use crate::sources::{SourceConfig, SourceRegistry};

pub const DEFAULT_CONFIG_FILE: &str = "st-hub.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub store_dir: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<SourceEntry>>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SourceEntry {
    Shorthand(String),
    Detailed(SourceEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SourceEntryObject {
    pub key: String,
    #[serde(default)]
    pub kind: Option<ProviderKind>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub collector: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub base_url: String,
    pub store_dir: Option<Utf8PathBuf>,
    pub sources: Vec<SourceConfig>,
}

impl ResolvedConfig {
    pub fn registry(&self) -> Result<SourceRegistry, HubError> {
        let mut registry = SourceRegistry::new();
        for source in &self.sources {
            registry.register(source.clone())?;
        }
        Ok(registry)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `st-hub.json` in the current directory. Without an
    /// explicit path a missing file means built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HubError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no {DEFAULT_CONFIG_FILE} found, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| HubError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HubError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HubError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let store_dir = config.store_dir.map(Utf8PathBuf::from);

        let entries = config.sources.unwrap_or_else(default_sources);
        let sources = entries
            .into_iter()
            .map(|entry| match entry {
                SourceEntry::Shorthand(value) => {
                    let key: SourceKey = value.parse()?;
                    let kind: ProviderKind = key.as_str().parse()?;
                    Ok(SourceConfig::new(key, kind))
                }
                SourceEntry::Detailed(obj) => {
                    let key: SourceKey = obj.key.parse()?;
                    let kind = match obj.kind {
                        Some(kind) => kind,
                        None => key.as_str().parse()?,
                    };
                    let mut source = SourceConfig::new(key, kind);
                    if let Some(label) = obj.label {
                        source.label = label;
                    }
                    if let Some(collector) = obj.collector {
                        source.collector = collector;
                    }
                    if let Some(endpoint) = obj.endpoint {
                        source.endpoint = endpoint;
                    }
                    Ok(source)
                }
            })
            .collect::<Result<Vec<_>, HubError>>()?;

        Ok(ResolvedConfig {
            schema_version,
            base_url,
            store_dir,
            sources,
        })
    }
}

pub fn default_sources() -> Vec<SourceEntry> {
    vec![
        SourceEntry::Shorthand("sensor-community".to_string()),
        SourceEntry::Shorthand("irceline".to_string()),
    ]
}
