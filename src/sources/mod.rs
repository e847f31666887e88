//! Per-provider transformers and the registry that wires them up.
//!
//! A transformer is a plain function from the raw items of one stored payload
//! to SensorThings Things. Sources are added by registering a
//! [`SourceConfig`], never by implementing a trait per provider.

use std::collections::HashMap;
use std::hash::Hash;

use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use serde_json::Value;

use crate::error::HubError;
use crate::model::{ProviderKind, SourceKey, SourceSummary, Thing};
use crate::ontology::Ontology;

pub mod irceline;
pub mod sensor_community;

pub type TransformFn = fn(&Ontology, &[Value]) -> Vec<Thing>;

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub key: SourceKey,
    pub label: String,
    pub kind: ProviderKind,
    /// Name the storage collaborator files this source's payloads under.
    pub collector: String,
    pub endpoint: String,
    pub transform: TransformFn,
}

impl SourceConfig {
    pub fn new(key: SourceKey, kind: ProviderKind) -> Self {
        Self {
            key,
            label: kind.default_label().to_string(),
            kind,
            collector: kind.default_collector().to_string(),
            endpoint: kind.default_endpoint().to_string(),
            transform: kind.transform(),
        }
    }

    pub fn summary(&self) -> SourceSummary {
        SourceSummary {
            key: self.key.to_string(),
            label: self.label.clone(),
            kind: self.kind,
            collector: self.collector.clone(),
        }
    }
}

impl ProviderKind {
    pub fn default_label(self) -> &'static str {
        match self {
            ProviderKind::Irceline => "IRCELINE (Belgian Interregional Environment Agency)",
            ProviderKind::SensorCommunity => "Sensor.Community citizen science network",
        }
    }

    pub fn default_collector(self) -> &'static str {
        match self {
            ProviderKind::Irceline => "irceline_sos",
            ProviderKind::SensorCommunity => "sensor_community_collector",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            ProviderKind::Irceline => irceline::ENDPOINT,
            ProviderKind::SensorCommunity => sensor_community::ENDPOINT,
        }
    }

    pub fn transform(self) -> TransformFn {
        match self {
            ProviderKind::Irceline => irceline::transform,
            ProviderKind::SensorCommunity => sensor_community::transform,
        }
    }

    /// Reduce an upstream response to the item list that gets persisted.
    pub fn compact(self, upstream: Value) -> Result<Vec<Value>, HubError> {
        let items = match upstream {
            Value::Array(items) => items,
            other => {
                return Err(HubError::PayloadParse {
                    source_name: self.to_string(),
                    message: format!("expected array, found {}", json_type(&other)),
                });
            }
        };
        Ok(match self {
            ProviderKind::Irceline => irceline::compact_upstream(items),
            ProviderKind::SensorCommunity => sensor_community::compact_upstream(items),
        })
    }
}

/// Ordered set of sources. Iteration order is registration order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both built-in providers under their canonical keys.
    pub fn air_quality() -> Result<Self, HubError> {
        let mut registry = Self::new();
        for kind in [ProviderKind::SensorCommunity, ProviderKind::Irceline] {
            registry.register(SourceConfig::new(kind.to_string().parse()?, kind))?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, config: SourceConfig) -> Result<(), HubError> {
        if self.get(config.key.as_str()).is_some() {
            return Err(HubError::DuplicateSource(config.key.to_string()));
        }
        self.sources.push(config);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.key.as_str() == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    /// The sources a query touches. An unknown key selects nothing.
    pub fn select(&self, filter: Option<&str>) -> Vec<&SourceConfig> {
        match filter {
            Some(key) => self.get(key).into_iter().collect(),
            None => self.sources.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Decode a stored payload into its raw items.
pub fn parse_payload(source_name: &str, payload: &[u8]) -> Result<Vec<Value>, HubError> {
    serde_json::from_slice::<Vec<Value>>(payload).map_err(|err| HubError::PayloadParse {
        source_name: source_name.to_string(),
        message: err.to_string(),
    })
}

/// Narrow raw items to a typed record, dropping the ones that do not fit.
pub(crate) fn narrow<T: DeserializeOwned>(source: &str, items: &[Value]) -> Vec<T> {
    items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| match T::deserialize(item) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(source, position, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// Field deserializer that turns a value of the wrong shape into `None`
/// instead of rejecting the whole record.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Accepts both JSON numbers and numeric strings (providers mix them).
pub(crate) fn coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

/// Insertion-ordered grouping used to accumulate Datastreams.
pub(crate) struct OrderedGroups<K, V> {
    index: HashMap<K, usize>,
    groups: Vec<V>,
}

impl<K: Eq + Hash, V> OrderedGroups<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    pub(crate) fn entry_or_insert_with(&mut self, key: K, init: impl FnOnce() -> V) -> &mut V {
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.groups.push(init());
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[position]
    }

    pub(crate) fn into_values(self) -> Vec<V> {
        self.groups
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
