use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::HubError;

pub const OM_MEASUREMENT: &str =
    "http://www.opengis.net/def/observationType/OGC-OM/2.0/OM_Measurement";
pub const GEO_JSON: &str = "application/geo+json";

/// Upstream providers whose payload shapes this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Irceline,
    SensorCommunity,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Irceline => write!(f, "irceline"),
            ProviderKind::SensorCommunity => write!(f, "sensor-community"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = HubError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "irceline" => Ok(ProviderKind::Irceline),
            "sensor-community" => Ok(ProviderKind::SensorCommunity),
            _ => Err(HubError::UnknownSource(value.to_string())),
        }
    }
}

/// Registry key of a source; prefixes every Thing id the source produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceKey(String);

impl SourceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SourceKey {
    type Err = HubError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
        if !is_valid {
            return Err(HubError::InvalidSourceKey(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for SourceKey {
    type Error = HubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SourceKey> for String {
    fn from(key: SourceKey) -> Self {
        key.0
    }
}

/// `@iot.id` values keep the JSON type the upstream used.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IotId {
    Number(i64),
    Text(String),
}

impl fmt::Display for IotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IotId::Number(value) => write!(f, "{value}"),
            IotId::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for IotId {
    fn from(value: i64) -> Self {
        IotId::Number(value)
    }
}

impl From<String> for IotId {
    fn from(value: String) -> Self {
        IotId::Text(value)
    }
}

impl From<&str> for IotId {
    fn from(value: &str) -> Self {
        IotId::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "type")]
    pub kind: GeometryType,
    pub coordinates: Vec<f64>,
}

impl Point {
    /// Coordinates are always `[lon, lat]` or `[lon, lat, alt]`.
    pub fn new(longitude: f64, latitude: f64, altitude: Option<f64>) -> Self {
        let mut coordinates = vec![longitude, latitude];
        coordinates.extend(altitude);
        Self {
            kind: GeometryType::Point,
            coordinates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "@iot.id")]
    pub id: IotId,
    pub name: String,
    pub description: String,
    pub encoding_type: String,
    pub location: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(rename = "@iot.id")]
    pub id: IotId,
    pub phenomenon_time: String,
    pub result_time: String,
    pub result: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOfMeasurement {
    pub name: String,
    pub symbol: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedProperty {
    #[serde(rename = "@iot.id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(rename = "@iot.id")]
    pub id: IotId,
    pub name: String,
    pub description: String,
    pub encoding_type: String,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    #[serde(rename = "@iot.id")]
    pub id: String,
    pub name: String,
    pub description: String,
    pub observation_type: String,
    pub unit_of_measurement: UnitOfMeasurement,
    #[serde(rename = "ObservedProperty")]
    pub observed_property: ObservedProperty,
    #[serde(rename = "Sensor")]
    pub sensor: Sensor,
    #[serde(rename = "Observations")]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    #[serde(rename = "@iot.id")]
    pub id: String,
    #[serde(rename = "@iot.selfLink")]
    pub self_link: String,
    pub name: String,
    pub description: String,
    pub properties: Map<String, Value>,
    #[serde(rename = "Locations")]
    pub locations: Vec<Location>,
    #[serde(rename = "Datastreams")]
    pub datastreams: Vec<Datastream>,
}

impl Thing {
    pub fn location(&self) -> Option<&Point> {
        self.locations.first().map(|location| &location.location)
    }
}

/// SensorThings collection envelope. The count always equals the number of
/// items because the only constructor derives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T> {
    #[serde(rename = "@iot.count")]
    count: usize,
    value: Vec<T>,
}

impl<T> Collection<T> {
    pub fn new(value: Vec<T>) -> Self {
        Self {
            count: value.len(),
            value,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn items(&self) -> &[T] {
        &self.value
    }

    pub fn into_items(self) -> Vec<T> {
        self.value
    }
}

/// Shapes the property filter can inspect.
pub trait ObservedPropertyRef {
    fn observed_property_name(&self) -> &str;
    fn observed_property_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedDatastream {
    #[serde(flatten)]
    pub datastream: Datastream,
    #[serde(rename = "Thing@iot.navigationLink")]
    pub thing_link: String,
}

impl ObservedPropertyRef for LinkedDatastream {
    fn observed_property_name(&self) -> &str {
        &self.datastream.observed_property.name
    }

    fn observed_property_id(&self) -> &str {
        &self.datastream.observed_property.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedObservation {
    #[serde(flatten)]
    pub observation: Observation,
    pub observed_property: String,
    pub observed_property_id: String,
    pub unit: String,
    pub station_id: String,
    pub station_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Point>,
    #[serde(rename = "Datastream@iot.navigationLink")]
    pub datastream_link: String,
}

impl ObservedPropertyRef for EnrichedObservation {
    fn observed_property_name(&self) -> &str {
        &self.observed_property
    }

    fn observed_property_id(&self) -> &str {
        &self.observed_property_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedPropertySummary {
    #[serde(flatten)]
    pub property: ObservedProperty,
    #[serde(rename = "@iot.selfLink")]
    pub self_link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    pub key: String,
    pub label: String,
    pub kind: ProviderKind,
    pub collector: String,
}
