//! Sensor.Community (ex luftdaten.info) citizen-science sensors.
//!
//! Each raw item is one upload from one sensor at one location, carrying
//! several value types. Several sensors can share a location. Locations whose
//! uploads carry no usable value are left out entirely.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::builder::{DatastreamDraft, create_datastream, create_observation};
use crate::model::{GEO_JSON, IotId, Location, Observation, Point, Thing};
use crate::ontology::Ontology;
use crate::sources::{OrderedGroups, coordinate, narrow};

pub const ENDPOINT: &str = "https://data.sensor.community/airrohr/v1/filter/area=50.8503,4.3517,10";

#[derive(Debug, Clone, Deserialize)]
pub struct SensorCommunityRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub location: ScLocation,
    pub sensor: ScSensor,
    #[serde(default)]
    pub sensordatavalues: Vec<ScValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScLocation {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub latitude: Value,
    #[serde(default)]
    pub longitude: Value,
    #[serde(default)]
    pub altitude: Value,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub indoor: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScSensor {
    pub id: i64,
    #[serde(default)]
    pub pin: Option<String>,
    pub sensor_type: ScSensorType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScSensorType {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScValue {
    #[serde(default)]
    pub id: Option<IotId>,
    pub value: Value,
    pub value_type: String,
}

struct Site {
    id: i64,
    longitude: f64,
    latitude: f64,
    altitude: f64,
    country: Option<String>,
    indoor: bool,
}

impl SensorCommunityRecord {
    fn site(&self) -> Option<Site> {
        let location = &self.location;
        Some(Site {
            id: location.id?,
            longitude: coordinate(&location.longitude)?,
            latitude: coordinate(&location.latitude)?,
            altitude: coordinate(&location.altitude).unwrap_or(0.0),
            country: location.country.clone(),
            indoor: location.indoor == Some(1),
        })
    }
}

struct StreamAccumulator<'a> {
    id: String,
    sensor: &'a ScSensor,
    value_type: &'a str,
    observations: Vec<Observation>,
}

pub fn transform(ontology: &Ontology, items: &[Value]) -> Vec<Thing> {
    let records = narrow::<SensorCommunityRecord>("sensor-community", items);

    let mut groups: BTreeMap<i64, (Site, Vec<&SensorCommunityRecord>)> = BTreeMap::new();
    for record in &records {
        let Some(site) = record.site() else {
            tracing::debug!(record = ?record.id, "skipping upload without location or coordinates");
            continue;
        };
        groups
            .entry(site.id)
            .or_insert_with(|| (site, Vec::new()))
            .1
            .push(record);
    }

    groups
        .into_values()
        .filter_map(|(site, records)| {
            let thing = create_thing(ontology, site, &records);
            if thing.datastreams.is_empty() {
                tracing::debug!(location = %thing.id, "omitting location without readings");
                return None;
            }
            Some(thing)
        })
        .collect()
}

fn create_thing(ontology: &Ontology, site: Site, records: &[&SensorCommunityRecord]) -> Thing {
    let mut streams = OrderedGroups::new();
    for &record in records {
        let Some(timestamp) = record.timestamp.as_deref() else {
            continue;
        };
        for value in &record.sensordatavalues {
            let Some(result) = coordinate(&value.value) else {
                continue;
            };
            let stream_id = format!("{}-{}-{}", site.id, record.sensor.id, value.value_type);
            let observation_id = value
                .id
                .clone()
                .unwrap_or_else(|| IotId::Text(format!("{stream_id}-{timestamp}")));
            let observation = match create_observation(observation_id, timestamp, result) {
                Ok(observation) => observation,
                Err(err) => {
                    tracing::debug!(stream = %stream_id, error = %err, "dropping reading");
                    continue;
                }
            };
            streams
                .entry_or_insert_with((record.sensor.id, value.value_type.as_str()), || {
                    StreamAccumulator {
                        id: stream_id,
                        sensor: &record.sensor,
                        value_type: &value.value_type,
                        observations: Vec::new(),
                    }
                })
                .observations
                .push(observation);
        }
    }

    let station_label = format!("Station {}", site.id);
    let datastreams = streams
        .into_values()
        .into_iter()
        .map(|stream| {
            let sensor_type = &stream.sensor.sensor_type;
            let sensor_description = match &sensor_type.manufacturer {
                Some(manufacturer) => format!("{manufacturer} {}", sensor_type.name),
                None => sensor_type.name.clone(),
            };
            create_datastream(
                ontology,
                DatastreamDraft {
                    id: stream.id,
                    station_label: &station_label,
                    property: stream.value_type,
                    unit: None,
                    sensor_id: IotId::Number(stream.sensor.id),
                    sensor_name: &sensor_type.name,
                    sensor_description: Some(sensor_description),
                    observations: stream.observations,
                },
            )
        })
        .collect();

    let mut properties = Map::new();
    properties.insert("country".to_string(), json!(site.country));
    properties.insert("indoor".to_string(), json!(site.indoor));

    let country = site.country.as_deref().unwrap_or("unknown");
    Thing {
        id: site.id.to_string(),
        self_link: String::new(),
        name: format!("Sensor.Community Station {}", site.id),
        description: "Citizen science air quality monitoring station".to_string(),
        properties,
        locations: vec![Location {
            id: IotId::Number(site.id),
            name: format!("Location {} ({country})", site.id),
            description: format!("Location of station {}", site.id),
            encoding_type: GEO_JSON.to_string(),
            location: Point::new(site.longitude, site.latitude, Some(site.altitude)),
        }],
        datastreams,
    }
}

/// Drop uploads the API returns without usable coordinates.
pub fn compact_upstream(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| {
            !item["location"]["longitude"].is_null() && !item["location"]["latitude"].is_null()
        })
        .collect()
}
