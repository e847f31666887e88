//! IRCELINE SOS timeseries (Belgian official monitoring network).
//!
//! One raw item is one timeseries: a station, a phenomenon, a procedure and
//! the latest value. Stations without any current value are still emitted,
//! with an empty Datastream list.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::builder::{DatastreamDraft, RawTimestamp, create_datastream, create_observation};
use crate::model::{GEO_JSON, IotId, Location, Observation, Point, Thing};
use crate::ontology::Ontology;
use crate::sources::{OrderedGroups, coordinate, lenient, narrow};

pub const ENDPOINT: &str = "https://geo.irceline.be/sos/api/v1/timeseries/?expanded=true";
const NETWORK: &str = "Belgian Interregional Environment Agency";

/// One timeseries. Only `station` is required to have a usable shape; any
/// other field that does not fit reads as absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrcelineRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<IotId>,
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub uom: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub station: Option<IrcelineStation>,
    #[serde(default, deserialize_with = "lenient")]
    pub last_value: Option<LastValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub parameters: Option<IrcelineParameters>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrcelineStation {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub coordinates: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LastValue {
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IrcelineParameters {
    pub phenomenon: Reference,
    pub procedure: Reference,
    #[serde(default, deserialize_with = "lenient")]
    pub category: Option<Reference>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reference {
    pub id: IotId,
    pub label: String,
}

struct Station {
    id: i64,
    label: String,
    longitude: f64,
    latitude: f64,
}

impl IrcelineRecord {
    fn station(&self) -> Option<Station> {
        let station = self.station.as_ref()?;
        let id = station.id?;
        let coordinates = station.coordinates.as_ref()?;
        let longitude = coordinate(coordinates.first()?)?;
        let latitude = coordinate(coordinates.get(1)?)?;
        Some(Station {
            id,
            label: station
                .label
                .clone()
                .unwrap_or_else(|| format!("Station {id}")),
            longitude,
            latitude,
        })
    }

    /// The latest value, when the timeseries has an id, a timestamp and a
    /// numeric value.
    fn reading(&self) -> Option<Observation> {
        let id = self.id.as_ref()?;
        let last = self.last_value.as_ref()?;
        let value = last.value?;
        let timestamp = last.timestamp.clone()?;
        match create_observation(format!("{id}-last"), timestamp, value) {
            Ok(observation) => Some(observation),
            Err(err) => {
                tracing::debug!(timeseries = %id, error = %err, "dropping reading");
                None
            }
        }
    }
}

struct StreamAccumulator<'a> {
    id: String,
    record: &'a IrcelineRecord,
    parameters: &'a IrcelineParameters,
    observations: Vec<Observation>,
}

pub fn transform(ontology: &Ontology, items: &[Value]) -> Vec<Thing> {
    let records = narrow::<IrcelineRecord>("irceline", items);

    let mut groups: BTreeMap<i64, (Station, Vec<&IrcelineRecord>)> = BTreeMap::new();
    for record in &records {
        let Some(station) = record.station() else {
            tracing::debug!(timeseries = ?record.id, "skipping timeseries without station or coordinates");
            continue;
        };
        groups
            .entry(station.id)
            .or_insert_with(|| (station, Vec::new()))
            .1
            .push(record);
    }

    groups
        .into_values()
        .map(|(station, records)| create_thing(ontology, station, &records))
        .collect()
}

fn create_thing(ontology: &Ontology, station: Station, records: &[&IrcelineRecord]) -> Thing {
    let mut streams = OrderedGroups::new();
    for &record in records {
        let (Some(id), Some(parameters)) = (record.id.as_ref(), record.parameters.as_ref()) else {
            tracing::debug!(timeseries = ?record.id, "timeseries without id or parameters, no datastream");
            continue;
        };
        let Some(observation) = record.reading() else {
            continue;
        };
        let key = (
            parameters.procedure.id.to_string(),
            parameters.phenomenon.id.to_string(),
        );
        streams
            .entry_or_insert_with(key, || StreamAccumulator {
                id: id.to_string(),
                record,
                parameters,
                observations: Vec::new(),
            })
            .observations
            .push(observation);
    }

    let datastreams = streams
        .into_values()
        .into_iter()
        .map(|stream| {
            let procedure = &stream.parameters.procedure;
            create_datastream(
                ontology,
                DatastreamDraft {
                    id: stream.id,
                    station_label: &station.label,
                    property: &stream.parameters.phenomenon.label,
                    unit: stream.record.uom.as_deref(),
                    sensor_id: procedure.id.clone(),
                    sensor_name: &procedure.label,
                    sensor_description: Some(format!(
                        "Measurement procedure: {}",
                        procedure.label
                    )),
                    observations: stream.observations,
                },
            )
        })
        .collect();

    let mut properties = Map::new();
    properties.insert("network".to_string(), json!(NETWORK));

    Thing {
        id: station.id.to_string(),
        self_link: String::new(),
        name: station.label.clone(),
        description: format!("IRCELINE monitoring station: {}", station.label),
        properties,
        locations: vec![Location {
            id: IotId::Number(station.id),
            name: station.label.clone(),
            description: format!("Location of {}", station.label),
            encoding_type: GEO_JSON.to_string(),
            location: Point::new(station.longitude, station.latitude, None),
        }],
        datastreams,
    }
}

/// Keep what the transformer needs from an expanded SOS timeseries listing.
pub fn compact_upstream(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| item["station"]["geometry"]["coordinates"].is_array())
        .map(|item| {
            json!({
                "id": item["id"],
                "label": item["label"],
                "uom": item["uom"],
                "station": {
                    "id": item["station"]["properties"]["id"],
                    "label": item["station"]["properties"]["label"],
                    "coordinates": item["station"]["geometry"]["coordinates"],
                },
                "lastValue": item["lastValue"],
                "parameters": {
                    "phenomenon": item["parameters"]["phenomenon"],
                    "procedure": item["parameters"]["procedure"],
                    "category": item["parameters"]["category"],
                },
            })
        })
        .collect()
}
