//! Datastream and Observation construction shared by every source.

use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;

use crate::error::HubError;
use crate::model::{
    Datastream, IotId, OM_MEASUREMENT, Observation, ObservedProperty, Sensor, UnitOfMeasurement,
};
use crate::ontology::Ontology;

/// Timestamps as they arrive from providers: epoch milliseconds (IRCELINE,
/// sometimes serialized as a float) or text (Sensor.Community uses
/// `YYYY-MM-DD HH:MM:SS`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    EpochMillis(i64),
    FractionalEpochMillis(f64),
    Text(String),
}

impl RawTimestamp {
    pub fn to_iso8601(&self) -> Result<String, HubError> {
        match self {
            RawTimestamp::EpochMillis(millis) => DateTime::from_timestamp_millis(*millis)
                .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
                .ok_or_else(|| HubError::InvalidTimestamp(millis.to_string())),
            RawTimestamp::FractionalEpochMillis(millis) => {
                let rounded = millis.round();
                if !rounded.is_finite() || rounded.abs() > i64::MAX as f64 {
                    return Err(HubError::InvalidTimestamp(millis.to_string()));
                }
                RawTimestamp::EpochMillis(rounded as i64).to_iso8601()
            }
            RawTimestamp::Text(text) if text.contains('T') => Ok(text.clone()),
            RawTimestamp::Text(text) => Ok(format!("{}.000Z", text.replacen(' ', "T", 1))),
        }
    }
}

impl From<i64> for RawTimestamp {
    fn from(value: i64) -> Self {
        RawTimestamp::EpochMillis(value)
    }
}

impl From<&str> for RawTimestamp {
    fn from(value: &str) -> Self {
        RawTimestamp::Text(value.to_string())
    }
}

pub fn create_observation(
    id: impl Into<IotId>,
    timestamp: impl Into<RawTimestamp>,
    value: f64,
) -> Result<Observation, HubError> {
    let time = timestamp.into().to_iso8601()?;
    Ok(Observation {
        id: id.into(),
        phenomenon_time: time.clone(),
        result_time: time,
        result: value,
    })
}

/// Inputs for [`create_datastream`].
#[derive(Debug, Clone)]
pub struct DatastreamDraft<'a> {
    pub id: String,
    pub station_label: &'a str,
    pub property: &'a str,
    pub unit: Option<&'a str>,
    pub sensor_id: IotId,
    pub sensor_name: &'a str,
    pub sensor_description: Option<String>,
    pub observations: Vec<Observation>,
}

pub fn create_datastream(ontology: &Ontology, draft: DatastreamDraft<'_>) -> Datastream {
    let pollutant = ontology.resolve_or_fallback(draft.property, draft.unit);
    let label = draft.station_label;

    Datastream {
        id: draft.id,
        name: format!("{} at {label}", pollutant.name),
        description: format!("{} measured at {label}", pollutant.description),
        observation_type: OM_MEASUREMENT.to_string(),
        unit_of_measurement: UnitOfMeasurement {
            name: pollutant.unit_name,
            symbol: pollutant.unit,
            definition: pollutant.unit_definition,
        },
        observed_property: ObservedProperty {
            id: pollutant.id,
            name: pollutant.name,
            description: pollutant.description,
            definition: pollutant.definition,
        },
        sensor: Sensor {
            id: draft.sensor_id,
            name: draft.sensor_name.to_string(),
            description: draft
                .sensor_description
                .unwrap_or_else(|| draft.sensor_name.to_string()),
            encoding_type: "application/pdf".to_string(),
            metadata: String::new(),
        },
        observations: draft.observations,
    }
}
