//! Canonical pollutant and meteorological property definitions.
//!
//! Every provider names its measurements differently (`P1`, `pm10`, `PM 10`).
//! The [`Ontology`] maps those labels onto one canonical definition so that
//! Datastreams from different sources share an ObservedProperty identity.

use std::collections::HashMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use crate::error::HubError;

const EEA_POLLUTANT: &str = "http://dd.eionet.europa.eu/vocabulary/aq/pollutant";
const UG_M3: &str = "http://dd.eionet.europa.eu/vocabulary/uom/concentration/ug.m-3";
const MG_M3: &str = "http://dd.eionet.europa.eu/vocabulary/uom/concentration/mg.m-3";
const NERC_P07: &str = "http://vocab.nerc.ac.uk/collection/P07/current";
const QUDT_UNITS: &str = "http://www.qudt.org/qudt/owl/1.0.0/unit/Instances.html";
const FALLBACK_PROPERTY_BASE: &str = "http://example.org/property";

/// Characters left untouched by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollutantDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub unit_name: String,
    pub definition: String,
    pub unit_definition: String,
    pub aliases: Vec<String>,
}

impl PollutantDefinition {
    /// Definition for a property no table entry knows about.
    pub fn fallback(source_property: &str, unit: Option<&str>) -> Self {
        let encoded = utf8_percent_encode(source_property, URI_COMPONENT);
        Self {
            id: source_property.to_string(),
            name: source_property.to_string(),
            description: format!("Measurement of {source_property}"),
            unit: unit.unwrap_or("?").to_string(),
            unit_name: unit.unwrap_or("Unknown").to_string(),
            definition: format!("{FALLBACK_PROPERTY_BASE}/{encoded}"),
            unit_definition: format!("{QUDT_UNITS}#Unknown"),
            aliases: Vec::new(),
        }
    }
}

struct Entry {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    unit: &'static str,
    unit_name: &'static str,
    definition: String,
    unit_definition: String,
    aliases: &'static [&'static str],
}

fn pollutant(
    id: &'static str,
    description: &'static str,
    eea_code: u32,
    aliases: &'static [&'static str],
) -> Entry {
    Entry {
        id,
        name: id,
        description,
        unit: "µg/m³",
        unit_name: "Microgram per cubic meter",
        definition: format!("{EEA_POLLUTANT}/{eea_code}"),
        unit_definition: UG_M3.to_string(),
        aliases,
    }
}

/// The built-in definition table.
pub fn standard_pollutants() -> Vec<PollutantDefinition> {
    let entries = vec![
        pollutant(
            "PM10",
            "Particulate Matter < 10 µm",
            5,
            &["P1", "pm10", "PM 10"],
        ),
        pollutant(
            "PM2.5",
            "Particulate Matter < 2.5 µm",
            6001,
            &["P2", "pm2.5", "PM 2.5", "PM25"],
        ),
        pollutant(
            "PM1",
            "Particulate Matter < 1 µm",
            6002,
            &["P0", "pm1", "PM 1"],
        ),
        pollutant(
            "PM4",
            "Particulate Matter < 4 µm",
            6003,
            &["P4", "pm4", "PM 4"],
        ),
        pollutant("NO2", "Nitrogen dioxide", 8, &["no2", "Nitrogen dioxide"]),
        pollutant("NO", "Nitrogen monoxide", 38, &["no", "Nitrogen monoxide"]),
        pollutant("O3", "Ozone", 7, &["o3", "Ozone"]),
        pollutant(
            "SO2",
            "Sulphur dioxide",
            1,
            &["so2", "Sulphur dioxide", "Sulfur dioxide"],
        ),
        Entry {
            unit: "mg/m³",
            unit_name: "Milligram per cubic meter",
            unit_definition: MG_M3.to_string(),
            ..pollutant("CO", "Carbon monoxide", 10, &["co", "Carbon monoxide"])
        },
        Entry {
            id: "temperature",
            name: "Air Temperature",
            description: "Ambient air temperature",
            unit: "°C",
            unit_name: "Degree Celsius",
            definition: format!("{NERC_P07}/CFSN0023/"),
            unit_definition: format!("{QUDT_UNITS}#DegreeCelsius"),
            aliases: &["temp", "Temperature"],
        },
        Entry {
            id: "humidity",
            name: "Relative Humidity",
            description: "Relative humidity of air",
            unit: "%",
            unit_name: "Percent",
            definition: format!("{NERC_P07}/CFSN0413/"),
            unit_definition: format!("{QUDT_UNITS}#Percent"),
            aliases: &["rh", "Humidity", "Relative Humidity"],
        },
        Entry {
            id: "pressure",
            name: "Atmospheric Pressure",
            description: "Atmospheric pressure at sensor level",
            unit: "hPa",
            unit_name: "Hectopascal",
            definition: format!("{NERC_P07}/CFSN0015/"),
            unit_definition: format!("{QUDT_UNITS}#Hectopascal"),
            aliases: &["Atmospheric Pressure", "pressure_at_sealevel"],
        },
    ];

    entries
        .into_iter()
        .map(|entry| PollutantDefinition {
            id: entry.id.to_string(),
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            unit: entry.unit.to_string(),
            unit_name: entry.unit_name.to_string(),
            definition: entry.definition,
            unit_definition: entry.unit_definition,
            aliases: entry.aliases.iter().map(|alias| alias.to_string()).collect(),
        })
        .collect()
}

/// Immutable lookup over a definition table.
///
/// The alias index is built once by [`Ontology::from_definitions`]; there is
/// no way to add entries afterwards.
#[derive(Debug, Clone)]
pub struct Ontology {
    definitions: Vec<PollutantDefinition>,
    index: HashMap<String, usize>,
}

impl Ontology {
    pub fn from_definitions(definitions: Vec<PollutantDefinition>) -> Result<Self, HubError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (position, definition) in definitions.iter().enumerate() {
            let id_key = definition.id.to_lowercase();
            if let Some(&existing) = index.get(&id_key) {
                if definitions[existing].id.to_lowercase() == id_key {
                    return Err(HubError::OntologyConflict(format!(
                        "duplicate definition id {}",
                        definition.id
                    )));
                }
            }

            let keys = std::iter::once(&definition.id)
                .chain(std::iter::once(&definition.name))
                .chain(definition.aliases.iter());
            for key in keys {
                let key = key.to_lowercase();
                match index.get(&key) {
                    Some(&existing) if existing != position => {
                        return Err(HubError::OntologyConflict(format!(
                            "`{key}` maps to both {} and {}",
                            definitions[existing].id, definition.id
                        )));
                    }
                    Some(_) => {}
                    None => {
                        index.insert(key, position);
                    }
                }
            }
        }
        Ok(Self { definitions, index })
    }

    pub fn standard() -> Result<Self, HubError> {
        Self::from_definitions(standard_pollutants())
    }

    pub fn resolve(&self, source_property: &str) -> Option<&PollutantDefinition> {
        self.index
            .get(&source_property.to_lowercase())
            .map(|&position| &self.definitions[position])
    }

    pub fn resolve_or_fallback(
        &self,
        source_property: &str,
        unit: Option<&str>,
    ) -> PollutantDefinition {
        match self.resolve(source_property) {
            Some(definition) => definition.clone(),
            None => PollutantDefinition::fallback(source_property, unit),
        }
    }

    pub fn definitions(&self) -> &[PollutantDefinition] {
        &self.definitions
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn standard_table_builds() {
        let ontology = Ontology::standard().unwrap();
        assert_eq!(ontology.definitions().len(), 12);
        assert_eq!(ontology.resolve("co").unwrap().unit, "mg/m³");
    }

    #[test]
    fn conflicting_alias_rejected() {
        let mut table = standard_pollutants();
        table[1].aliases.push("P1".to_string());
        let err = Ontology::from_definitions(table).unwrap_err();
        assert_matches!(err, HubError::OntologyConflict(_));
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut table = standard_pollutants();
        let copy = table[0].clone();
        table.push(copy);
        let err = Ontology::from_definitions(table).unwrap_err();
        assert_matches!(err, HubError::OntologyConflict(_));
    }

    #[test]
    fn fallback_uri_is_component_encoded() {
        let def = PollutantDefinition::fallback("noise level (dB)", None);
        assert_eq!(def.definition, "http://example.org/property/noise%20level%20(dB)");
        assert_eq!(def.unit, "?");
        assert_eq!(def.unit_name, "Unknown");
    }
}
