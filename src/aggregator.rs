use std::collections::HashSet;
use std::thread;

use serde_json::Value;

use crate::error::HubError;
use crate::filter;
use crate::model::{
    Collection, EnrichedObservation, LinkedDatastream, ObservedPropertySummary, SourceSummary,
    Thing,
};
use crate::ontology::Ontology;
use crate::sources::{SourceConfig, SourceRegistry, parse_payload};
use crate::store::PayloadStore;

pub const DEFAULT_BASE_URL: &str = "/api/sensorthings/v1.1";

/// Merges the Things of every registered source and answers collection
/// queries over them. Everything is derived from the latest stored payloads
/// on each call; nothing is cached between calls.
pub struct UnifiedQuery<S: PayloadStore> {
    store: S,
    registry: SourceRegistry,
    ontology: Ontology,
    base_url: String,
}

impl<S: PayloadStore> UnifiedQuery<S> {
    pub fn new(store: S, registry: SourceRegistry, ontology: Ontology) -> Self {
        Self {
            store,
            registry,
            ontology,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn sources(&self) -> Vec<SourceSummary> {
        self.registry.iter().map(SourceConfig::summary).collect()
    }

    pub fn list_things(&self, source: Option<&str>) -> Result<Collection<Thing>, HubError> {
        Ok(Collection::new(self.fetch_things(source)?))
    }

    pub fn get_thing(&self, id: &str) -> Result<Thing, HubError> {
        self.fetch_things(None)?
            .into_iter()
            .find(|thing| thing.id == id)
            .ok_or_else(|| HubError::ThingNotFound(id.to_string()))
    }

    pub fn list_datastreams(
        &self,
        source: Option<&str>,
        property: Option<&str>,
    ) -> Result<Collection<LinkedDatastream>, HubError> {
        let mut datastreams = Vec::new();
        for thing in self.fetch_things(source)? {
            let thing_link = self.link("Things", &thing.id);
            datastreams.extend(thing.datastreams.into_iter().map(|datastream| {
                LinkedDatastream {
                    datastream,
                    thing_link: thing_link.clone(),
                }
            }));
        }
        Ok(Collection::new(filter::apply(datastreams, property)))
    }

    pub fn list_observations(
        &self,
        source: Option<&str>,
        property: Option<&str>,
    ) -> Result<Collection<EnrichedObservation>, HubError> {
        let mut observations = Vec::new();
        for thing in self.fetch_things(source)? {
            let location = thing.location().cloned();
            for datastream in &thing.datastreams {
                let datastream_link = self.link("Datastreams", &datastream.id);
                for observation in &datastream.observations {
                    observations.push(EnrichedObservation {
                        observation: observation.clone(),
                        observed_property: datastream.observed_property.name.clone(),
                        observed_property_id: datastream.observed_property.id.clone(),
                        unit: datastream.unit_of_measurement.symbol.clone(),
                        station_id: thing.id.clone(),
                        station_name: thing.name.clone(),
                        location: location.clone(),
                        datastream_link: datastream_link.clone(),
                    });
                }
            }
        }
        Ok(Collection::new(filter::apply(observations, property)))
    }

    pub fn list_observed_properties(
        &self,
        source: Option<&str>,
    ) -> Result<Collection<ObservedPropertySummary>, HubError> {
        let mut seen = HashSet::new();
        let mut properties = Vec::new();
        for thing in self.fetch_things(source)? {
            for datastream in thing.datastreams {
                let property = datastream.observed_property;
                if seen.insert(property.id.clone()) {
                    properties.push(ObservedPropertySummary {
                        self_link: self.link("ObservedProperties", &property.id),
                        property,
                    });
                }
            }
        }
        Ok(Collection::new(properties))
    }

    fn link(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}({id})", self.base_url)
    }

    fn fetch_things(&self, source: Option<&str>) -> Result<Vec<Thing>, HubError> {
        let selected = self.registry.select(source);
        if selected.is_empty() {
            tracing::debug!(source = ?source, "no registered source matches the filter");
        }

        let results = if selected.len() <= 1 {
            selected
                .iter()
                .map(|config| self.fetch_source(config))
                .collect::<Vec<_>>()
        } else {
            thread::scope(|scope| {
                let handles = selected
                    .iter()
                    .map(|config| scope.spawn(move || self.fetch_source(config)))
                    .collect::<Vec<_>>();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(HubError::Storage("source worker panicked".to_string()))
                        })
                    })
                    .collect::<Vec<_>>()
            })
        };

        let mut things = Vec::new();
        for result in results {
            if let Some(source_things) = result? {
                things.extend(source_things);
            }
        }
        Ok(things)
    }

    fn fetch_source(&self, config: &SourceConfig) -> Result<Option<Vec<Thing>>, HubError> {
        let source = config.key.as_str();
        let Some(payload) = self.store.latest_raw_payload(&config.collector)? else {
            tracing::info!(source, collector = %config.collector, "no payload collected yet, skipping source");
            return Ok(None);
        };

        let items = match parse_payload(source, &payload) {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(source, error = %err, "stored payload unreadable, skipping source");
                return Ok(None);
            }
        };

        let mut things = (config.transform)(&self.ontology, &items);
        for thing in &mut things {
            thing.id = format!("{source}-{}", thing.id);
            for datastream in &mut thing.datastreams {
                datastream.id = format!("{source}-{}", datastream.id);
            }
            thing.self_link = self.link("Things", &thing.id);
            thing
                .properties
                .insert("source".to_string(), Value::String(source.to_string()));
        }
        tracing::debug!(source, items = items.len(), things = things.len(), "transformed payload");
        Ok(Some(things))
    }
}
