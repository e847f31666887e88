use std::fs;

use assert_matches::assert_matches;
use serde_json::json;

use sensorthings_hub::aggregator::UnifiedQuery;
use sensorthings_hub::error::HubError;
use sensorthings_hub::model::ProviderKind;
use sensorthings_hub::ontology::Ontology;
use sensorthings_hub::sources::{SourceConfig, SourceRegistry};
use sensorthings_hub::store::{MemoryPayloadStore, PayloadStore};

struct FailingStore;

impl PayloadStore for FailingStore {
    fn latest_raw_payload(&self, _name: &str) -> Result<Option<Vec<u8>>, HubError> {
        Err(HubError::Storage("disk unavailable".to_string()))
    }

    fn persist(&self, _name: &str, _payload: &[u8]) -> Result<(), HubError> {
        Err(HubError::Storage("disk unavailable".to_string()))
    }
}

fn fixture(name: &str) -> Vec<u8> {
    fs::read(format!("tests/fixtures/{name}")).unwrap()
}

fn populated_store() -> MemoryPayloadStore {
    MemoryPayloadStore::new()
        .with_payload("irceline_sos", fixture("irceline_latest.json"))
        .with_payload(
            "sensor_community_collector",
            fixture("sensor_community_latest.json"),
        )
}

fn query(store: MemoryPayloadStore) -> UnifiedQuery<MemoryPayloadStore> {
    UnifiedQuery::new(
        store,
        SourceRegistry::air_quality().unwrap(),
        Ontology::standard().unwrap(),
    )
}

fn station(id: i64) -> serde_json::Value {
    json!({
        "id": format!("ts-{id}"),
        "uom": "µg/m³",
        "station": { "id": id, "label": format!("Station {id}"), "coordinates": [4.0, 50.0] },
        "lastValue": { "timestamp": 1700000000000i64, "value": 1.0 },
        "parameters": {
            "phenomenon": { "id": "8", "label": "Nitrogen dioxide" },
            "procedure": { "id": "p", "label": "p" }
        }
    })
}

#[test]
fn things_are_namespaced_by_source_in_registry_order() {
    let things = query(populated_store()).list_things(None).unwrap();
    let ids = things
        .items()
        .iter()
        .map(|thing| thing.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec![
            "sensor-community-7",
            "sensor-community-9",
            "irceline-1234",
            "irceline-1300"
        ]
    );
    assert_eq!(things.count(), 4);
    assert_eq!(
        things.items()[2].self_link,
        "/api/sensorthings/v1.1/Things(irceline-1234)"
    );
    assert_eq!(things.items()[2].properties["source"], json!("irceline"));
}

#[test]
fn same_upstream_id_in_two_sources_stays_distinct() {
    let payload = serde_json::to_vec(&json!([station(7)])).unwrap();
    let store = MemoryPayloadStore::new()
        .with_payload("x", payload.clone())
        .with_payload("y", payload);

    let mut registry = SourceRegistry::new();
    for (key, collector) in [("srcX", "x"), ("srcY", "y")] {
        let mut source = SourceConfig::new(key.parse().unwrap(), ProviderKind::Irceline);
        source.collector = collector.to_string();
        registry.register(source).unwrap();
    }

    let query = UnifiedQuery::new(store, registry, Ontology::standard().unwrap());
    let things = query.list_things(None).unwrap();
    let ids = things
        .items()
        .iter()
        .map(|thing| thing.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["srcX-7", "srcY-7"]);
}

#[test]
fn datastream_links_stay_distinct_across_sources() {
    let payload = serde_json::to_vec(&json!([station(7)])).unwrap();
    let store = MemoryPayloadStore::new()
        .with_payload("x", payload.clone())
        .with_payload("y", payload);

    let mut registry = SourceRegistry::new();
    for (key, collector) in [("srcX", "x"), ("srcY", "y")] {
        let mut source = SourceConfig::new(key.parse().unwrap(), ProviderKind::Irceline);
        source.collector = collector.to_string();
        registry.register(source).unwrap();
    }

    let query = UnifiedQuery::new(store, registry, Ontology::standard().unwrap());
    let datastreams = query.list_datastreams(None, None).unwrap();
    let ids = datastreams
        .items()
        .iter()
        .map(|ds| ds.datastream.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["srcX-ts-7", "srcY-ts-7"]);

    let links = query
        .list_observations(None, None)
        .unwrap()
        .into_items()
        .into_iter()
        .map(|observation| observation.datastream_link)
        .collect::<Vec<_>>();
    assert_eq!(
        links,
        vec![
            "/api/sensorthings/v1.1/Datastreams(srcX-ts-7)",
            "/api/sensorthings/v1.1/Datastreams(srcY-ts-7)"
        ]
    );
}

#[test]
fn source_filter_narrows_things() {
    let query = query(populated_store());
    let things = query.list_things(Some("irceline")).unwrap();
    assert_eq!(things.count(), 2);
    assert!(
        things
            .items()
            .iter()
            .all(|thing| thing.id.starts_with("irceline-"))
    );

    let unknown = query.list_things(Some("purpleair")).unwrap();
    assert_eq!(unknown.count(), 0);
}

#[test]
fn get_thing_by_namespaced_id() {
    let query = query(populated_store());
    let thing = query.get_thing("sensor-community-9").unwrap();
    assert_eq!(thing.name, "Sensor.Community Station 9");

    let err = query.get_thing("irceline-42").unwrap_err();
    assert_matches!(err, HubError::ThingNotFound(id) if id == "irceline-42");
}

#[test]
fn get_thing_without_any_payload_is_not_found() {
    let query = query(MemoryPayloadStore::new());
    let err = query.get_thing("irceline-1234").unwrap_err();
    assert_matches!(err, HubError::ThingNotFound(id) if id == "irceline-1234");
}

#[test]
fn missing_payload_skips_only_that_source() {
    let store = MemoryPayloadStore::new().with_payload("irceline_sos", fixture("irceline_latest.json"));
    let things = query(store).list_things(None).unwrap();
    assert_eq!(things.count(), 2);
}

#[test]
fn unreadable_payload_skips_only_that_source() {
    let store = MemoryPayloadStore::new()
        .with_payload("irceline_sos", fixture("irceline_latest.json"))
        .with_payload("sensor_community_collector", "{ truncated");
    let things = query(store).list_things(None).unwrap();
    assert_eq!(things.count(), 2);
}

#[test]
fn storage_failure_propagates() {
    let query = UnifiedQuery::new(
        FailingStore,
        SourceRegistry::air_quality().unwrap(),
        Ontology::standard().unwrap(),
    );
    assert_matches!(query.list_things(None), Err(HubError::Storage(_)));
    assert_matches!(query.get_thing("irceline-1"), Err(HubError::Storage(_)));
}

#[test]
fn datastreams_link_back_to_their_thing() {
    let datastreams = query(populated_store())
        .list_datastreams(Some("irceline"), None)
        .unwrap();
    assert_eq!(datastreams.count(), 2);
    assert_eq!(
        datastreams.items()[0].thing_link,
        "/api/sensorthings/v1.1/Things(irceline-1234)"
    );
}

#[test]
fn property_filter_terms_are_or_ed() {
    let query = query(populated_store());
    let datastreams = query.list_datastreams(None, Some("pm10,no2")).unwrap();
    let properties = datastreams
        .items()
        .iter()
        .map(|ds| ds.datastream.observed_property.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(properties, vec!["PM10", "NO2"]);

    let all = query.list_datastreams(None, Some(" , ")).unwrap();
    assert_eq!(all.count(), 6);
}

#[test]
fn trailing_comma_in_property_filter_matches_everything() {
    let query = query(populated_store());
    let unfiltered = query.list_datastreams(None, None).unwrap();
    assert_eq!(unfiltered.count(), 6);

    let trailing = query.list_datastreams(None, Some("pm10,")).unwrap();
    assert_eq!(trailing.count(), unfiltered.count());

    let empty = query.list_observations(None, Some("")).unwrap();
    assert_eq!(empty.count(), query.list_observations(None, None).unwrap().count());
}

#[test]
fn observations_carry_station_context() {
    let observations = query(populated_store())
        .list_observations(None, Some("PM10"))
        .unwrap();
    assert_eq!(observations.count(), 2);

    let first = &observations.items()[0];
    assert_eq!(first.observed_property_id, "PM10");
    assert_eq!(first.unit, "µg/m³");
    assert_eq!(first.station_id, "sensor-community-9");
    assert_eq!(first.station_name, "Sensor.Community Station 9");
    assert_eq!(
        first.location.as_ref().unwrap().coordinates,
        vec![4.35, 50.85, 30.0]
    );
    assert_eq!(
        first.datastream_link,
        "/api/sensorthings/v1.1/Datastreams(sensor-community-9-77-P1)"
    );
}

#[test]
fn observed_properties_are_distinct() {
    let properties = query(populated_store())
        .list_observed_properties(None)
        .unwrap();
    let ids = properties
        .items()
        .iter()
        .map(|summary| summary.property.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["temperature", "humidity", "PM10", "PM2.5", "NO2", "O3"]);
    assert_eq!(
        properties.items()[2].self_link,
        "/api/sensorthings/v1.1/ObservedProperties(PM10)"
    );
}

#[test]
fn custom_base_url_drops_trailing_slash() {
    let query = query(populated_store()).with_base_url("https://hub.example/v1.1/");
    let thing = query.get_thing("irceline-1300").unwrap();
    assert_eq!(thing.self_link, "https://hub.example/v1.1/Things(irceline-1300)");
}
