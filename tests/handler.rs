use std::fs;

use serde_json::Value;

use sensorthings_hub::aggregator::UnifiedQuery;
use sensorthings_hub::handler::{QueryParams, SensorThingsHandler};
use sensorthings_hub::ontology::Ontology;
use sensorthings_hub::sources::SourceRegistry;
use sensorthings_hub::store::MemoryPayloadStore;

fn handler(store: MemoryPayloadStore) -> SensorThingsHandler<MemoryPayloadStore> {
    SensorThingsHandler::new(UnifiedQuery::new(
        store,
        SourceRegistry::air_quality().unwrap(),
        Ontology::standard().unwrap(),
    ))
}

fn populated() -> SensorThingsHandler<MemoryPayloadStore> {
    let store = MemoryPayloadStore::new()
        .with_payload(
            "irceline_sos",
            fs::read("tests/fixtures/irceline_latest.json").unwrap(),
        )
        .with_payload(
            "sensor_community_collector",
            fs::read("tests/fixtures/sensor_community_latest.json").unwrap(),
        );
    handler(store)
}

fn body(content: &str) -> Value {
    serde_json::from_str(content).unwrap()
}

#[test]
fn things_envelope() {
    let response = populated().get_things(&QueryParams::default()).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.headers["Content-Type"], "application/json");

    let json = body(&response.content);
    assert_eq!(json["@iot.count"], 4);
    assert_eq!(json["value"].as_array().unwrap().len(), 4);
    let thing = &json["value"][0];
    assert_eq!(thing["@iot.id"], "sensor-community-7");
    assert_eq!(thing["Locations"][0]["location"]["type"], "Point");
    assert_eq!(thing["Datastreams"][0]["ObservedProperty"]["@iot.id"], "temperature");
    assert_eq!(
        thing["Datastreams"][0]["observationType"],
        "http://www.opengis.net/def/observationType/OGC-OM/2.0/OM_Measurement"
    );
}

#[test]
fn unknown_thing_is_a_404_body() {
    let response = populated().get_thing("irceline-x").unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_success());
    assert_eq!(body(&response.content), serde_json::json!({ "error": "Thing(irceline-x) not found" }));
}

#[test]
fn empty_store_thing_lookup_is_not_found() {
    let response = handler(MemoryPayloadStore::new())
        .get_thing("irceline-1234")
        .unwrap();
    assert_eq!(response.status, 404);
    assert_eq!(body(&response.content)["error"], "Thing(irceline-1234) not found");
}

#[test]
fn blank_source_parameter_means_all_sources() {
    let params = QueryParams {
        source: Some("  ".to_string()),
        property: None,
    };
    let response = populated().get_things(&params).unwrap();
    assert_eq!(body(&response.content)["@iot.count"], 4);
}

#[test]
fn query_string_parameters_deserialize() {
    let params: QueryParams =
        serde_json::from_str(r#"{ "source": "irceline", "property": "o3" }"#).unwrap();
    let response = populated().get_observations(&params).unwrap();
    let json = body(&response.content);
    assert_eq!(json["@iot.count"], 1);
    let observation = &json["value"][0];
    assert_eq!(observation["@iot.id"], "6523-last");
    assert_eq!(observation["observedProperty"], "O3");
    assert_eq!(observation["stationId"], "irceline-1234");
    assert_eq!(observation["result"], 40.0);
    assert_eq!(
        observation["Datastream@iot.navigationLink"],
        "/api/sensorthings/v1.1/Datastreams(irceline-6523)"
    );
}

#[test]
fn datastreams_and_properties_endpoints() {
    let handler = populated();
    let datastreams = body(
        &handler
            .get_datastreams(&QueryParams {
                source: Some("sensor-community".to_string()),
                property: Some("pm".to_string()),
            })
            .unwrap()
            .content,
    );
    assert_eq!(datastreams["@iot.count"], 2);
    assert_eq!(
        datastreams["value"][0]["Thing@iot.navigationLink"],
        "/api/sensorthings/v1.1/Things(sensor-community-9)"
    );

    let properties = body(
        &handler
            .get_observed_properties(&QueryParams::default())
            .unwrap()
            .content,
    );
    assert_eq!(properties["@iot.count"], 6);
    assert_eq!(
        properties["value"][0]["@iot.selfLink"],
        "/api/sensorthings/v1.1/ObservedProperties(temperature)"
    );
}

#[test]
fn sources_listing() {
    let handler = populated();
    let json = body(&handler.get_sources().unwrap().content);
    assert_eq!(json[0]["key"], "sensor-community");
    assert_eq!(json[1]["kind"], "irceline");
    assert_eq!(json[1]["collector"], "irceline_sos");
    assert_eq!(handler.configuration().name, "unified_sensorthings");
}
