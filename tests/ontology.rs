use sensorthings_hub::ontology::{Ontology, PollutantDefinition};

#[test]
fn aliases_resolve_to_one_definition() {
    let ontology = Ontology::standard().unwrap();
    let canonical = ontology.resolve("PM10").unwrap();
    for label in ["P1", "pm10", "PM 10", "p1"] {
        assert_eq!(ontology.resolve(label), Some(canonical), "{label}");
    }
    assert_eq!(canonical.definition, "http://dd.eionet.europa.eu/vocabulary/aq/pollutant/5");
}

#[test]
fn names_resolve_case_insensitively() {
    let ontology = Ontology::standard().unwrap();
    assert_eq!(ontology.resolve("relative humidity").unwrap().id, "humidity");
    assert_eq!(ontology.resolve("SULFUR DIOXIDE").unwrap().id, "SO2");
    assert_eq!(ontology.resolve("Air Temperature").unwrap().unit, "°C");
}

#[test]
fn unknown_property_falls_back_to_its_own_label() {
    let ontology = Ontology::standard().unwrap();
    assert!(ontology.resolve("benzene").is_none());

    let fallback = ontology.resolve_or_fallback("benzene", Some("µg/m³"));
    assert_eq!(fallback.id, "benzene");
    assert_eq!(fallback.name, "benzene");
    assert_eq!(fallback.description, "Measurement of benzene");
    assert_eq!(fallback.unit, "µg/m³");
    assert_eq!(fallback.definition, "http://example.org/property/benzene");
    assert!(fallback.unit_definition.ends_with("#Unknown"));
}

#[test]
fn custom_table() {
    let ontology = Ontology::from_definitions(vec![PollutantDefinition {
        aliases: vec!["bz".to_string()],
        ..PollutantDefinition::fallback("C6H6", Some("µg/m³"))
    }])
    .unwrap();
    assert_eq!(ontology.resolve("BZ").unwrap().id, "C6H6");
    assert!(ontology.resolve("PM10").is_none());
}
