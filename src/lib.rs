//! Unified OGC SensorThings view over heterogeneous air-quality feeds.
//!
//! Raw payloads stored per provider are transformed on every query into
//! Things, Locations, Datastreams and Observations that share one pollutant
//! ontology, then merged under source-prefixed identifiers.

pub mod aggregator;
pub mod builder;
pub mod collect;
pub mod config;
pub mod error;
pub mod filter;
pub mod handler;
pub mod model;
pub mod ontology;
pub mod output;
pub mod sources;
pub mod store;
