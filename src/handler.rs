//! Endpoint methods producing routing-layer responses.
//!
//! Path dispatch belongs to the caller; each method here corresponds to one
//! read-only SensorThings path and returns a JSON [`DataResponse`]. Lookups
//! that find nothing become 404 responses. Storage failures are returned as
//! `Err` so the routing layer fails the request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregator::UnifiedQuery;
use crate::error::HubError;
use crate::model::Collection;
use crate::store::PayloadStore;

pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResponse {
    pub status: u16,
    pub content: String,
    pub headers: BTreeMap<String, String>,
}

impl DataResponse {
    pub fn json<T: Serialize + ?Sized>(status: u16, body: &T) -> Result<Self, HubError> {
        let content = serde_json::to_string(body)
            .map_err(|err| HubError::Serialization(err.to_string()))?;
        Ok(Self {
            status,
            content,
            headers: BTreeMap::from([("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string())]),
        })
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content: serde_json::json!({ "error": message }).to_string(),
            headers: BTreeMap::from([("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string())]),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Query string parameters accepted by the collection endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
}

impl QueryParams {
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref().filter(|value| !value.trim().is_empty())
    }

    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerConfiguration {
    pub name: &'static str,
    pub description: &'static str,
    pub content_type: &'static str,
    pub tags: Vec<&'static str>,
}

pub struct SensorThingsHandler<S: PayloadStore> {
    query: UnifiedQuery<S>,
}

impl<S: PayloadStore> SensorThingsHandler<S> {
    pub fn new(query: UnifiedQuery<S>) -> Self {
        Self { query }
    }

    pub fn query(&self) -> &UnifiedQuery<S> {
        &self.query
    }

    pub fn configuration(&self) -> HandlerConfiguration {
        HandlerConfiguration {
            name: "unified_sensorthings",
            description: "Unified SensorThings API",
            content_type: CONTENT_TYPE_JSON,
            tags: vec!["SensorThings"],
        }
    }

    /// `GET /Things`
    pub fn get_things(&self, params: &QueryParams) -> Result<DataResponse, HubError> {
        collection(self.query.list_things(params.source())?)
    }

    /// `GET /Things/{id}`
    pub fn get_thing(&self, id: &str) -> Result<DataResponse, HubError> {
        match self.query.get_thing(id) {
            Ok(thing) => DataResponse::json(200, &thing),
            Err(err @ HubError::ThingNotFound(_)) => {
                Ok(DataResponse::error(err.status_code(), &err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    /// `GET /Datastreams`
    pub fn get_datastreams(&self, params: &QueryParams) -> Result<DataResponse, HubError> {
        collection(
            self.query
                .list_datastreams(params.source(), params.property())?,
        )
    }

    /// `GET /Observations`
    pub fn get_observations(&self, params: &QueryParams) -> Result<DataResponse, HubError> {
        collection(
            self.query
                .list_observations(params.source(), params.property())?,
        )
    }

    /// `GET /ObservedProperties`
    pub fn get_observed_properties(&self, params: &QueryParams) -> Result<DataResponse, HubError> {
        collection(self.query.list_observed_properties(params.source())?)
    }

    /// `GET /sources`
    pub fn get_sources(&self) -> Result<DataResponse, HubError> {
        DataResponse::json(200, &self.query.sources())
    }
}

fn collection<T: Serialize>(items: Collection<T>) -> Result<DataResponse, HubError> {
    DataResponse::json(200, &items)
}
