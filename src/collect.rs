//! One-shot collection: fetch a provider's upstream listing, compact it and
//! store it as the source's latest payload. Scheduling is left to the caller.

use std::thread;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;

use crate::error::HubError;
use crate::sources::SourceConfig;
use crate::store::PayloadStore;

pub trait UpstreamClient: Send + Sync {
    fn fetch_json(&self, url: &str) -> Result<Value, HubError>;
}

impl<C: UpstreamClient + ?Sized> UpstreamClient for &C {
    fn fetch_json(&self, url: &str) -> Result<Value, HubError> {
        (**self).fetch_json(url)
    }
}

#[derive(Clone)]
pub struct HttpUpstreamClient {
    client: Client,
}

impl HttpUpstreamClient {
    pub fn new() -> Result<Self, HubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("st-hub/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HubError::UpstreamHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| HubError::UpstreamHttp(err.to_string()))?;
        Ok(Self { client })
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, HubError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        tracing::warn!(url, status, attempt, "upstream busy, retrying");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        tracing::warn!(url, error = %err, attempt, "upstream request failed, retrying");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(HubError::UpstreamHttp(err.to_string()));
                }
            }
        }
    }
}

impl UpstreamClient for HttpUpstreamClient {
    fn fetch_json(&self, url: &str) -> Result<Value, HubError> {
        let response = self.send_with_retries(url)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "upstream request failed".to_string());
            return Err(HubError::UpstreamStatus { status, message });
        }
        response
            .json::<Value>()
            .map_err(|err| HubError::UpstreamHttp(err.to_string()))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectReport {
    pub source: String,
    pub collector: String,
    pub items: usize,
    pub collected_at: String,
}

pub struct Collector<C: UpstreamClient, S: PayloadStore> {
    client: C,
    store: S,
}

impl<C: UpstreamClient, S: PayloadStore> Collector<C, S> {
    pub fn new(client: C, store: S) -> Self {
        Self { client, store }
    }

    pub fn collect(&self, source: &SourceConfig) -> Result<CollectReport, HubError> {
        tracing::info!(source = %source.key, endpoint = %source.endpoint, "collecting");
        let upstream = self.client.fetch_json(&source.endpoint)?;
        let items = source.kind.compact(upstream)?;
        let payload =
            serde_json::to_vec(&items).map_err(|err| HubError::Serialization(err.to_string()))?;
        self.store.persist(&source.collector, &payload)?;
        tracing::info!(source = %source.key, items = items.len(), "stored payload");

        Ok(CollectReport {
            source: source.key.to_string(),
            collector: source.collector.clone(),
            items: items.len(),
            collected_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(429));
        assert!(!is_retryable_status(404));
    }
}
