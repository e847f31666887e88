use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum HubError {
    #[error("invalid source key: {0}")]
    InvalidSourceKey(String),

    #[error("unknown source: {0}")]
    #[diagnostic(help("known providers are `irceline` and `sensor-community`"))]
    UnknownSource(String),

    #[error("source registered twice: {0}")]
    DuplicateSource(String),

    #[error("ontology conflict: {0}")]
    OntologyConflict(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Thing({0}) not found")]
    ThingNotFound(String),

    #[error("payload for {source_name} is not a JSON array: {message}")]
    PayloadParse {
        source_name: String,
        message: String,
    },

    #[error("failed to serialize response: {0}")]
    Serialization(String),

    #[error("payload storage failed: {0}")]
    Storage(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("upstream request failed: {0}")]
    UpstreamHttp(String),

    #[error("upstream returned status {status}: {message}")]
    UpstreamStatus { status: u16, message: String },
}

impl HubError {
    /// HTTP-equivalent status for the routing layer.
    pub fn status_code(&self) -> u16 {
        match self {
            HubError::ThingNotFound(_) => 404,
            HubError::InvalidSourceKey(_) | HubError::UnknownSource(_) => 400,
            _ => 500,
        }
    }
}
