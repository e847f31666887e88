use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::sync::RwLock;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use tempfile::Builder;

use crate::error::HubError;

/// The storage collaborator: latest raw payload per collector name.
pub trait PayloadStore: Send + Sync {
    /// `Ok(None)` when nothing was ever collected under `name`.
    fn latest_raw_payload(&self, name: &str) -> Result<Option<Vec<u8>>, HubError>;
    fn persist(&self, name: &str, payload: &[u8]) -> Result<(), HubError>;
}

impl<S: PayloadStore + ?Sized> PayloadStore for &S {
    fn latest_raw_payload(&self, name: &str) -> Result<Option<Vec<u8>>, HubError> {
        (**self).latest_raw_payload(name)
    }

    fn persist(&self, name: &str, payload: &[u8]) -> Result<(), HubError> {
        (**self).persist(name, payload)
    }
}

/// One directory per collector, holding `latest.json`.
#[derive(Debug, Clone)]
pub struct FsPayloadStore {
    root: Utf8PathBuf,
}

impl FsPayloadStore {
    pub fn new() -> Result<Self, HubError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".cache")
                        .join("sensorthings-hub")
                        .join("payloads"),
                )
                .ok()
            })
            .ok_or_else(|| HubError::Filesystem("unable to resolve cache directory".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn latest_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name).join("latest.json")
    }

    fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HubError> {
        let parent = path
            .parent()
            .ok_or_else(|| HubError::Storage("invalid payload path".to_string()))?;
        fs::create_dir_all(parent.as_std_path()).map_err(|err| HubError::Storage(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("payload")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| HubError::Storage(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| HubError::Storage(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| HubError::Storage(err.to_string()))?;
        Ok(())
    }
}

impl PayloadStore for FsPayloadStore {
    fn latest_raw_payload(&self, name: &str) -> Result<Option<Vec<u8>>, HubError> {
        let path = self.latest_path(name);
        match fs::read(path.as_std_path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(HubError::Storage(format!("read {path}: {err}"))),
        }
    }

    fn persist(&self, name: &str, payload: &[u8]) -> Result<(), HubError> {
        Self::write_atomic(&self.latest_path(name), payload)
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryPayloadStore {
    payloads: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryPayloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(self, name: &str, payload: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut payloads) = self.payloads.write() {
            payloads.insert(name.to_string(), payload.into());
        }
        self
    }
}

impl PayloadStore for MemoryPayloadStore {
    fn latest_raw_payload(&self, name: &str) -> Result<Option<Vec<u8>>, HubError> {
        let payloads = self
            .payloads
            .read()
            .map_err(|_| HubError::Storage("payload lock poisoned".to_string()))?;
        Ok(payloads.get(name).cloned())
    }

    fn persist(&self, name: &str, payload: &[u8]) -> Result<(), HubError> {
        let mut payloads = self
            .payloads
            .write()
            .map_err(|_| HubError::Storage("payload lock poisoned".to_string()))?;
        payloads.insert(name.to_string(), payload.to_vec());
        Ok(())
    }
}
