// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config service and storage port.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// No platform config directory could be resolved.
    #[error("no config directory")]
    NoConfigDir,
}

/// Where a loaded value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loaded {
    /// Read from the store.
    Stored,
    /// Absent; defaults were written back.
    Defaulted,
}

/// Serializes config values as JSON and delegates storage to a `ConfigStore`.
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load `key`, or persist and return `T::default()` when it is missing.
    /// A stored value that fails to parse is an error, never overwritten.
    pub fn load_or_default<T>(&self, key: &str) -> Result<(T, Loaded), ConfigError>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        if let Some(value) = self.load(key)? {
            return Ok((value, Loaded::Stored));
        }
        let value = T::default();
        self.save(key, &value)?;
        Ok((value, Loaded::Defaulted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0.borrow().get(key).cloned().ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        port: u16,
    }

    #[test]
    fn missing_key_persists_defaults_once() {
        let service = ConfigService::new(MapStore::default());
        let (value, from) = service.load_or_default::<Sample>("table").unwrap();
        assert_eq!((value, from), (Sample::default(), Loaded::Defaulted));
        let (_, from) = service.load_or_default::<Sample>("table").unwrap();
        assert_eq!(from, Loaded::Stored);
    }

    #[test]
    fn corrupt_value_is_reported_not_overwritten() {
        let store = MapStore::default();
        store.save_raw("table", b"{not json").unwrap();
        let service = ConfigService::new(store);
        assert!(matches!(
            service.load_or_default::<Sample>("table"),
            Err(ConfigError::Serde(_))
        ));
        assert_eq!(
            service.into_inner().load_raw("table").unwrap(),
            b"{not json".to_vec()
        );
    }

    #[test]
    fn empty_blob_reads_as_missing() {
        let store = MapStore::default();
        store.save_raw("table", b"").unwrap();
        let service = ConfigService::new(store);
        assert_eq!(service.load::<Sample>("table").unwrap(), None);
    }
}
