//! Short-lived read-through cache for query results.
//!
//! Entries are keyed by the exact query input and stored as JSON values, so one
//! cache holds every view type. Writes clear the whole cache.

use std::time::Duration;

use moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::handlers::{GetDiagnoses, GetPatientDiagnosticResults, GetPatients, SearchPatients};

/// One cached query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Patients(GetPatients),
    Patient(Uuid),
    PatientResults(GetPatientDiagnosticResults),
    Search(SearchPatients),
    Diagnoses(GetDiagnoses),
    PatientCount,
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<CacheKey, serde_json::Value>,
}

impl QueryCache {
    pub fn new(time_to_live: Duration, capacity: u64) -> Self {
        QueryCache {
            inner: Cache::builder()
                .time_to_live(time_to_live)
                .max_capacity(capacity)
                .build(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let value = self.inner.get(key)?;
        match serde_json::from_value(value) {
            Ok(hit) => Some(hit),
            Err(e) => {
                tracing::warn!(?key, error = %e, "dropping undecodable cache entry");
                self.inner.invalidate(key);
                None
            }
        }
    }

    pub fn insert<T: Serialize>(&self, key: CacheKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.inner.insert(key, json),
            Err(e) => tracing::warn!(?key, error = %e, "not caching unserializable value"),
        }
    }

    /// Return the cached value or run `load` and cache its success.
    pub fn get_or_load<T, E, F>(&self, key: CacheKey, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(hit) = self.get(&key) {
            tracing::debug!(?key, "cache hit");
            return Ok(hit);
        }
        let value = load()?;
        self.insert(key, &value);
        Ok(value)
    }

    pub fn invalidate_all(&self) {
        tracing::debug!("invalidating query cache");
        self.inner.invalidate_all();
    }
}
