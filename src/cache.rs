use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::record::RecordSet;

/// Memoization layer for analysis results, kept outside the computation
/// core: analyses stay pure functions and callers opt into caching by
/// routing calls through here.
///
/// Keys hash the operation id, the record set's content fingerprint, and
/// the serialized parameters, so a cache never serves results computed
/// from different data. Values are stored as JSON.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: HashMap<u64, Value>,
    hits: u64,
    misses: u64,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for (operation, records, params) or runs
    /// `compute` and stores its result. Errors from `compute` are
    /// propagated and nothing is cached for them.
    pub fn get_or_compute<P, T, F>(
        &mut self,
        operation: &str,
        records: &RecordSet,
        params: &P,
        compute: F,
    ) -> Result<T>
    where
        P: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = cache_key(operation, records.fingerprint(), params)?;

        if let Some(value) = self.entries.get(&key) {
            self.hits += 1;
            debug!("cache hit for {operation}");
            return Ok(serde_json::from_value(value.clone())?);
        }

        self.misses += 1;
        debug!("cache miss for {operation}");
        let result = compute()?;
        self.entries.insert(key, serde_json::to_value(&result)?);
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

fn cache_key<P: Serialize>(operation: &str, fingerprint: u64, params: &P) -> Result<u64> {
    let params_json = serde_json::to_string(params)?;

    let mut hasher = DefaultHasher::new();
    operation.hash(&mut hasher);
    fingerprint.hash(&mut hasher);
    params_json.hash(&mut hasher);
    Ok(hasher.finish())
}
