//! Request DTOs for the control plane
//!
//! Defines the structure of incoming invalidation bodies.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// Body of a write-method invalidation request.
///
/// `_keys` maps cache keys to the values to store after eviction. String
/// values are stored verbatim, anything else as its JSON text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReseedBody {
    #[serde(rename = "_keys", default)]
    pub keys: BTreeMap<String, Value>,
}

impl ReseedBody {
    pub fn into_pairs(self) -> BTreeMap<String, String> {
        self.keys
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect()
    }
}

/// Keys to evict and values to write afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub target_keys: Vec<String>,
    pub reseed: BTreeMap<String, String>,
}

impl InvalidationRequest {
    pub fn new<S: Into<String>>(targets: impl IntoIterator<Item = S>) -> Self {
        Self {
            target_keys: targets.into_iter().map(Into::into).collect(),
            reseed: BTreeMap::new(),
        }
    }

    pub fn with_reseed(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.reseed.insert(key.into(), value.into());
        self
    }

    pub fn with_reseed_pairs(mut self, pairs: BTreeMap<String, String>) -> Self {
        self.reseed.extend(pairs);
        self
    }
}
