//! Claim set: the payload of a compact token
//!
//! A thin newtype over a JSON object. All claim addressing goes through
//! the configurable [`ClaimNames`](am_shared::config::ClaimNames)
//! registry, so nothing in the engine hard-codes wire keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping from claim key to value
///
/// Values are JSON scalars (string, integer, boolean, null) plus arrays
/// for list-valued claims such as role ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Creates an empty claim set
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Number of claims present
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set carries no claims
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether a claim key is present
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Raw claim value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String-typed claim value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer-typed claim value
    ///
    /// Booleans are not integers even though JSON lets them coerce in
    /// some ecosystems; only actual numbers qualify.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Boolean-typed claim value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Epoch-seconds claim as a UTC datetime
    pub fn get_datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_i64(key)
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Insert a claim, returning any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Insert a datetime claim as epoch seconds
    pub fn insert_datetime(&mut self, key: impl Into<String>, at: DateTime<Utc>) -> Option<Value> {
        self.insert(key, Value::from(at.timestamp()))
    }

    /// Remove a claim
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Merge another claim set into this one; keys in `other` win
    pub fn merge(&mut self, other: &ClaimSet) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Iterate over (key, value) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Convert datetime-valued entries of the given claims to epoch
    /// integers
    ///
    /// Temporal claims may arrive as RFC 3339 strings or fractional
    /// numbers; the wire format requires integer seconds. Unparseable
    /// strings and non-temporal values are left untouched for the
    /// validator to reject.
    pub fn normalize_time_claims<'a>(&mut self, time_claims: impl IntoIterator<Item = &'a str>) {
        for key in time_claims {
            let normalized = match self.0.get(key) {
                Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| Value::from(dt.timestamp())),
                Some(Value::Number(n)) if !n.is_i64() && !n.is_u64() => {
                    n.as_f64().map(|f| Value::from(f as i64))
                }
                _ => None,
            };
            if let Some(value) = normalized {
                self.0.insert(key.to_string(), value);
            }
        }
    }

    /// Access the underlying JSON map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<ClaimSet> for Map<String, Value> {
    fn from(claims: ClaimSet) -> Self {
        claims.0
    }
}

impl FromIterator<(String, Value)> for ClaimSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
