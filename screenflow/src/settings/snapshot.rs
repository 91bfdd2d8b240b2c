//! Immutable configuration snapshots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// All configuration parameters that influence pipeline output.
///
/// Two snapshots are equivalent when their [`canonical_json`] strings are
/// byte-identical, which holds regardless of insertion order at any nesting
/// depth.
///
/// [`canonical_json`]: SettingsSnapshot::canonical_json
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSnapshot {
    params: BTreeMap<String, Value>,
}

impl SettingsSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Gets a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true if the snapshot has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates over parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.params.iter()
    }

    /// Renders the order-independent serialization used for fingerprinting.
    ///
    /// Object keys are sorted recursively and the output is compact JSON.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        let root: Map<String, Value> = self
            .params
            .iter()
            .map(|(key, value)| (key.clone(), canonicalize(value)))
            .collect();
        Value::Object(root).to_string()
    }
}

impl FromIterator<(String, Value)> for SettingsSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), canonicalize(inner)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_top_level() {
        let a = SettingsSnapshot::new().with("threads", 4).with("min_rs", 80);
        let b = SettingsSnapshot::new().with("min_rs", 80).with("threads", 4);
        assert_eq!(a.canonical_json(), b.canonical_json());
        assert_eq!(a.canonical_json(), r#"{"min_rs":80,"threads":4}"#);
    }

    #[test]
    fn test_canonical_json_sorts_nested_objects() {
        let mut nested = Map::new();
        nested.insert("z".into(), json!(true));
        nested.insert("a".into(), json!({"y": 1, "b": 2}));
        let snapshot = SettingsSnapshot::new().with("trend", Value::Object(nested));

        assert_eq!(
            snapshot.canonical_json(),
            r#"{"trend":{"a":{"b":2,"y":1},"z":true}}"#
        );
    }

    #[test]
    fn test_array_order_is_significant() {
        let a = SettingsSnapshot::new().with("list", json!([1, 2]));
        let b = SettingsSnapshot::new().with("list", json!([2, 1]));
        assert_ne!(a.canonical_json(), b.canonical_json());
    }
}
