//! Data Model: StageData threaded through a stage chain
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping accumulated across one pipeline run.
///
/// The core enforces no schema on it; a pipeline and its stages agree on
/// their own keys. A stage that returns new data replaces this object as a
/// whole, nothing is merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageData(Map<String, Value>);

impl StageData {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON value. Objects are taken as-is; anything else is stored
    /// under `"value"` so it is never lost.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Null => Self::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Self(map)
            }
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Stable fingerprint of the current contents
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(&self.0).unwrap_or_default();
        format!("blake3:{}", blake3::hash(&bytes))
    }
}

impl From<Map<String, Value>> for StageData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_object() {
        let data = StageData::from_value(json!({ "user": "u-1", "count": 2 }));
        assert_eq!(data.len(), 2);
        assert_eq!(data.get_str("user"), Some("u-1"));
    }

    #[test]
    fn test_from_scalar_and_null() {
        assert!(StageData::from_value(Value::Null).is_empty());

        let data = StageData::from_value(json!(7));
        assert_eq!(data.get("value"), Some(&json!(7)));
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = StageData::new().with("k", json!(1));
        let b = StageData::new().with("k", json!(1));
        let c = StageData::new().with("k", json!(2));

        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert!(a.digest().starts_with("blake3:"));
    }

    #[test]
    fn test_serializes_transparently() {
        let data = StageData::new().with("a", json!(true));
        assert_eq!(serde_json::to_value(&data).unwrap(), json!({ "a": true }));
    }
}
