//! Record and schema type definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::key::{Key, KeyPath};

/// A record: an insertion-ordered mapping of attribute name to value,
/// including the store's key attribute once a key has been assigned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Read the key at `key_path`.
    ///
    /// `None` when an attribute is missing or its value is not a valid key.
    pub fn key_at(&self, key_path: &KeyPath) -> Option<Key> {
        match key_path {
            KeyPath::Attribute(name) => self.0.get(name).and_then(Key::from_value),
            KeyPath::Compound(names) => names
                .iter()
                .map(|name| self.0.get(name).and_then(Key::from_value))
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl TryFrom<Value> for Record {
    type Error = Value;

    /// Only JSON objects are records; anything else is handed back.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

/// Configuration of an object store, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreParams {
    pub key_path: KeyPath,
    #[serde(default)]
    pub auto_increment: bool,
}

impl StoreParams {
    pub fn new(key_path: impl Into<KeyPath>, auto_increment: bool) -> Self {
        Self {
            key_path: key_path.into(),
            auto_increment,
        }
    }
}

/// Options for a secondary index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    /// Reject a second record with the same index key.
    #[serde(default)]
    pub unique: bool,
    /// Index every element of an array attribute separately.
    #[serde(default)]
    pub multi_entry: bool,
}

impl IndexParams {
    pub fn unique(unique: bool) -> Self {
        Self {
            unique,
            ..Default::default()
        }
    }
}

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
    /// Schema mutation during an upgrade. Only the engine creates these.
    VersionChange,
}

impl TransactionMode {
    pub fn can_write(self) -> bool {
        !matches!(self, TransactionMode::ReadOnly)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionMode::ReadOnly => "readonly",
            TransactionMode::ReadWrite => "readwrite",
            TransactionMode::VersionChange => "versionchange",
        }
    }
}

/// Old and new version numbers handed to an upgrade routine.
///
/// `old_version` is 0 when the database did not exist before this open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionChange {
    pub old_version: u32,
    pub new_version: u32,
}

impl VersionChange {
    pub fn is_initial(&self) -> bool {
        self.old_version == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_at_attribute() {
        let record = Record::new().with("id", 4).with("name", "Comet");
        assert_eq!(record.key_at(&"id".into()), Some(Key::Number(4)));
        assert_eq!(record.key_at(&"name".into()), Some(Key::from("Comet")));
        assert_eq!(record.key_at(&"breed".into()), None);
    }

    #[test]
    fn test_key_at_compound() {
        let record = Record::new().with("name", "Comet").with("breed", "Whippet");
        assert_eq!(
            record.key_at(&vec!["breed", "name"].into()),
            Some(Key::Array(vec![Key::from("Whippet"), Key::from("Comet")]))
        );
        assert_eq!(record.key_at(&vec!["breed", "age"].into()), None);
    }

    #[test]
    fn test_attribute_order_preserved() {
        let record = Record::new().with("name", "Oscar").with("breed", "Pointer").with("id", 2);
        let names: Vec<&String> = record.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["name", "breed", "id"]);
    }

    #[test]
    fn test_try_from_value() {
        assert!(Record::try_from(json!({"name": "Rex"})).is_ok());
        assert!(Record::try_from(json!([1, 2])).is_err());
    }
}
