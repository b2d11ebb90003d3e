//! Record keys and key paths

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A valid record-store key.
///
/// Keys order the same way the browser engine orders them: every number sorts
/// before every string, and every string before every array. Arrays compare
/// element by element, a shorter prefix sorting first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Number(i64),
    Text(String),
    Array(Vec<Key>),
}

impl Key {
    /// Build a key from a JSON value.
    ///
    /// Returns `None` for values that cannot be keys: null, booleans, objects,
    /// fractional numbers and arrays holding any of those.
    pub fn from_value(value: &Value) -> Option<Key> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(Key::Number(i));
                }
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                    Some(Key::Number(f as i64))
                } else {
                    None
                }
            }
            Value::String(s) => Some(Key::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            Value::Null | Value::Bool(_) | Value::Object(_) => None,
        }
    }

    /// Convert back into the JSON value stored in a record.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Number(n) => Value::from(*n),
            Key::Text(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_value).collect()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Key::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Number(n) => write!(f, "{}", n),
            Key::Text(s) => write!(f, "{:?}", s),
            Key::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self {
        Key::Number(n)
    }
}

impl From<i32> for Key {
    fn from(n: i32) -> Self {
        Key::Number(n.into())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

/// The attribute (or attributes) a key is read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPath {
    Attribute(String),
    Compound(Vec<String>),
}

impl KeyPath {
    /// The attribute name of a single-attribute key path.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            KeyPath::Attribute(name) => Some(name),
            KeyPath::Compound(_) => None,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self, KeyPath::Compound(_))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPath::Attribute(name) => write!(f, "{}", name),
            KeyPath::Compound(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

impl From<&str> for KeyPath {
    fn from(name: &str) -> Self {
        KeyPath::Attribute(name.to_string())
    }
}

impl From<String> for KeyPath {
    fn from(name: String) -> Self {
        KeyPath::Attribute(name)
    }
}

impl From<Vec<&str>> for KeyPath {
    fn from(names: Vec<&str>) -> Self {
        KeyPath::Compound(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for KeyPath {
    fn from(names: Vec<String>) -> Self {
        KeyPath::Compound(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        assert_eq!(Key::from_value(&json!(7)), Some(Key::Number(7)));
        assert_eq!(Key::from_value(&json!(7.0)), Some(Key::Number(7)));
        assert_eq!(Key::from_value(&json!("rex")), Some(Key::from("rex")));
        assert_eq!(
            Key::from_value(&json!([1, "a"])),
            Some(Key::Array(vec![Key::Number(1), Key::from("a")]))
        );
    }

    #[test]
    fn test_invalid_keys() {
        assert_eq!(Key::from_value(&json!(null)), None);
        assert_eq!(Key::from_value(&json!(true)), None);
        assert_eq!(Key::from_value(&json!(1.5)), None);
        assert_eq!(Key::from_value(&json!({"a": 1})), None);
        assert_eq!(Key::from_value(&json!([1, null])), None);
    }

    #[test]
    fn test_ordering() {
        let mut keys = vec![
            Key::Array(vec![Key::Number(1)]),
            Key::from("b"),
            Key::Number(10),
            Key::from("a"),
            Key::Number(-3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                Key::Number(-3),
                Key::Number(10),
                Key::from("a"),
                Key::from("b"),
                Key::Array(vec![Key::Number(1)]),
            ]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::Number(3).to_string(), "3");
        assert_eq!(Key::from("x").to_string(), "\"x\"");
        assert_eq!(KeyPath::from(vec!["a", "b"]).to_string(), "[a, b]");
    }
}
