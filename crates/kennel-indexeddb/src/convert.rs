//! Conversions between kennel records/keys and JS values
//!
//! Records cross the boundary as JSON, so only JSON-representable values are
//! stored. Keys are numbers, strings or arrays of keys.

use js_sys::{Array, JSON};
use kennel_core::{Key, KeyPath, Record};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DomStringList;

use crate::error::{IndexedDbError, Result};

/// Convert a record to a plain JS object.
pub fn record_to_js(record: &Record) -> Result<JsValue> {
    let json = serde_json::to_string(record)?;
    JSON::parse(&json).map_err(IndexedDbError::from)
}

/// Convert a JS object back into a record.
pub fn record_from_js(val: &JsValue) -> Result<Record> {
    let json: String = JSON::stringify(val)
        .map_err(IndexedDbError::from)?
        .into();
    let value: serde_json::Value = serde_json::from_str(&json)?;
    Record::try_from(value).map_err(|_| IndexedDbError::JsValue("stored value is not an object".into()))
}

/// Convert the result of a `getAll` request.
pub fn records_from_js(val: &JsValue) -> Result<Vec<Record>> {
    let array = val
        .dyn_ref::<Array>()
        .ok_or_else(|| IndexedDbError::JsValue("getAll result is not an array".into()))?;
    array.iter().map(|item| record_from_js(&item)).collect()
}

pub fn key_to_js(key: &Key) -> JsValue {
    match key {
        Key::Number(n) => JsValue::from_f64(*n as f64),
        Key::Text(s) => JsValue::from_str(s),
        Key::Array(parts) => parts.iter().map(key_to_js).collect::<Array>().into(),
    }
}

pub fn key_from_js(val: &JsValue) -> Result<Key> {
    if let Some(n) = val.as_f64() {
        if n.fract() == 0.0 && n.abs() <= i64::MAX as f64 {
            return Ok(Key::Number(n as i64));
        }
        return Err(IndexedDbError::JsValue(format!("unsupported numeric key {}", n)));
    }
    if let Some(s) = val.as_string() {
        return Ok(Key::Text(s));
    }
    if Array::is_array(val) {
        let parts = Array::from(val)
            .iter()
            .map(|part| key_from_js(&part))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Key::Array(parts));
    }
    Err(IndexedDbError::JsValue(format!("unsupported key {:?}", val)))
}

pub fn key_path_to_js(path: &KeyPath) -> JsValue {
    match path {
        KeyPath::Attribute(attr) => JsValue::from_str(attr),
        KeyPath::Compound(attrs) => attrs
            .iter()
            .map(|a| JsValue::from_str(a))
            .collect::<Array>()
            .into(),
    }
}

/// Only inline key paths are supported; a store without one is rejected.
pub fn key_path_from_js(val: &JsValue) -> Result<KeyPath> {
    if let Some(s) = val.as_string() {
        return Ok(KeyPath::Attribute(s));
    }
    if Array::is_array(val) {
        let attrs = Array::from(val)
            .iter()
            .map(|a| {
                a.as_string()
                    .ok_or_else(|| IndexedDbError::JsValue("key path entry is not a string".into()))
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok(KeyPath::Compound(attrs));
    }
    Err(IndexedDbError::JsValue("object store has no inline key path".into()))
}

pub fn string_list(list: &DomStringList) -> Vec<String> {
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}
