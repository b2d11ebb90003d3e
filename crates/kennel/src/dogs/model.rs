//! Dog records and their table-row rendering

use kennel_core::Record;
use serde_json::Value;

use crate::html::{button, td, td_html, tr};

/// Object store holding dogs.
pub const STORE: &str = "dogs";
pub const KEY_PATH: &str = "id";
pub const BREED_INDEX: &str = "breed-index";
pub const NAME_INDEX: &str = "name-index";

/// Element the row fragments are swapped into.
pub const TABLE_BODY: &str = "#dog-table-body";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dog {
    pub id: Option<i64>,
    pub name: String,
    pub breed: String,
}

impl Dog {
    pub fn new(name: impl Into<String>, breed: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            breed: breed.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Read a dog out of a stored record. Missing or non-string fields are empty.
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.get(KEY_PATH).and_then(Value::as_i64),
            name: record.get_str("name").unwrap_or_default().to_string(),
            breed: record.get_str("breed").unwrap_or_default().to_string(),
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new().with("name", self.name.as_str()).with("breed", self.breed.as_str());
        if let Some(id) = self.id {
            record.set(KEY_PATH, id);
        }
        record
    }

    /// Table row with a delete button for this dog.
    pub fn to_row(&self) -> String {
        let id = self.id.map(|id| id.to_string()).unwrap_or_default();
        let target = format!("/dog/{}", id);
        tr(&[
            td(&id),
            td(&self.name),
            td(&self.breed),
            td_html(button(
                &[
                    ("hx-confirm", "Are you sure?"),
                    ("hx-delete", target.as_str()),
                    ("hx-target", TABLE_BODY),
                ],
                "🗑",
            )),
        ])
    }
}

/// Record built from submitted form fields. Every field is kept except `id`,
/// which the store assigns.
pub fn record_from_form(fields: &[(String, String)]) -> Record {
    fields
        .iter()
        .filter(|(name, _)| name != KEY_PATH)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Rows for every dog, in store order.
pub fn rows(records: &[Record]) -> String {
    records.iter().map(|r| Dog::from_record(r).to_row()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_markup() {
        let row = Dog::new("Comet", "Whippet").with_id(1).to_row();
        assert_eq!(
            row,
            "<tr><td>1</td><td>Comet</td><td>Whippet</td><td>\
             <button hx-confirm=\"Are you sure?\" hx-delete=\"/dog/1\" hx-target=\"#dog-table-body\">🗑</button>\
             </td></tr>"
        );
    }

    #[test]
    fn test_record_round_trip() {
        let dog = Dog::new("Oscar", "German Shorthaired Pointer").with_id(2);
        assert_eq!(Dog::from_record(&dog.to_record()), dog);
    }

    #[test]
    fn test_form_ignores_id() {
        let fields = vec![
            ("id".to_string(), "99".to_string()),
            ("name".to_string(), "Rex".to_string()),
            ("breed".to_string(), "Beagle".to_string()),
        ];
        let record = record_from_form(&fields);
        assert!(!record.contains("id"));
        assert_eq!(record.get_str("name"), Some("Rex"));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let dog = Dog::from_record(&Record::new().with("id", 5));
        assert_eq!(dog, Dog::new("", "").with_id(5));
    }
}
