//! Inventory records and snapshots.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::InventoryCategory;
use crate::error::{Error, Result};
use crate::property_list::{ParseError, PlistValue};

/// One item reported by the profiler: a mapping from field name to value.
///
/// Any field may or may not be present; [`Record::get`] is the typed lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, PlistValue>);

impl Record {
    /// Look up `field`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldNotFound`] if the record has no such field.
    pub fn get(&self, field: &str) -> Result<&PlistValue> {
        self.0.get(field).ok_or_else(|| Error::FieldNotFound {
            field: field.to_string(),
        })
    }

    /// Look up `field`, returning `None` when absent.
    #[must_use]
    pub fn try_get(&self, field: &str) -> Option<&PlistValue> {
        self.0.get(field)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Whether `field` holds text containing `substring`.
    #[must_use]
    pub fn matches(&self, field: &str, substring: &str) -> bool {
        self.0
            .get(field)
            .is_some_and(|value| value.contains_text(substring))
    }

    /// Plain JSON object for display.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
    }
}

impl From<BTreeMap<String, PlistValue>> for Record {
    fn from(map: BTreeMap<String, PlistValue>) -> Self {
        Self(map)
    }
}

impl TryFrom<PlistValue> for Record {
    type Error = ParseError;

    fn try_from(value: PlistValue) -> Result<Self, ParseError> {
        match value {
            PlistValue::Dictionary(map) => Ok(Self(map)),
            other => Err(ParseError::UnexpectedShape(format!(
                "inventory item is not a dictionary: {other}"
            ))),
        }
    }
}

/// Extract the item list from `system_profiler -xml` output.
///
/// The output is an array with one dictionary per requested data type; the
/// items live under its `_items` key.  A data type with nothing to report
/// omits `_items`.
///
/// # Errors
///
/// Returns [`ParseError::UnexpectedShape`] if the structure differs.
pub fn records_from_profile(profile: PlistValue) -> Result<Vec<Record>, ParseError> {
    let PlistValue::Array(sections) = profile else {
        return Err(ParseError::UnexpectedShape(
            "profiler output is not an array".to_string(),
        ));
    };
    let Some(section) = sections.into_iter().next() else {
        return Ok(Vec::new());
    };
    let PlistValue::Dictionary(mut section) = section else {
        return Err(ParseError::UnexpectedShape(
            "profiler section is not a dictionary".to_string(),
        ));
    };
    match section.remove("_items") {
        None => Ok(Vec::new()),
        Some(PlistValue::Array(items)) => items.into_iter().map(Record::try_from).collect(),
        Some(_) => Err(ParseError::UnexpectedShape(
            "_items is not an array".to_string(),
        )),
    }
}

/// A cached profiler result for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// Category the items belong to.
    pub category: InventoryCategory,
    /// Items in profiler order.
    pub items: Vec<Record>,
    /// When the profiler was run.
    pub fetched_at: DateTime<Utc>,
    /// First instant at which the snapshot is stale.
    pub expires_at: DateTime<Utc>,
}

impl InventorySnapshot {
    /// Whether the snapshot may still be served at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Every record whose `field` contains `substring`, in source order.
    #[must_use]
    pub fn find(&self, field: &str, substring: &str) -> Vec<Record> {
        self.items
            .iter()
            .filter(|record| record.matches(field, substring))
            .cloned()
            .collect()
    }

    /// The first record, which for single-item categories such as
    /// `Hardware` describes the whole host.
    #[must_use]
    pub fn first(&self) -> Option<&Record> {
        self.items.first()
    }

    /// Value of `field` in the first record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FieldNotFound`] if there are no records or the first
    /// record lacks the field.
    pub fn field(&self, field: &str) -> Result<&PlistValue> {
        self.first()
            .ok_or_else(|| Error::FieldNotFound {
                field: field.to_string(),
            })?
            .get(field)
    }

    /// Sorted field names of the first record.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.first()
            .map(|record| record.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Items as a JSON array.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.items.iter().map(Record::to_json).collect())
    }
}
