//! Records: one entity at one pipeline stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the stable identifier of a record.
pub const SYMBOL_FIELD: &str = "Symbol";

/// Field set on records that were kept without their fetched data.
pub const DATA_STATUS_FIELD: &str = "data_status";

/// Field carrying the reason a record's data is missing.
pub const MISSING_REASON_FIELD: &str = "missing_reason";

/// Value of [`DATA_STATUS_FIELD`] for degraded records.
pub const DATA_STATUS_MISSING: &str = "missing";

/// An ordered mapping of named fields to scalar values.
///
/// Field order is preserved through serialization, so an artifact written
/// twice from the same records is byte-identical. Stages only read the
/// fields they need; the field set grows as records move down the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record holding only a symbol.
    #[must_use]
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self::new().with(SYMBOL_FIELD, symbol.into())
    }

    /// Sets a field, returning the record.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Gets a field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns true if the field is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Returns the record's symbol, if it has one.
    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.get(SYMBOL_FIELD).and_then(Value::as_str)
    }

    /// Reads a field as a number.
    ///
    /// Numeric strings are accepted, including listing-style values such as
    /// `"$1,234.50"` or `"12.5%"`.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | '%'))
                    .collect();
                cleaned.parse().ok()
            }
            _ => None,
        }
    }

    /// Flags the record as kept without its real data.
    pub fn mark_missing(&mut self, reason: impl Into<String>) {
        self.set(DATA_STATUS_FIELD, DATA_STATUS_MISSING);
        self.set(MISSING_REASON_FIELD, reason.into());
    }

    /// Returns true if the record was flagged by [`Record::mark_missing`].
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.get(DATA_STATUS_FIELD).and_then(Value::as_str) == Some(DATA_STATUS_MISSING)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consumes the record, returning its field map.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
