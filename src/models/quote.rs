use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use chrono::{DateTime, Utc};
use crate::api::types::LatestQuote;
use crate::error::{Result, Error};

/// Audit column appended to every row.
pub const INSERTED_AT_COLUMN: &str = "inserted_at";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Bool(bool),
    Null,
}

impl ColumnValue {
    fn from_json(name: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(ColumnValue::Null),
            Value::Bool(b) => Ok(ColumnValue::Bool(*b)),
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(ColumnValue::Float)
                .ok_or_else(|| Error::ApiInvalidData(format!("'{}' is not a finite number: {}", name, n))),
            Value::String(s) => Ok(DateTime::parse_from_rfc3339(s)
                .map(|ts| ColumnValue::Timestamp(ts.with_timezone(&Utc)))
                .unwrap_or_else(|_| ColumnValue::Text(s.clone()))),
            Value::Array(_) | Value::Object(_) => Err(Error::ApiInvalidData(format!(
                "'{}' is nested and cannot be stored in a single row",
                name
            ))),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// One row: the quote's fields in key order followed by `inserted_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRecord {
    columns: Vec<(String, ColumnValue)>,
}

impl QuoteRecord {
    /// Builds the row and stamps it with `inserted_at`, which never precedes
    /// the instant the quote was requested.
    pub fn from_quote(quote: &LatestQuote, now: DateTime<Utc>) -> Result<Self> {
        if quote.fields.is_empty() {
            return Err(Error::ApiInvalidData(format!(
                "{}/{} quote has no fields",
                quote.symbol, quote.convert
            )));
        }
        if quote.fields.contains_key(INSERTED_AT_COLUMN) {
            return Err(Error::ApiInvalidData(format!(
                "quote already has a '{}' field",
                INSERTED_AT_COLUMN
            )));
        }

        let mut columns = Vec::with_capacity(quote.fields.len() + 1);
        for (name, value) in &quote.fields {
            columns.push((name.clone(), ColumnValue::from_json(name, value)?));
        }

        let inserted_at = now.max(quote.requested_at);
        columns.push((INSERTED_AT_COLUMN.to_string(), ColumnValue::Timestamp(inserted_at)));

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[(String, ColumnValue)] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn inserted_at(&self) -> Option<DateTime<Utc>> {
        match self.get(INSERTED_AT_COLUMN) {
            Some(ColumnValue::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    pub fn price(&self) -> Option<f64> {
        self.get("price").and_then(ColumnValue::as_f64)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for QuoteRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
