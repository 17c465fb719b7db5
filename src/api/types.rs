use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};
use crate::error::{Result, Error};

/// Envelope of every CoinMarketCap response.
#[derive(Debug, Deserialize)]
pub struct CMCResponse {
    pub status: Option<CMCStatus>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CMCStatus {
    #[serde(default)]
    pub error_code: i64,
    pub error_message: Option<String>,
}

/// The quote object for one symbol in one fiat currency, as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestQuote {
    pub symbol: String,
    pub convert: String,
    pub requested_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl LatestQuote {
    pub fn price(&self) -> Option<f64> {
        self.fields.get("price").and_then(Value::as_f64)
    }
}

impl CMCResponse {
    /// Walks `data.<symbol>.quote.<convert>` and returns the quote object.
    pub fn into_quote_fields(self, symbol: &str, convert: &str) -> Result<Map<String, Value>> {
        if let Some(status) = &self.status {
            if status.error_code != 0 {
                return Err(Error::ApiError(format!(
                    "CoinMarketCap error {}: {}",
                    status.error_code,
                    status.error_message.as_deref().unwrap_or("no message")
                )));
            }
        }

        let data = self
            .data
            .ok_or_else(|| Error::ApiInvalidFormat("response has no 'data'".to_string()))?;
        let entry = take_key(data, symbol, "data")?;
        // v2 of the endpoint returns a list of matches per symbol
        let entry = match entry {
            Value::Array(items) => items.into_iter().next().ok_or_else(|| {
                Error::ApiInvalidFormat(format!("'data.{}' is an empty list", symbol))
            })?,
            other => other,
        };
        let quote = take_key(entry, "quote", &format!("data.{}", symbol))?;
        let fields = take_key(quote, convert, &format!("data.{}.quote", symbol))?;

        match fields {
            Value::Object(map) if !map.is_empty() => Ok(map),
            Value::Object(_) => Err(Error::ApiInvalidData(format!(
                "'data.{}.quote.{}' is empty",
                symbol, convert
            ))),
            _ => Err(Error::ApiInvalidFormat(format!(
                "'data.{}.quote.{}' is not an object",
                symbol, convert
            ))),
        }
    }
}

fn take_key(value: Value, key: &str, path: &str) -> Result<Value> {
    match value {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| Error::ApiInvalidFormat(format!("missing '{}.{}'", path, key))),
        _ => Err(Error::ApiInvalidFormat(format!("'{}' is not an object", path))),
    }
}
