//! Exchange listing source over HTTP.

use super::{RecordSource, SymbolExclusion};
use crate::core::{Record, SYMBOL_FIELD};
use crate::errors::ScreenflowError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const NASDAQ_SCREENER_URL: &str =
    "https://api.nasdaq.com/api/screener/stocks?tableonly=true&limit=25&offset=0&download=true";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";

/// Downloads a JSON listing and turns its rows into records.
///
/// Rows are located with a JSON pointer, the selected keys are renamed to
/// record fields (all other keys are dropped) and symbols with excluded
/// characters are removed.
#[derive(Debug, Clone)]
pub struct HttpListingSource {
    url: String,
    user_agent: String,
    timeout: Duration,
    rows_pointer: String,
    fields: Vec<(String, String)>,
    exclusion: SymbolExclusion,
}

impl HttpListingSource {
    /// Creates a source for `url` with no field mapping.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout: Duration::from_secs(15),
            rows_pointer: String::new(),
            fields: Vec::new(),
            exclusion: SymbolExclusion::default(),
        }
    }

    /// The NASDAQ stock screener listing.
    #[must_use]
    pub fn nasdaq() -> Self {
        Self::new(NASDAQ_SCREENER_URL)
            .with_rows_pointer("/data/rows")
            .with_field("symbol", SYMBOL_FIELD)
            .with_field("name", "Company Name")
            .with_field("marketCap", "Market Cap")
            .with_field("industry", "Industry")
    }

    /// Sets the JSON pointer to the row array.
    #[must_use]
    pub fn with_rows_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.rows_pointer = pointer.into();
        self
    }

    /// Keeps row key `from` as record field `to`.
    #[must_use]
    pub fn with_field(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.fields.push((from.into(), to.into()));
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the symbol exclusion.
    #[must_use]
    pub fn with_exclusion(mut self, exclusion: SymbolExclusion) -> Self {
        self.exclusion = exclusion;
        self
    }

    /// Turns a listing response body into records.
    ///
    /// Rows without a symbol are dropped.
    pub fn extract_records(&self, body: &Value) -> Result<Vec<Record>, String> {
        let rows = body
            .pointer(&self.rows_pointer)
            .and_then(Value::as_array)
            .ok_or_else(|| format!("no row array at '{}'", self.rows_pointer))?;

        let records = rows
            .iter()
            .filter_map(Value::as_object)
            .map(|row| self.map_row(row))
            .filter(|record| {
                record
                    .symbol()
                    .is_some_and(|symbol| !self.exclusion.excludes(symbol))
            })
            .collect();
        Ok(records)
    }

    fn map_row(&self, row: &serde_json::Map<String, Value>) -> Record {
        if self.fields.is_empty() {
            return Record::from(row.clone());
        }
        self.fields
            .iter()
            .filter_map(|(from, to)| row.get(from).map(|value| (to.clone(), value.clone())))
            .collect()
    }
}

#[async_trait]
impl RecordSource for HttpListingSource {
    async fn produce(&self, stage: &str) -> Result<Vec<Record>, ScreenflowError> {
        info!(stage = %stage, url = %self.url, "Fetching listing");

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ScreenflowError::source(stage, format!("HTTP client: {e}")))?;

        let response = client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ScreenflowError::source(stage, format!("listing download failed: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ScreenflowError::source(stage, format!("listing is not JSON: {e}")))?;

        let records = self
            .extract_records(&body)
            .map_err(|message| ScreenflowError::source(stage, message))?;
        debug!(stage = %stage, records = records.len(), "Listing parsed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "data": {
                "rows": [
                    {"symbol": "AAPL", "name": "Apple Inc.", "lastsale": "$190.00",
                     "marketCap": "2,950,000,000,000", "industry": "Computer Manufacturing"},
                    {"symbol": "BRK/A", "name": "Berkshire", "marketCap": "1", "industry": "Insurance"},
                    {"symbol": "^GSPC", "name": "Index", "marketCap": "", "industry": ""},
                    {"name": "no symbol"},
                    {"symbol": "ZYXI", "name": "Zynex", "marketCap": "300,000,000", "industry": "Medical"}
                ]
            }
        })
    }

    #[test]
    fn test_nasdaq_rows_are_renamed_and_excluded() {
        let records = HttpListingSource::nasdaq().extract_records(&body()).unwrap();

        let symbols: Vec<_> = records.iter().filter_map(Record::symbol).collect();
        assert_eq!(symbols, vec!["AAPL", "ZYXI"]);

        let fields: Vec<_> = records[0].fields().keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["Symbol", "Company Name", "Market Cap", "Industry"]);
        assert_eq!(records[0].get_f64("Market Cap"), Some(2_950_000_000_000.0));
    }

    #[test]
    fn test_missing_rows_is_an_error() {
        let err = HttpListingSource::nasdaq()
            .extract_records(&json!({"data": null}))
            .unwrap_err();
        assert!(err.contains("/data/rows"));
    }

    #[test]
    fn test_unmapped_source_keeps_all_keys() {
        let source = HttpListingSource::new("http://localhost").with_rows_pointer("/rows");
        let records = source
            .extract_records(&json!({"rows": [{"Symbol": "A", "x": 1}]}))
            .unwrap();
        assert_eq!(records[0].len(), 2);
    }
}
