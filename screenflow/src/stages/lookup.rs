//! Per-symbol JSON lookup over HTTP.

use super::RecordFetcher;
use crate::core::Record;
use crate::errors::ItemFailure;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fetches one JSON document per symbol and copies selected values onto
/// the record.
///
/// Each worker builds its own HTTP client and reuses it for every symbol it
/// handles.
#[derive(Debug, Clone)]
pub struct HttpFieldFetcher {
    url_template: String,
    user_agent: String,
    timeout: Duration,
    fields: Vec<(String, String)>,
    keep_on_failure: bool,
}

impl HttpFieldFetcher {
    /// Creates a fetcher. `{symbol}` in the template is replaced per record.
    #[must_use]
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            fields: Vec::new(),
            keep_on_failure: false,
        }
    }

    /// Copies the value at JSON `pointer` into record field `field`.
    #[must_use]
    pub fn with_field(mut self, pointer: impl Into<String>, field: impl Into<String>) -> Self {
        self.fields.push((pointer.into(), field.into()));
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Keeps records whose lookup failed, flagged as missing data.
    #[must_use]
    pub fn keep_on_failure(mut self) -> Self {
        self.keep_on_failure = true;
        self
    }

    /// Returns the lookup URL for `symbol`.
    #[must_use]
    pub fn url_for(&self, symbol: &str) -> String {
        self.url_template.replace("{symbol}", symbol)
    }

    /// Copies the mapped values from `body` onto `record`.
    pub fn merge(&self, mut record: Record, body: &Value) -> Result<Record, ItemFailure> {
        for (pointer, field) in &self.fields {
            let value = body
                .pointer(pointer)
                .filter(|value| !value.is_null())
                .ok_or_else(|| {
                    ItemFailure::MissingData(format!("'{field}' not found at '{pointer}'"))
                })?;
            record.set(field.clone(), value.clone());
        }
        Ok(record)
    }
}

#[async_trait]
impl RecordFetcher for HttpFieldFetcher {
    type Session = reqwest::Client;

    async fn open_session(&self, _worker: usize) -> Result<reqwest::Client, ItemFailure> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ItemFailure::Session(e.to_string()))
    }

    async fn fetch(
        &self,
        session: &mut reqwest::Client,
        record: &Record,
    ) -> Result<Record, ItemFailure> {
        let symbol = record
            .symbol()
            .ok_or_else(|| ItemFailure::MissingData("record has no symbol".to_string()))?;

        let response = session
            .get(self.url_for(symbol))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                if e.is_timeout() {
                    ItemFailure::Timeout {
                        after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                } else {
                    ItemFailure::Fetch(e.to_string())
                }
            })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ItemFailure::Fetch(format!("invalid JSON for {symbol}: {e}")))?;

        self.merge(record.clone(), &body)
    }

    async fn fallback(&self, record: &Record, _failure: &ItemFailure) -> Option<Record> {
        self.keep_on_failure.then(|| record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fetcher() -> HttpFieldFetcher {
        HttpFieldFetcher::new("https://example.test/quote/{symbol}/institutional")
            .with_field("/data/ownership/net", "Net Institutional Inflow")
            .with_field("/data/rs", "RS")
    }

    #[test]
    fn test_url_for() {
        assert_eq!(
            fetcher().url_for("NVDA"),
            "https://example.test/quote/NVDA/institutional"
        );
    }

    #[test]
    fn test_merge_copies_values() {
        let body = json!({"data": {"ownership": {"net": 1250.5}, "rs": 93}});
        let record = fetcher().merge(Record::for_symbol("NVDA"), &body).unwrap();

        assert_eq!(record.get_f64("Net Institutional Inflow"), Some(1250.5));
        assert_eq!(record.get_f64("RS"), Some(93.0));
        assert_eq!(record.symbol(), Some("NVDA"));
    }

    #[test]
    fn test_merge_missing_value_fails() {
        let body = json!({"data": {"ownership": {"net": null}, "rs": 93}});
        let err = fetcher().merge(Record::for_symbol("NVDA"), &body).unwrap_err();
        assert!(matches!(err, ItemFailure::MissingData(ref m) if m.contains("Net Institutional Inflow")));
    }

    #[tokio::test]
    async fn test_fallback_only_when_enabled() {
        let failure = ItemFailure::Fetch("boom".into());
        let record = Record::for_symbol("A");
        assert!(fetcher().fallback(&record, &failure).await.is_none());
        assert!(fetcher()
            .keep_on_failure()
            .fallback(&record, &failure)
            .await
            .is_some());
    }
}
