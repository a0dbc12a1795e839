//! CryptoCompare daily-history provider (secondary source)

use super::{retry_after_hint, DataSource, SourceError, REQUEST_TIMEOUT, USER_AGENT};
use crate::series::{OhlcvRecord, OhlcvSeries};
use crate::symbols;
use chrono::DateTime;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

const BASE_URL: &str = "https://min-api.cryptocompare.com";

const MAX_DAYS: usize = 2000;

#[derive(Debug, Deserialize)]
struct HistoDayResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data", default)]
    data: Option<HistoDayData>,
}

#[derive(Debug, Deserialize)]
struct HistoDayData {
    #[serde(rename = "Data", default)]
    rows: Vec<HistoDayRow>,
}

#[derive(Debug, Deserialize)]
struct HistoDayRow {
    /// Unix timestamp in seconds
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(rename = "volumefrom")]
    volume: f64,
}

/// Secondary provider returning a true daily OHLC history
pub struct CryptoCompareSource {
    client: Client,
    base_url: String,
}

impl Default for CryptoCompareSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoCompareSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the source at a different endpoint (for testing)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
        }
    }
}

impl DataSource for CryptoCompareSource {
    fn name(&self) -> &str {
        "cryptocompare"
    }

    fn fetch(&self, symbol: &str, min_days: usize) -> Result<OhlcvSeries, SourceError> {
        let ticker = symbols::base_symbol(symbol);
        let url = format!("{}/data/v2/histoday", self.base_url);
        let limit = min_days.max(365).min(MAX_DAYS);
        debug!("Requesting {url} for {ticker} ({limit} days)");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("fsym", ticker.as_str()),
                ("tsym", "USD"),
                ("limit", &limit.to_string()),
            ])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited {
                retry_after: retry_after_hint(&response),
            });
        }
        if !response.status().is_success() {
            return Err(SourceError::Transient(format!(
                "status {}",
                response.status()
            )));
        }

        let body: HistoDayResponse = response.json()?;
        if body.response != "Success" {
            return Err(SourceError::Malformed(format!(
                "API error: {}",
                body.message
            )));
        }
        let rows = body
            .data
            .map(|d| d.rows)
            .ok_or_else(|| SourceError::Malformed("Missing Data payload".to_string()))?;

        let series = series_from_rows(rows)?;
        if series.len() < min_days {
            return Err(SourceError::Insufficient {
                got: series.len(),
                need: min_days,
            });
        }
        Ok(series)
    }
}

fn series_from_rows(rows: Vec<HistoDayRow>) -> Result<OhlcvSeries, SourceError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let date = DateTime::from_timestamp(row.time, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| SourceError::Malformed(format!("Invalid timestamp {}", row.time)))?;
        records.push(OhlcvRecord {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            adj_close: row.close,
            volume: row.volume,
        });
    }
    OhlcvSeries::from_cleaned(records).map_err(|e| SourceError::Malformed(e.to_string()))
}
