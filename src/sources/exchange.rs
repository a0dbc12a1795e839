//! Generic exchange kline provider (tertiary source)
//!
//! Pulls daily spot candles from a Bybit-compatible kline endpoint. Rows
//! arrive newest-first as string tuples and are re-sorted chronologically.

use super::{retry_after_hint, DataSource, SourceError, REQUEST_TIMEOUT, USER_AGENT};
use crate::series::{OhlcvRecord, OhlcvSeries};
use crate::symbols;
use chrono::DateTime;
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

const BASE_URL: &str = "https://api.bybit.com";

/// Exchange kline endpoints cap a single request
const MAX_CANDLES: usize = 1000;

#[derive(Debug, Deserialize)]
struct KlineResponse {
    #[serde(rename = "retCode")]
    ret_code: i32,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: KlineResult,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

/// Tertiary provider: daily candles from a public exchange API
pub struct ExchangeSource {
    client: Client,
    base_url: String,
}

impl Default for ExchangeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeSource {
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

impl DataSource for ExchangeSource {
    fn name(&self) -> &str {
        "exchange"
    }

    fn fetch(&self, symbol: &str, min_days: usize) -> Result<OhlcvSeries, SourceError> {
        let pair = format!("{}USDT", symbols::base_symbol(symbol));
        let url = format!("{}/v5/market/kline", self.base_url);
        let limit = min_days.max(365).min(MAX_CANDLES);
        debug!("Requesting {url} for {pair} ({limit} candles)");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("category", "spot"),
                ("symbol", pair.as_str()),
                ("interval", "D"),
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

        let body: KlineResponse = response.json()?;
        if body.ret_code != 0 {
            return Err(SourceError::Malformed(format!(
                "API error {}: {}",
                body.ret_code, body.ret_msg
            )));
        }

        let series = series_from_klines(body.result.list)?;
        if series.len() < min_days {
            return Err(SourceError::Insufficient {
                got: series.len(),
                need: min_days,
            });
        }
        Ok(series)
    }
}

/// Parse `[startTimeMs, open, high, low, close, volume, turnover]` string
/// rows, newest-first, into a chronological series.
fn series_from_klines(rows: Vec<Vec<String>>) -> Result<OhlcvSeries, SourceError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 6 {
            return Err(SourceError::Malformed(format!(
                "Kline row has {} fields, expected at least 6",
                row.len()
            )));
        }
        let ts: i64 = parse_field(&row[0])?;
        let date = DateTime::from_timestamp_millis(ts)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| SourceError::Malformed(format!("Invalid timestamp {ts}")))?;
        let close: f64 = parse_field(&row[4])?;
        records.push(OhlcvRecord {
            date,
            open: parse_field(&row[1])?,
            high: parse_field(&row[2])?,
            low: parse_field(&row[3])?,
            close,
            adj_close: close,
            volume: parse_field(&row[5])?,
        });
    }
    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);
    OhlcvSeries::from_cleaned(records).map_err(|e| SourceError::Malformed(e.to_string()))
}

fn parse_field<T: std::str::FromStr>(field: &str) -> Result<T, SourceError> {
    field
        .parse()
        .map_err(|_| SourceError::Malformed(format!("Unparseable kline field: {field}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: i64, close: f64) -> Vec<String> {
        vec![
            (day * 86_400_000).to_string(),
            format!("{}", close - 1.0),
            format!("{}", close + 2.0),
            format!("{}", close - 2.0),
            close.to_string(),
            "500".to_string(),
            "50000".to_string(),
        ]
    }

    #[test]
    fn newest_first_rows_are_sorted_ascending() {
        let series = series_from_klines(vec![row(2, 120.0), row(1, 110.0), row(0, 100.0)]).unwrap();
        let closes = series.close_prices();
        assert_eq!(closes, vec![100.0, 110.0, 120.0]);
    }

    #[test]
    fn short_rows_are_malformed() {
        let result = series_from_klines(vec![vec!["0".to_string(), "1".to_string()]]);
        assert!(matches!(result, Err(SourceError::Malformed(_))));
    }

    #[test]
    fn unparseable_fields_are_malformed() {
        let mut bad = row(0, 100.0);
        bad[4] = "not-a-number".to_string();
        assert!(matches!(
            series_from_klines(vec![bad]),
            Err(SourceError::Malformed(_))
        ));
    }
}
