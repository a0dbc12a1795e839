//! CoinGecko market-chart provider (primary source)

use super::{retry_after_hint, DataSource, SourceError, REQUEST_TIMEOUT, USER_AGENT};
use crate::series::{records_from_closes, OhlcvSeries};
use crate::symbols;
use chrono::{DateTime, NaiveDate};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko caps the daily market-chart range
const MAX_DAYS: usize = 2000;

/// Market chart payload: `[timestamp_ms, value]` pair series
#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(i64, f64)>,
    #[serde(default)]
    total_volumes: Vec<(i64, f64)>,
}

/// Primary provider. Returns close-price and volume pair series keyed by
/// millisecond timestamps; OHLC is synthesized from the closes.
pub struct CoinGeckoSource {
    client: Client,
    base_url: String,
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinGeckoSource {
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

impl DataSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn fetch(&self, symbol: &str, min_days: usize) -> Result<OhlcvSeries, SourceError> {
        let coin_id = symbols::resolve(symbol);
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id);
        let days = min_days.max(365).min(MAX_DAYS);
        debug!("Requesting {url} for {days} days");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("days", &days.to_string()),
                ("interval", "daily"),
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

        let chart: MarketChart = response.json()?;
        let series = series_from_chart(chart)?;
        if series.len() < min_days {
            return Err(SourceError::Insufficient {
                got: series.len(),
                need: min_days,
            });
        }
        Ok(series)
    }
}

/// Collapse pair series to one point per day (keeping the latest) and
/// synthesize OHLC around the closes.
fn series_from_chart(chart: MarketChart) -> Result<OhlcvSeries, SourceError> {
    let mut days: Vec<(NaiveDate, f64)> = Vec::with_capacity(chart.prices.len());
    for (ts, price) in chart.prices {
        let date = date_from_millis(ts)?;
        match days.last_mut() {
            Some(last) if last.0 == date => last.1 = price,
            _ => days.push((date, price)),
        }
    }
    days.retain(|&(_, price)| price.is_finite());

    let volumes: Vec<f64> = if chart.total_volumes.is_empty() {
        Vec::new()
    } else {
        let mut by_day: Vec<(NaiveDate, f64)> = Vec::with_capacity(chart.total_volumes.len());
        for (ts, volume) in chart.total_volumes {
            let date = date_from_millis(ts)?;
            match by_day.last_mut() {
                Some(last) if last.0 == date => last.1 = volume,
                _ => by_day.push((date, volume)),
            }
        }
        days.iter()
            .map(|&(date, _)| {
                by_day
                    .iter()
                    .find(|&&(d, _)| d == date)
                    .map(|&(_, v)| v)
                    .unwrap_or(1_000_000.0)
            })
            .collect()
    };

    let records = if volumes.is_empty() {
        records_from_closes(&days, None)
    } else {
        records_from_closes(&days, Some(&volumes))
    };
    OhlcvSeries::from_cleaned(records).map_err(|e| SourceError::Malformed(e.to_string()))
}

fn date_from_millis(ts: i64) -> Result<NaiveDate, SourceError> {
    DateTime::from_timestamp_millis(ts)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| SourceError::Malformed(format!("Invalid timestamp {ts}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_collapses_to_daily_records() {
        let day_ms = 86_400_000i64;
        let chart = MarketChart {
            prices: vec![
                (0, 100.0),
                (day_ms, 110.0),
                (day_ms + 3_600_000, 111.0), // same day, keeps the later value
                (2 * day_ms, 120.0),
            ],
            total_volumes: vec![(0, 5000.0), (day_ms, 6000.0), (2 * day_ms, 7000.0)],
        };
        let series = series_from_chart(chart).unwrap();
        assert_eq!(series.len(), 3);
        let records = series.records();
        assert_eq!(records[1].close, 111.0);
        assert_eq!(records[1].volume, 6000.0);
        assert_eq!(records[0].open, 99.0);
        assert_eq!(records[2].high, 120.0 * 1.02);
    }

    #[test]
    fn non_finite_prices_are_dropped() {
        let day_ms = 86_400_000i64;
        let chart = MarketChart {
            prices: vec![(0, 100.0), (day_ms, f64::NAN), (2 * day_ms, 120.0)],
            total_volumes: Vec::new(),
        };
        let series = series_from_chart(chart).unwrap();
        assert_eq!(series.len(), 2);
    }
}
