//! Daily OHLCV series handling

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of open/high/low/close/volume data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvRecord {
    /// Trading date
    pub date: NaiveDate,
    /// Opening price
    pub open: f64,
    /// Highest price
    pub high: f64,
    /// Lowest price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Adjusted closing price
    pub adj_close: f64,
    /// Trading volume
    pub volume: f64,
}

impl OhlcvRecord {
    /// Whether every field holds a finite number
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.adj_close.is_finite()
            && self.volume.is_finite()
    }
}

/// Ordered-by-date series of daily OHLCV records.
///
/// Construction enforces strictly increasing dates with no duplicates.
/// Price validity (positive closes, enough history) is checked separately
/// by the forecaster so that a bad series is reported as a structured
/// failure rather than rejected at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvSeries {
    records: Vec<OhlcvRecord>,
}

impl OhlcvSeries {
    /// Create a series from records, validating date ordering
    pub fn new(records: Vec<OhlcvRecord>) -> Result<Self> {
        for pair in records.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(ForecastError::DataError(format!(
                    "Dates must be strictly increasing: {} followed by {}",
                    pair[0].date, pair[1].date
                )));
            }
        }
        Ok(Self { records })
    }

    /// Create a series after dropping rows with non-finite fields
    pub fn from_cleaned(records: Vec<OhlcvRecord>) -> Result<Self> {
        let cleaned: Vec<OhlcvRecord> = records.into_iter().filter(|r| r.is_finite()).collect();
        Self::new(cleaned)
    }

    /// All records in chronological order
    pub fn records(&self) -> &[OhlcvRecord] {
        &self.records
    }

    /// The closing prices as a vector
    pub fn close_prices(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.close).collect()
    }

    /// The most recent record
    pub fn last(&self) -> Option<&OhlcvRecord> {
        self.records.last()
    }

    /// The trailing `n` records (or all of them if shorter)
    pub fn tail(&self, n: usize) -> &[OhlcvRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the series holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check the series is usable for forecasting with the given lookback.
    ///
    /// Runs before any indicator computation: a zero or negative close, a
    /// non-finite close, or too little history is a validation failure of
    /// the whole forecast request.
    pub fn validate_for_forecast(&self, lookback: usize) -> Result<()> {
        if self.records.len() < lookback {
            return Err(ForecastError::DataError(format!(
                "Insufficient data points. Need at least {} days of data, have {}.",
                lookback,
                self.records.len()
            )));
        }
        for record in &self.records {
            if !record.close.is_finite() || record.close <= 0.0 {
                return Err(ForecastError::DataError(format!(
                    "Invalid price data detected at {}: close = {}",
                    record.date, record.close
                )));
            }
        }
        Ok(())
    }
}

/// Synthesize open/high/low from a close-only history.
///
/// Providers that return only closing prices get fixed ±2% offsets for
/// high/low and the prior day's close as the open; the first row's open is
/// backfilled as `close * 0.99`.
pub fn records_from_closes(
    days: &[(NaiveDate, f64)],
    volumes: Option<&[f64]>,
) -> Vec<OhlcvRecord> {
    const DEFAULT_VOLUME: f64 = 1_000_000.0;

    days.iter()
        .enumerate()
        .map(|(i, &(date, close))| {
            let open = if i == 0 {
                close * 0.99
            } else {
                days[i - 1].1
            };
            let volume = volumes
                .and_then(|v| v.get(i).copied())
                .unwrap_or(DEFAULT_VOLUME);
            OhlcvRecord {
                date,
                open,
                high: close * 1.02,
                low: close * 0.98,
                close,
                adj_close: close,
                volume,
            }
        })
        .collect()
}
