//! Historical data source chain
//!
//! Providers are tried strictly in priority order; each gets a bounded
//! number of retries with linear backoff, and exhaustion of the whole list
//! falls through to the deterministic synthetic generator. No provider
//! failure ever escapes the chain.

use crate::error::{ForecastError, Result};
use crate::series::OhlcvSeries;
use crate::synthetic::SyntheticGenerator;
use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;

pub mod coingecko;
pub mod cryptocompare;
pub mod exchange;
pub mod reference;

pub use coingecko::CoinGeckoSource;
pub use cryptocompare::CryptoCompareSource;
pub use exchange::ExchangeSource;
pub use reference::SpotReferenceSource;

/// Failures local to one provider attempt. These never cross the chain
/// boundary; they only steer retry and fallback decisions.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The provider asked us to slow down
    #[error("Rate limited")]
    RateLimited {
        /// Server-supplied retry hint, when present
        retry_after: Option<Duration>,
    },

    /// Network-level failure worth retrying
    #[error("Transient error: {0}")]
    Transient(String),

    /// Response arrived but could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Fewer clean records than requested
    #[error("Insufficient history: got {got} of {need} days")]
    Insufficient { got: usize, need: usize },
}

impl SourceError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. } | SourceError::Transient(_)
        )
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Transient(err.to_string())
        }
    }
}

/// A single historical data provider
pub trait DataSource: Send + Sync {
    /// Provider name for logging and report provenance
    fn name(&self) -> &str;

    /// Fetch at least `min_days` of daily history for a user symbol.
    /// Implementations clean their output (dropping null/NaN rows) before
    /// counting records.
    fn fetch(&self, symbol: &str, min_days: usize) -> std::result::Result<OhlcvSeries, SourceError>;
}

/// Retry policy applied to each provider attempt
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per provider before moving on
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base_delay * n`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// A fetched series together with the provider that supplied it
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub series: OhlcvSeries,
    /// Name of the source that produced the series
    pub source: String,
}

/// Ordered provider chain with a guaranteed synthetic fallback
pub struct SourceChain {
    sources: Vec<Box<dyn DataSource>>,
    policy: RetryPolicy,
    synthetic: SyntheticGenerator,
}

impl SourceChain {
    /// Build a chain over an explicit provider list
    pub fn new(sources: Vec<Box<dyn DataSource>>, policy: RetryPolicy) -> Self {
        Self {
            sources,
            policy,
            synthetic: SyntheticGenerator::new(),
        }
    }

    /// The production provider order: primary market-data API, secondary
    /// market-data API, generic exchange API, spot-reference anchor.
    pub fn with_default_sources() -> Self {
        Self::new(
            vec![
                Box::new(CoinGeckoSource::new()),
                Box::new(CryptoCompareSource::new()),
                Box::new(ExchangeSource::new()),
                Box::new(SpotReferenceSource::new()),
            ],
            RetryPolicy::default(),
        )
    }

    /// Fetch history for a symbol, trying providers in order and falling
    /// back to synthetic data. The only possible error is a shortfall in
    /// the synthetic generator itself.
    pub fn fetch(&self, symbol: &str, min_days: usize) -> Result<FetchResult> {
        for source in &self.sources {
            if let Some(series) = self.try_source(source.as_ref(), symbol, min_days) {
                info!(
                    "Fetched {} records for {} from {}",
                    series.len(),
                    symbol,
                    source.name()
                );
                return Ok(FetchResult {
                    series,
                    source: source.name().to_string(),
                });
            }
        }

        warn!("All data sources failed for {symbol}; generating synthetic history");
        let series = self.synthetic.generate(symbol)?;
        if series.len() < min_days {
            return Err(ForecastError::SourceExhausted(format!(
                "Synthetic series has {} records, need {min_days}",
                series.len()
            )));
        }
        Ok(FetchResult {
            series,
            source: "synthetic".to_string(),
        })
    }

    fn try_source(
        &self,
        source: &dyn DataSource,
        symbol: &str,
        min_days: usize,
    ) -> Option<OhlcvSeries> {
        for attempt in 1..=self.policy.max_attempts {
            match source.fetch(symbol, min_days) {
                Ok(series) if series.len() >= min_days => return Some(series),
                Ok(series) => {
                    debug!(
                        "{} returned only {} of {} records for {}; trying next source",
                        source.name(),
                        series.len(),
                        min_days,
                        symbol
                    );
                    return None;
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = match &err {
                        SourceError::RateLimited {
                            retry_after: Some(hint),
                        } => *hint,
                        _ => self.policy.delay_for(attempt),
                    };
                    debug!(
                        "{} attempt {}/{} for {} failed ({}); retrying in {:?}",
                        source.name(),
                        attempt,
                        self.policy.max_attempts,
                        symbol,
                        err,
                        delay
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => {
                    debug!(
                        "{} failed for {} ({}); trying next source",
                        source.name(),
                        symbol,
                        err
                    );
                    return None;
                }
            }
        }
        None
    }
}

/// Parse a `Retry-After` header value given in seconds
pub(crate) fn retry_after_hint(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
