//! # Crypto Forecast
//!
//! A Rust library for probabilistic multi-day cryptocurrency close-price
//! forecasting.
//!
//! ## Features
//!
//! - Daily OHLCV history from a prioritized chain of public data sources,
//!   with retries, backoff, and a deterministic synthetic fallback
//! - Technical indicator features (RSI, MACD) with graceful degradation
//! - A dropout-regularized regressor whose stochastic inference path feeds
//!   Monte Carlo confidence intervals
//! - Iterative multi-day rollout with indicator recomputation between steps
//! - Advisory trading signals (buy/sell strength plus confidence caution)
//! - JSON model artifacts persisted per symbol
//!
//! ## Quick Start
//!
//! ```no_run
//! use crypto_forecast::{ForecastConfig, Forecaster};
//!
//! # fn main() -> crypto_forecast::Result<()> {
//! let forecaster = Forecaster::new(ForecastConfig::default())?;
//!
//! // Never panics; failures come back as a structured report
//! let report = forecaster.predict("BTC-USD");
//! if report.success {
//!     for point in &report.predictions {
//!         println!(
//!             "{}: {:.2} [{:.2}, {:.2}]",
//!             point.date, point.mean_price, point.lower_bound, point.upper_bound
//!         );
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod forecaster;
pub mod indicators;
pub mod model;
pub mod sampler;
pub mod scaler;
pub mod series;
pub mod signals;
pub mod sources;
pub mod symbols;
pub mod synthetic;

// Re-export commonly used types
pub use crate::error::{ForecastError, Result};
pub use crate::forecaster::{ForecastConfig, ForecastPoint, Forecaster, PredictionReport};
pub use crate::model::{DropoutRegressor, ModelStore, Regressor};
pub use crate::series::{OhlcvRecord, OhlcvSeries};
pub use crate::signals::{Signal, SignalKind};
pub use crate::sources::{DataSource, RetryPolicy, SourceChain};
pub use crate::synthetic::SyntheticGenerator;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
