//! Forecast orchestration: fetch, train, roll out, annotate
//!
//! `Forecaster::predict` is the crate's front door. It never panics and
//! never returns `Err`; any failure in the pipeline comes back as a
//! structured report with `success: false` and the error message attached.

use crate::error::{ForecastError, Result};
use crate::indicators;
use crate::model::{DropoutRegressor, ModelStore, Regressor};
use crate::sampler::mc_sample;
use crate::scaler::{windowize, MinMaxScaler, Window};
use crate::signals::{self, Signal};
use crate::sources::SourceChain;
use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

const MODEL_SEED: u64 = 42;

/// Pipeline parameters, validated at forecaster construction
#[derive(Debug, Clone, Copy)]
pub struct ForecastConfig {
    /// Trailing days fed to the model per prediction
    pub lookback: usize,
    /// Days to forecast ahead
    pub horizon_days: usize,
    /// Stochastic draws per forecast step
    pub mc_samples: usize,
    /// Minimum history required from the data chain
    pub min_history_days: usize,
    /// Retrain even when a saved artifact exists
    pub retrain: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback: 60,
            horizon_days: 7,
            mc_samples: 100,
            min_history_days: 120,
            retrain: false,
        }
    }
}

impl ForecastConfig {
    fn validate(&self) -> Result<()> {
        if self.lookback == 0 {
            return Err(ForecastError::InvalidParameter(
                "Lookback must be positive".to_string(),
            ));
        }
        if self.horizon_days == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        if self.mc_samples == 0 {
            return Err(ForecastError::InvalidParameter(
                "Monte Carlo sample count must be positive".to_string(),
            ));
        }
        if self.min_history_days <= self.lookback {
            return Err(ForecastError::InvalidParameter(format!(
                "Minimum history ({}) must exceed the lookback ({})",
                self.min_history_days, self.lookback
            )));
        }
        Ok(())
    }
}

/// One forecast step with its 95% interval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub mean_price: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Change versus the previous step's mean (first step: the last close)
    pub percent_change: f64,
}

/// One trailing actual close included in the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentPrice {
    pub date: NaiveDate,
    pub close: f64,
}

/// The full result object handed to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    pub success: bool,
    pub coin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub last_close: f64,
    pub predictions: Vec<ForecastPoint>,
    pub recent_prices: Vec<RecentPrice>,
    pub signals: Vec<Signal>,
    /// Provider that supplied the history ("synthetic" on full fallback)
    pub data_source: String,
    pub date_generated: NaiveDate,
}

impl PredictionReport {
    fn failure(symbol: &str, err: &ForecastError) -> Self {
        Self {
            success: false,
            coin: symbol.trim().to_uppercase(),
            error: Some(err.to_string()),
            last_close: 0.0,
            predictions: Vec::new(),
            recent_prices: Vec::new(),
            signals: Vec::new(),
            data_source: "none".to_string(),
            date_generated: Utc::now().date_naive(),
        }
    }
}

/// End-to-end multi-day close forecaster
pub struct Forecaster {
    chain: SourceChain,
    store: ModelStore,
    config: ForecastConfig,
}

impl Forecaster {
    /// Forecaster over the production source chain, persisting model
    /// artifacts under `models/`
    pub fn new(config: ForecastConfig) -> Result<Self> {
        Self::with_parts(SourceChain::with_default_sources(), ModelStore::new("models"), config)
    }

    /// Forecaster over explicit collaborators (tests inject mock chains
    /// and temporary stores here)
    pub fn with_parts(chain: SourceChain, store: ModelStore, config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { chain, store, config })
    }

    /// Produce a forecast report for a user-facing symbol. Failures are
    /// reported, never raised.
    pub fn predict(&self, symbol: &str) -> PredictionReport {
        match self.run(symbol) {
            Ok(report) => report,
            Err(err) => {
                warn!("Forecast for {symbol} failed: {err}");
                PredictionReport::failure(symbol, &err)
            }
        }
    }

    fn run(&self, symbol: &str) -> Result<PredictionReport> {
        let cfg = &self.config;
        let fetched = self.chain.fetch(symbol, cfg.min_history_days)?;
        let series = &fetched.series;
        series.validate_for_forecast(cfg.min_history_days)?;

        let closes = series.close_prices();
        let matrix = indicators::feature_matrix(&closes);
        let scaler = MinMaxScaler::fit(&matrix)?;
        let scaled = scaler.transform(&matrix);
        let (windows, targets) = windowize(&scaled, cfg.lookback)?;

        let handle = self.store.handle(symbol)?;
        let mut slot = handle
            .lock()
            .map_err(|_| ForecastError::ModelError("Model handle lock poisoned".to_string()))?;
        self.ensure_model(symbol, &mut slot, &windows, &targets)?;
        let model = slot
            .as_mut()
            .ok_or_else(|| ForecastError::ModelError("Model missing after training".to_string()))?;

        let last_close = series
            .last()
            .map(|r| r.close)
            .ok_or_else(|| ForecastError::DataError("Empty series after validation".to_string()))?;
        let last_date = series
            .last()
            .map(|r| r.date)
            .ok_or_else(|| ForecastError::DataError("Empty series after validation".to_string()))?;

        let points = self.rollout(model, &scaler, &closes, &scaled, last_close, last_date);
        let annotated = signals::annotate(&points);

        let recent_prices: Vec<RecentPrice> = series
            .tail(cfg.lookback)
            .iter()
            .map(|r| RecentPrice { date: r.date, close: r.close })
            .collect();

        info!(
            "Forecast for {symbol}: {} steps from {} history records ({})",
            points.len(),
            series.len(),
            fetched.source
        );
        Ok(PredictionReport {
            success: true,
            coin: symbol.trim().to_uppercase(),
            error: None,
            last_close,
            predictions: points,
            recent_prices,
            signals: annotated,
            data_source: fetched.source,
            date_generated: Utc::now().date_naive(),
        })
    }

    /// Fill the symbol's model slot, preferring a saved artifact unless a
    /// retrain was requested or the artifact does not fit the current
    /// window shape.
    fn ensure_model(
        &self,
        symbol: &str,
        slot: &mut Option<DropoutRegressor>,
        windows: &[Window],
        targets: &[f64],
    ) -> Result<()> {
        let cfg = &self.config;
        if !cfg.retrain {
            if slot.as_ref().map(|m| m.lookback()) == Some(cfg.lookback) {
                return Ok(());
            }
            if let Some(loaded) = self.store.load(symbol) {
                if loaded.lookback() == cfg.lookback {
                    *slot = Some(loaded);
                    return Ok(());
                }
                debug!("Saved artifact for {symbol} has a different window shape; retraining");
            }
        }

        let mut model = DropoutRegressor::new(cfg.lookback, MODEL_SEED)?;
        model.fit(windows, targets)?;
        self.store.save(symbol, &model)?;
        *slot = Some(model);
        Ok(())
    }

    /// Sequential rollout: each step samples the model, decodes to price
    /// space, then feeds the predicted close back through indicator
    /// recomputation and the fitted scaler before sliding the window.
    fn rollout(
        &self,
        model: &mut DropoutRegressor,
        scaler: &MinMaxScaler,
        closes: &[f64],
        scaled: &[crate::indicators::FeatureRow],
        last_close: f64,
        last_date: NaiveDate,
    ) -> Vec<ForecastPoint> {
        let cfg = &self.config;
        let mut window: Window = scaled[scaled.len() - cfg.lookback..].to_vec();
        let mut rolling_closes = closes.to_vec();
        let mut prev_price = last_close;
        let mut date = last_date;
        let mut points = Vec::with_capacity(cfg.horizon_days);

        for _ in 0..cfg.horizon_days {
            let summary = mc_sample(&mut *model, &window, cfg.mc_samples);

            let (mean, lower, upper) = clamp_price_interval(
                scaler.inverse_close(summary.mean),
                scaler.inverse_close(summary.lower),
                scaler.inverse_close(summary.upper),
                prev_price,
            );

            let percent_change = if prev_price > 0.0 {
                (mean - prev_price) / prev_price * 100.0
            } else {
                0.0
            };

            date += Duration::days(1);
            points.push(ForecastPoint {
                date,
                mean_price: mean,
                lower_bound: lower,
                upper_bound: upper,
                percent_change,
            });

            // Feedback: append the predicted close and slide the window
            // forward by one freshly computed feature row
            rolling_closes.push(mean);
            slide_window(&mut window, scaler, &rolling_closes, cfg.lookback);

            prev_price = mean;
        }

        points
    }
}

/// Drop the oldest window row and append the feature row for the newest
/// close, recomputed over the trailing slice and normalized with the
/// fitted scaler. Rows already in the window are carried over untouched;
/// only the appended row is derived from the truncated history.
fn slide_window(
    window: &mut Window,
    scaler: &MinMaxScaler,
    rolling_closes: &[f64],
    lookback: usize,
) {
    let tail_len = (lookback + 1).min(rolling_closes.len());
    let tail = &rolling_closes[rolling_closes.len() - tail_len..];
    if let Some(new_row) = indicators::feature_matrix(tail).last() {
        if !window.is_empty() {
            window.remove(0);
        }
        window.push(scaler.transform_row(new_row));
    }
}

/// Price-space guards applied after decoding, on top of the sampler's
/// normalized-space clamps: a non-positive or non-finite mean falls back
/// to the prior price, a negative lower bound becomes `mean * 0.95`, an
/// upper bound beyond twice the mean is pulled in to `mean * 1.05`, and
/// interval ordering is enforced last.
fn clamp_price_interval(mean: f64, lower: f64, upper: f64, fallback: f64) -> (f64, f64, f64) {
    let mean = if mean.is_finite() && mean > 0.0 {
        mean
    } else {
        fallback
    };
    let mut lower = if lower.is_finite() && lower >= 0.0 {
        lower
    } else {
        mean * 0.95
    };
    let mut upper = if upper.is_finite() && upper <= mean * 2.0 {
        upper
    } else {
        mean * 1.05
    };
    lower = lower.min(mean);
    upper = upper.max(mean);
    (mean, lower, upper)
}
