use chrono::NaiveDate;
use crypto_forecast::series::{records_from_closes, OhlcvSeries};
use crypto_forecast::sources::{DataSource, RetryPolicy, SourceChain, SourceError};
use crypto_forecast::{ForecastConfig, Forecaster, ModelStore};
use std::fs;
use std::time::Duration;

// Deterministic provider fixture: a gently rising series with a wobble,
// long enough to train on
struct FixtureSource {
    days: usize,
}

impl DataSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch(&self, _: &str, _: usize) -> Result<OhlcvSeries, SourceError> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let days: Vec<(NaiveDate, f64)> = (0..self.days)
            .map(|i| {
                let close = 100.0 * 1.002f64.powi(i as i32) + (i as f64 * 0.4).sin() * 2.0;
                (start + chrono::Duration::days(i as i64), close)
            })
            .collect();
        OhlcvSeries::new(records_from_closes(&days, None))
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

// Provider fixture with one corrupt (negative) close in the middle
struct BadCloseSource {
    days: usize,
}

impl DataSource for BadCloseSource {
    fn name(&self) -> &str {
        "bad-close"
    }

    fn fetch(&self, _: &str, _: usize) -> Result<OhlcvSeries, SourceError> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let days: Vec<(NaiveDate, f64)> = (0..self.days)
            .map(|i| {
                let close = if i == self.days / 2 { -5.0 } else { 100.0 + i as f64 };
                (start + chrono::Duration::days(i as i64), close)
            })
            .collect();
        OhlcvSeries::new(records_from_closes(&days, None))
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::ZERO,
    }
}

fn test_config() -> ForecastConfig {
    ForecastConfig {
        lookback: 60,
        horizon_days: 7,
        mc_samples: 50,
        min_history_days: 120,
        retrain: false,
    }
}

fn fixture_forecaster(dir: &std::path::Path) -> Forecaster {
    let chain = SourceChain::new(vec![Box::new(FixtureSource { days: 160 })], fast_policy());
    Forecaster::with_parts(chain, ModelStore::new(dir), test_config()).unwrap()
}

#[test]
fn full_pipeline_produces_a_bounded_forecast() {
    let dir = tempfile::tempdir().unwrap();
    let forecaster = fixture_forecaster(dir.path());

    let report = forecaster.predict("BTC-USD");
    assert!(report.success, "unexpected failure: {:?}", report.error);
    assert_eq!(report.coin, "BTC-USD");
    assert_eq!(report.data_source, "fixture");
    assert_eq!(report.predictions.len(), 7);
    assert_eq!(report.recent_prices.len(), 60);
    assert_eq!(report.signals.len(), 7);
    assert!(report.last_close > 0.0);

    for point in &report.predictions {
        assert!(point.mean_price.is_finite());
        assert!(
            point.lower_bound <= point.mean_price && point.mean_price <= point.upper_bound,
            "interval does not bracket the mean: {point:?}"
        );
        assert!(point.lower_bound >= 0.0);
    }

    // Forecast dates continue day by day from the last actual close
    let last_actual = report.recent_prices.last().unwrap().date;
    for (i, point) in report.predictions.iter().enumerate() {
        assert_eq!(point.date, last_actual + chrono::Duration::days(i as i64 + 1));
    }
}

#[test]
fn percent_changes_chain_step_over_step() {
    let dir = tempfile::tempdir().unwrap();
    let forecaster = fixture_forecaster(dir.path());
    let report = forecaster.predict("ETH-USD");
    assert!(report.success);

    let mut prev = report.last_close;
    for point in &report.predictions {
        let expected = (point.mean_price - prev) / prev * 100.0;
        assert!(
            (point.percent_change - expected).abs() < 1e-9,
            "percent change {} does not match {expected}",
            point.percent_change
        );
        prev = point.mean_price;
    }
}

#[test]
fn empty_chain_falls_back_to_synthetic_history() {
    let dir = tempfile::tempdir().unwrap();
    let chain = SourceChain::new(Vec::new(), fast_policy());
    let forecaster = Forecaster::with_parts(chain, ModelStore::new(dir.path()), test_config()).unwrap();

    let report = forecaster.predict("OBSCURECOIN-USD");
    assert!(report.success, "unexpected failure: {:?}", report.error);
    assert_eq!(report.data_source, "synthetic");
    assert_eq!(report.predictions.len(), 7);
}

#[test]
fn corrupt_price_data_becomes_a_structured_failure() {
    let dir = tempfile::tempdir().unwrap();
    let chain = SourceChain::new(vec![Box::new(BadCloseSource { days: 130 })], fast_policy());
    let forecaster = Forecaster::with_parts(chain, ModelStore::new(dir.path()), test_config()).unwrap();

    let report = forecaster.predict("BTC-USD");
    assert!(!report.success);
    let message = report.error.expect("failure report should carry an error");
    assert!(message.contains("Invalid price data"), "unexpected error: {message}");
    assert!(report.predictions.is_empty());
    assert!(report.signals.is_empty());
}

#[test]
fn model_artifact_is_persisted_and_survives_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let forecaster = fixture_forecaster(dir.path());

    let first = forecaster.predict("BTC-USD");
    assert!(first.success);
    let store = ModelStore::new(dir.path());
    let artifact = store.artifact_path("BTC-USD");
    assert!(artifact.exists(), "no artifact at {}", artifact.display());

    // A clobbered artifact triggers retraining, not an error
    fs::write(&artifact, "{definitely not json").unwrap();
    let again = fixture_forecaster(dir.path()).predict("BTC-USD");
    assert!(again.success, "unexpected failure: {:?}", again.error);
}

#[test]
fn report_serializes_with_snake_case_fields() {
    let dir = tempfile::tempdir().unwrap();
    let forecaster = fixture_forecaster(dir.path());
    let report = forecaster.predict("BTC-USD");

    let json = serde_json::to_string(&report).unwrap();
    for field in [
        "\"success\"",
        "\"coin\"",
        "\"last_close\"",
        "\"predictions\"",
        "\"recent_prices\"",
        "\"mean_price\"",
        "\"lower_bound\"",
        "\"upper_bound\"",
        "\"percent_change\"",
        "\"data_source\"",
        "\"date_generated\"",
    ] {
        assert!(json.contains(field), "missing field {field}");
    }
    // Successful reports omit the error key entirely
    assert!(!json.contains("\"error\""));
}
