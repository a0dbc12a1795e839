//! Regression model and on-disk persistence
//!
//! The pipeline only depends on the [`Regressor`] trait; the shipped
//! implementation is a dropout-regularized linear model whose dropout mask
//! stays active at inference time, which is what gives the Monte Carlo
//! sampler a non-degenerate distribution to work with.

use crate::error::{ForecastError, Result};
use crate::indicators::FEATURE_COUNT;
use crate::scaler::Window;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A trainable one-step-ahead regressor over normalized feature windows.
///
/// Stochastic inference is a distinct operation rather than a mode flag:
/// `predict` is deterministic, `predict_stochastic` draws a fresh dropout
/// mask per call and is the path the Monte Carlo sampler uses.
pub trait Regressor: Send {
    /// Train on sliding windows paired with next-step close targets
    fn fit(&mut self, windows: &[Window], targets: &[f64]) -> Result<()>;

    /// Deterministic next-step close prediction in normalized space
    fn predict(&self, window: &Window) -> f64;

    /// One stochastic draw of the next-step close in normalized space
    fn predict_stochastic(&mut self, window: &Window) -> f64;

    /// Model name for logging and artifact provenance
    fn name(&self) -> &str;
}

const DEFAULT_DROPOUT_RATE: f64 = 0.2;
const DEFAULT_LEARNING_RATE: f64 = 0.05;
const DEFAULT_EPOCHS: usize = 40;

fn detached_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// Linear regressor over the flattened window, trained by SGD with
/// inverted dropout on the inputs.
#[derive(Debug, Serialize, Deserialize)]
pub struct DropoutRegressor {
    weights: Vec<f64>,
    bias: f64,
    lookback: usize,
    dropout_rate: f64,
    learning_rate: f64,
    epochs: usize,
    seed: u64,
    #[serde(skip, default = "detached_rng")]
    rng: StdRng,
}

impl DropoutRegressor {
    pub fn new(lookback: usize, seed: u64) -> Result<Self> {
        if lookback == 0 {
            return Err(ForecastError::InvalidParameter(
                "Lookback must be positive".to_string(),
            ));
        }
        Ok(Self {
            weights: Vec::new(),
            bias: 0.0,
            lookback,
            dropout_rate: DEFAULT_DROPOUT_RATE,
            learning_rate: DEFAULT_LEARNING_RATE,
            epochs: DEFAULT_EPOCHS,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Window length this model was built for
    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Restore the seeded generator after deserialization. The serialized
    /// artifact carries the seed but not the generator state.
    fn reseed(&mut self) {
        self.rng = StdRng::seed_from_u64(self.seed);
    }

    fn flatten(window: &Window) -> Vec<f64> {
        window.iter().flat_map(|row| row.iter().copied()).collect()
    }

    /// Start from an identity-on-last-close weight vector so an untrained
    /// or barely trained model still forecasts a price continuation.
    fn init_weights(&mut self, inputs: usize) {
        self.weights = vec![0.0; inputs];
        if inputs >= FEATURE_COUNT {
            // Close column of the last row in the flattened window
            self.weights[inputs - FEATURE_COUNT] = 1.0;
        }
    }

    fn dropout_mask(&mut self, inputs: usize) -> Vec<f64> {
        let keep = 1.0 - self.dropout_rate;
        (0..inputs)
            .map(|_| {
                if self.rng.gen::<f64>() < keep {
                    1.0 / keep
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn forward(&self, inputs: &[f64], mask: Option<&[f64]>) -> f64 {
        let mut acc = self.bias;
        for (i, (&w, &x)) in self.weights.iter().zip(inputs.iter()).enumerate() {
            let x = match mask {
                Some(m) => x * m[i],
                None => x,
            };
            acc += w * x;
        }
        acc
    }
}

impl Regressor for DropoutRegressor {
    fn fit(&mut self, windows: &[Window], targets: &[f64]) -> Result<()> {
        if windows.is_empty() {
            return Err(ForecastError::ModelError(
                "Cannot train on an empty window set".to_string(),
            ));
        }
        if windows.len() != targets.len() {
            return Err(ForecastError::ModelError(format!(
                "Window/target length mismatch: {} vs {}",
                windows.len(),
                targets.len()
            )));
        }
        if windows[0].len() != self.lookback {
            return Err(ForecastError::ModelError(format!(
                "Window length {} does not match model lookback {}",
                windows[0].len(),
                self.lookback
            )));
        }

        let flattened: Vec<Vec<f64>> = windows.iter().map(Self::flatten).collect();
        let inputs = flattened[0].len();
        self.init_weights(inputs);

        // Step size is normalized by input width so wide windows stay stable
        let step = self.learning_rate / inputs as f64;
        for epoch in 0..self.epochs {
            let mut sq_err = 0.0;
            for (x, &target) in flattened.iter().zip(targets.iter()) {
                let mask = self.dropout_mask(inputs);
                let prediction = self.forward(x, Some(&mask));
                let err = prediction - target;
                sq_err += err * err;
                for (i, w) in self.weights.iter_mut().enumerate() {
                    *w -= step * err * x[i] * mask[i];
                }
                self.bias -= step * err;
            }
            if epoch == self.epochs - 1 {
                debug!(
                    "Final epoch MSE {:.6} over {} samples",
                    sq_err / flattened.len() as f64,
                    flattened.len()
                );
            }
        }

        if self.weights.iter().any(|w| !w.is_finite()) || !self.bias.is_finite() {
            return Err(ForecastError::ModelError(
                "Training diverged to non-finite weights".to_string(),
            ));
        }
        Ok(())
    }

    fn predict(&self, window: &Window) -> f64 {
        let inputs = Self::flatten(window);
        if self.weights.len() != inputs.len() {
            // Untrained or mismatched model falls back to continuation
            return window.last().map(|row| row[0]).unwrap_or(0.0);
        }
        self.forward(&inputs, None)
    }

    fn predict_stochastic(&mut self, window: &Window) -> f64 {
        let inputs = Self::flatten(window);
        if self.weights.len() != inputs.len() {
            return window.last().map(|row| row[0]).unwrap_or(0.0);
        }
        let mask = self.dropout_mask(inputs.len());
        self.forward(&inputs, Some(&mask))
    }

    fn name(&self) -> &str {
        "dropout-linear"
    }
}

/// Shared handle to one symbol's model
pub type ModelHandle = Arc<Mutex<Option<DropoutRegressor>>>;

/// One persisted JSON artifact per symbol under a models directory.
///
/// Loading is tolerant: an unreadable or incompatible artifact logs a
/// warning and reports absence so the caller retrains instead of failing.
/// Per-symbol handles serialize concurrent access to the same asset while
/// different assets proceed independently.
pub struct ModelStore {
    dir: PathBuf,
    handles: Mutex<HashMap<String, ModelHandle>>,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Filesystem path of a symbol's artifact
    pub fn artifact_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}_model.json", sanitize(symbol)))
    }

    /// The in-memory handle for a symbol, created on first use
    pub fn handle(&self, symbol: &str) -> Result<ModelHandle> {
        let mut handles = self
            .handles
            .lock()
            .map_err(|_| ForecastError::ModelError("Model registry lock poisoned".to_string()))?;
        Ok(handles
            .entry(sanitize(symbol))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone())
    }

    /// Load a symbol's artifact if a usable one exists
    pub fn load(&self, symbol: &str) -> Option<DropoutRegressor> {
        let path = self.artifact_path(symbol);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str::<DropoutRegressor>(&raw) {
            Ok(mut model) => {
                model.reseed();
                info!("Loaded model artifact from {}", path.display());
                Some(model)
            }
            Err(err) => {
                warn!(
                    "Discarding unreadable model artifact {}: {err}",
                    path.display()
                );
                None
            }
        }
    }

    /// Persist a symbol's model, creating the directory if needed
    pub fn save(&self, symbol: &str, model: &DropoutRegressor) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.artifact_path(symbol);
        let json = serde_json::to_string_pretty(model)?;
        fs::write(&path, json)?;
        info!("Saved model artifact to {}", path.display());
        Ok(())
    }

    /// Directory the store writes artifacts into
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn sanitize(symbol: &str) -> String {
    symbol
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::FEATURE_COUNT;

    fn training_data(lookback: usize, samples: usize) -> (Vec<Window>, Vec<f64>) {
        // Normalized closes drifting upward; indicators held mid-range
        let closes: Vec<f64> = (0..samples + lookback)
            .map(|i| 0.2 + 0.6 * i as f64 / (samples + lookback) as f64)
            .collect();
        let mut windows = Vec::new();
        let mut targets = Vec::new();
        for i in lookback..closes.len() {
            let window: Window = closes[i - lookback..i]
                .iter()
                .map(|&c| {
                    let mut row = [0.5; FEATURE_COUNT];
                    row[0] = c;
                    row
                })
                .collect();
            windows.push(window);
            targets.push(closes[i]);
        }
        (windows, targets)
    }

    #[test]
    fn trained_model_tracks_a_drifting_series() {
        let (windows, targets) = training_data(10, 60);
        let mut model = DropoutRegressor::new(10, 7).unwrap();
        model.fit(&windows, &targets).unwrap();

        let last = windows.last().unwrap();
        let prediction = model.predict(last);
        let target = *targets.last().unwrap();
        assert!(
            (prediction - target).abs() < 0.15,
            "prediction {prediction} too far from {target}"
        );
    }

    #[test]
    fn stochastic_draws_vary_and_deterministic_does_not() {
        let (windows, targets) = training_data(10, 60);
        let mut model = DropoutRegressor::new(10, 7).unwrap();
        model.fit(&windows, &targets).unwrap();

        let window = windows.last().unwrap();
        assert_eq!(model.predict(window), model.predict(window));

        let draws: Vec<f64> = (0..20).map(|_| model.predict_stochastic(window)).collect();
        let distinct = draws
            .iter()
            .any(|&d| (d - draws[0]).abs() > f64::EPSILON);
        assert!(distinct, "dropout draws were all identical");
    }

    #[test]
    fn untrained_model_predicts_continuation() {
        let model = DropoutRegressor::new(5, 1).unwrap();
        let window: Window = (0..5).map(|i| [0.1 * i as f64, 0.5, 0.5, 0.5]).collect();
        assert_eq!(model.predict(&window), 0.4);
    }

    #[test]
    fn fit_rejects_mismatched_lookback() {
        let (windows, targets) = training_data(10, 30);
        let mut model = DropoutRegressor::new(20, 7).unwrap();
        assert!(model.fit(&windows, &targets).is_err());
    }

    #[test]
    fn artifact_round_trip_preserves_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());

        let (windows, targets) = training_data(10, 60);
        let mut model = DropoutRegressor::new(10, 7).unwrap();
        model.fit(&windows, &targets).unwrap();
        store.save("BTC-USD", &model).unwrap();

        let restored = store.load("BTC-USD").unwrap();
        let window = windows.last().unwrap();
        assert_eq!(model.predict(window), restored.predict(window));
    }

    #[test]
    fn corrupt_artifact_loads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.artifact_path("BTC-USD"), "{not json").unwrap();
        assert!(store.load("BTC-USD").is_none());
    }

    #[test]
    fn handles_are_shared_per_symbol() {
        let store = ModelStore::new("models");
        let a = store.handle("BTC-USD").unwrap();
        let b = store.handle("btc-usd").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
