//! Monte Carlo sampling over the stochastic prediction path

use crate::model::Regressor;
use crate::scaler::Window;
use log::debug;

/// Confidence multiplier for a 95% interval
const Z_95: f64 = 1.96;

/// Spread applied to the fallback estimate when sampling degenerates
const FALLBACK_SPREAD: f64 = 0.05;
const FALLBACK_STD: f64 = 0.01;

/// Summary statistics of one Monte Carlo batch, in normalized space
#[derive(Debug, Clone, Copy)]
pub struct McSummary {
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Draw `n_samples` stochastic predictions for one window and summarize
/// them as mean and a 95% interval.
///
/// Degenerate batches (no samples, or a non-finite mean or deviation)
/// fall back to the window's last close with a nominal spread. Bounds are
/// clamped so the interval stays positive and no wider than twice the mean.
pub fn mc_sample(regressor: &mut dyn Regressor, window: &Window, n_samples: usize) -> McSummary {
    let samples: Vec<f64> = (0..n_samples)
        .map(|_| regressor.predict_stochastic(window))
        .collect();

    let count = samples.len() as f64;
    let (mean, std) = if samples.is_empty() {
        (f64::NAN, f64::NAN)
    } else {
        let mean = samples.iter().sum::<f64>() / count;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count;
        (mean, variance.sqrt())
    };

    if !mean.is_finite() || !std.is_finite() {
        let anchor = window.last().map(|row| row[0]).unwrap_or(0.0);
        debug!("Degenerate sample batch; falling back to last close {anchor}");
        return McSummary {
            mean: anchor,
            std: FALLBACK_STD,
            lower: anchor * (1.0 - FALLBACK_SPREAD),
            upper: anchor * (1.0 + FALLBACK_SPREAD),
        };
    }

    let mut lower = mean - Z_95 * std;
    let mut upper = mean + Z_95 * std;
    if lower < 0.0 {
        lower = mean * (1.0 - FALLBACK_SPREAD);
    }
    if upper > mean * 2.0 {
        upper = mean * (1.0 + FALLBACK_SPREAD);
    }

    McSummary { mean, std, lower, upper }
}
