//! Technical indicator computation (RSI, MACD)
//!
//! The derived features feeding the regressor. Outputs are always fully
//! populated: degenerate inputs resolve to the neutral values (RSI 50,
//! MACD/signal 0) instead of NaN.

/// Neutral RSI value used for degenerate or insufficient history
pub const NEUTRAL_RSI: f64 = 50.0;

/// Number of feature columns: close, RSI, MACD, signal
pub const FEATURE_COUNT: usize = 4;

/// One feature vector: `[close, rsi, macd, signal]`
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Relative Strength Index over a rolling window.
///
/// Average gain / average loss with an at-least-one-period minimum, so the
/// early values use however much history exists. Zero average loss is
/// guarded with a negligible epsilon. Series shorter than `window + 1`
/// points return a constant neutral 50.
pub fn compute_rsi(closes: &[f64], window: usize) -> Vec<f64> {
    let n = closes.len();
    if n < window + 1 || window == 0 {
        return vec![NEUTRAL_RSI; n];
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else {
            losses[i] = -delta;
        }
    }

    let mut rsi = vec![NEUTRAL_RSI; n];
    for i in 1..n {
        // Rolling mean over the last `window` deltas, fewer if that is all
        // the history there is. Index 0 has no delta and stays neutral.
        let start = if i >= window { i - window + 1 } else { 1 };
        let count = (i - start + 1) as f64;
        let avg_gain: f64 = gains[start..=i].iter().sum::<f64>() / count;
        let mut avg_loss: f64 = losses[start..=i].iter().sum::<f64>() / count;

        if avg_loss == 0.0 {
            avg_loss = 1e-10;
        }
        let rs = avg_gain / avg_loss;
        let value = 100.0 - (100.0 / (1.0 + rs));
        rsi[i] = if value.is_finite() { value } else { NEUTRAL_RSI };
    }

    rsi
}

/// Exponential moving average seeded with the first value
fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = match values.first() {
        Some(&v) => v,
        None => return out,
    };
    out.push(current);
    for &v in &values[1..] {
        current = alpha * v + (1.0 - alpha) * current;
        out.push(current);
    }
    out
}

/// MACD (12/26 EMA difference) and its 9-period signal line.
///
/// Series shorter than 26 points return constant zero for both.
pub fn compute_macd(closes: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = closes.len();
    if n < 26 {
        return (vec![0.0; n], vec![0.0; n]);
    }

    let fast = ema(closes, 12);
    let slow = ema(closes, 26);
    let macd: Vec<f64> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| {
            let v = f - s;
            if v.is_finite() {
                v
            } else {
                0.0
            }
        })
        .collect();
    let signal: Vec<f64> = ema(&macd, 9)
        .into_iter()
        .map(|v| if v.is_finite() { v } else { 0.0 })
        .collect();

    (macd, signal)
}

/// Assemble the `[close, rsi, macd, signal]` feature matrix for a close
/// series, using the default 14-day RSI window.
pub fn feature_matrix(closes: &[f64]) -> Vec<FeatureRow> {
    let rsi = compute_rsi(closes, 14);
    let (macd, signal) = compute_macd(closes);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| [close, rsi[i], macd[i], signal[i]])
        .collect()
}
