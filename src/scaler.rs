//! Min-max feature scaling and window preparation

use crate::error::{ForecastError, Result};
use crate::indicators::{FeatureRow, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// A fixed-length sequence of normalized feature rows
pub type Window = Vec<FeatureRow>;

/// Per-column min-max scaler mapping features into [0, 1].
///
/// Bounds are fit once on the full historical feature matrix for a
/// forecast run and reused for every transform, including each rollout
/// step; they are never refit mid-rollout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    mins: [f64; FEATURE_COUNT],
    ranges: [f64; FEATURE_COUNT],
}

impl MinMaxScaler {
    /// Fit column bounds on a feature matrix
    pub fn fit(matrix: &[FeatureRow]) -> Result<Self> {
        if matrix.is_empty() {
            return Err(ForecastError::DataError(
                "Cannot fit scaler on empty feature matrix".to_string(),
            ));
        }

        let mut mins = [f64::INFINITY; FEATURE_COUNT];
        let mut maxs = [f64::NEG_INFINITY; FEATURE_COUNT];
        for row in matrix {
            for (col, &value) in row.iter().enumerate() {
                if !value.is_finite() {
                    return Err(ForecastError::DataError(format!(
                        "Non-finite value in feature column {col}"
                    )));
                }
                mins[col] = mins[col].min(value);
                maxs[col] = maxs[col].max(value);
            }
        }

        let mut ranges = [1.0; FEATURE_COUNT];
        for col in 0..FEATURE_COUNT {
            let range = maxs[col] - mins[col];
            // A constant column maps to 0 rather than dividing by zero
            ranges[col] = if range > 0.0 { range } else { 1.0 };
        }

        Ok(Self { mins, ranges })
    }

    /// Normalize one feature row
    pub fn transform_row(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = [0.0; FEATURE_COUNT];
        for col in 0..FEATURE_COUNT {
            out[col] = (row[col] - self.mins[col]) / self.ranges[col];
        }
        out
    }

    /// Normalize a whole feature matrix
    pub fn transform(&self, matrix: &[FeatureRow]) -> Vec<FeatureRow> {
        matrix.iter().map(|row| self.transform_row(row)).collect()
    }

    /// Map a normalized row back to original units
    pub fn inverse_row(&self, row: &FeatureRow) -> FeatureRow {
        let mut out = [0.0; FEATURE_COUNT];
        for col in 0..FEATURE_COUNT {
            out[col] = row[col] * self.ranges[col] + self.mins[col];
        }
        out
    }

    /// Decode a close-only prediction: inverse-transform a row holding the
    /// normalized close in column 0 and zeros elsewhere, returning the
    /// price-space close.
    pub fn inverse_close(&self, normalized_close: f64) -> f64 {
        let row = {
            let mut r = [0.0; FEATURE_COUNT];
            r[0] = normalized_close;
            r
        };
        self.inverse_row(&row)[0]
    }

    /// Forward-transform a single price-space close into normalized space
    pub fn transform_close(&self, close: f64) -> f64 {
        (close - self.mins[0]) / self.ranges[0]
    }
}

/// Slice a normalized matrix into fixed-length sliding windows paired with
/// next-step close targets: window `i` covers rows `[i - lookback, i)` and
/// its target is the column-0 value at row `i`.
pub fn windowize(matrix: &[FeatureRow], lookback: usize) -> Result<(Vec<Window>, Vec<f64>)> {
    if lookback == 0 {
        return Err(ForecastError::InvalidParameter(
            "Lookback must be positive".to_string(),
        ));
    }
    if matrix.len() <= lookback {
        return Err(ForecastError::DataError(format!(
            "Need more than {} rows to build windows, have {}",
            lookback,
            matrix.len()
        )));
    }

    let mut windows = Vec::with_capacity(matrix.len() - lookback);
    let mut targets = Vec::with_capacity(matrix.len() - lookback);
    for i in lookback..matrix.len() {
        windows.push(matrix[i - lookback..i].to_vec());
        targets.push(matrix[i][0]);
    }

    Ok((windows, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_matrix() -> Vec<FeatureRow> {
        vec![
            [100.0, 30.0, -1.0, -0.5],
            [110.0, 50.0, 0.0, 0.0],
            [120.0, 70.0, 1.0, 0.5],
        ]
    }

    #[test]
    fn transform_maps_into_unit_range() {
        let matrix = sample_matrix();
        let scaler = MinMaxScaler::fit(&matrix).unwrap();
        let scaled = scaler.transform(&matrix);
        assert_eq!(scaled[0], [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(scaled[2], [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn round_trip_recovers_original_rows() {
        let matrix = sample_matrix();
        let scaler = MinMaxScaler::fit(&matrix).unwrap();
        for row in &matrix {
            let back = scaler.inverse_row(&scaler.transform_row(row));
            for col in 0..FEATURE_COUNT {
                assert!((back[col] - row[col]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn close_only_decode_matches_full_inverse() {
        let matrix = sample_matrix();
        let scaler = MinMaxScaler::fit(&matrix).unwrap();
        let normalized = scaler.transform_row(&matrix[1]);
        let price = scaler.inverse_close(normalized[0]);
        assert!((price - 110.0).abs() < 1e-9);
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let matrix = vec![[100.0, 50.0, 0.0, 0.0], [110.0, 50.0, 0.0, 0.0]];
        let scaler = MinMaxScaler::fit(&matrix).unwrap();
        let scaled = scaler.transform_row(&matrix[0]);
        assert_eq!(scaled[1], 0.0);
    }

    #[test]
    fn windowize_pairs_windows_with_targets() {
        let matrix: Vec<FeatureRow> = (0..6).map(|i| [i as f64, 0.0, 0.0, 0.0]).collect();
        let (windows, targets) = windowize(&matrix, 3).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(targets, vec![3.0, 4.0, 5.0]);
        assert_eq!(windows[0][0][0], 0.0);
        assert_eq!(windows[2][2][0], 4.0);
    }

    #[test]
    fn windowize_rejects_short_matrix() {
        let matrix: Vec<FeatureRow> = (0..3).map(|i| [i as f64, 0.0, 0.0, 0.0]).collect();
        assert!(windowize(&matrix, 3).is_err());
    }
}
