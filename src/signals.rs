//! Trading signal annotations derived from forecast points

use crate::forecaster::ForecastPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const STRONG_MOVE_PCT: f64 = 3.0;
const MODERATE_MOVE_PCT: f64 = 1.5;

/// Interval width, as a percentage of the mean, beyond which a forecast
/// is flagged as low confidence
const WIDE_INTERVAL_PCT: f64 = 10.0;

/// Advisory signal category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    StrongBuy,
    Buy,
    StrongSell,
    Sell,
    Caution,
}

/// One signal with a human-readable justification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub kind: SignalKind,
    pub reason: String,
}

/// Per-day signal record. An empty annotation list means no signal fired
/// for that day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub date: NaiveDate,
    pub price: f64,
    pub percent_change: f64,
    pub annotations: Vec<Annotation>,
}

/// Annotate forecast points with directional and confidence signals.
///
/// Direction keys off each point's step-over-step percent change; the
/// confidence flag is independent, so a day can carry zero, one, or two
/// annotations.
pub fn annotate(points: &[ForecastPoint]) -> Vec<Signal> {
    points
        .iter()
        .map(|point| {
            let mut annotations = Vec::new();

            let pc = point.percent_change;
            if pc >= STRONG_MOVE_PCT {
                annotations.push(Annotation {
                    kind: SignalKind::StrongBuy,
                    reason: format!("Projected gain of {pc:.2}% in one day"),
                });
            } else if pc >= MODERATE_MOVE_PCT {
                annotations.push(Annotation {
                    kind: SignalKind::Buy,
                    reason: format!("Projected gain of {pc:.2}% in one day"),
                });
            } else if pc <= -STRONG_MOVE_PCT {
                annotations.push(Annotation {
                    kind: SignalKind::StrongSell,
                    reason: format!("Projected drop of {:.2}% in one day", pc.abs()),
                });
            } else if pc <= -MODERATE_MOVE_PCT {
                annotations.push(Annotation {
                    kind: SignalKind::Sell,
                    reason: format!("Projected drop of {:.2}% in one day", pc.abs()),
                });
            }

            if point.mean_price > 0.0 {
                let width_pct =
                    (point.upper_bound - point.lower_bound) / point.mean_price * 100.0;
                if width_pct > WIDE_INTERVAL_PCT {
                    annotations.push(Annotation {
                        kind: SignalKind::Caution,
                        reason: format!(
                            "Confidence interval spans {width_pct:.1}% of the predicted price"
                        ),
                    });
                }
            }

            Signal {
                date: point.date,
                price: point.mean_price,
                percent_change: pc,
                annotations,
            }
        })
        .collect()
}
