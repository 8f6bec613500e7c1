//! Numeric scaling fit on the training partition.

use crate::config::NormMethod;
use serde::{Deserialize, Serialize};

/// Parameters for one column: `scaled = (x - offset) / scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub offset: f64,
    /// Zero marks a degenerate column, which scales to 0.
    pub scale: f64,
}

impl ColumnScale {
    pub fn apply(&self, x: f64) -> f64 {
        if self.scale == 0.0 {
            0.0
        } else {
            (x - self.offset) / self.scale
        }
    }
}

/// Fitted scaler over the leading `columns.len()` values of each row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub method: NormMethod,
    pub columns: Vec<ColumnScale>,
}

impl Scaler {
    /// Fit one `ColumnScale` per column of `rows`, each row at least `width` long.
    pub fn fit(method: NormMethod, rows: &[Vec<f64>], width: usize) -> Self {
        let columns = (0..width)
            .map(|col| {
                let values = rows.iter().map(|r| r[col]);
                match method {
                    NormMethod::None => ColumnScale {
                        offset: 0.0,
                        scale: 1.0,
                    },
                    NormMethod::MinMax => {
                        let (min, max) = values
                            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                                (lo.min(v), hi.max(v))
                            });
                        if min.is_finite() && max.is_finite() {
                            ColumnScale {
                                offset: min,
                                scale: max - min,
                            }
                        } else {
                            ColumnScale {
                                offset: 0.0,
                                scale: 0.0,
                            }
                        }
                    }
                    NormMethod::ZScore => {
                        if rows.is_empty() {
                            return ColumnScale {
                                offset: 0.0,
                                scale: 0.0,
                            };
                        }
                        let n = rows.len() as f64;
                        let mean = values.clone().sum::<f64>() / n;
                        let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                        ColumnScale {
                            offset: mean,
                            scale: var.sqrt(),
                        }
                    }
                }
            })
            .collect();
        Self { method, columns }
    }

    /// Scale the leading columns of `row` in place.
    pub fn transform(&self, row: &mut [f64]) {
        if self.method == NormMethod::None {
            return;
        }
        for (value, scale) in row.iter_mut().zip(&self.columns) {
            *value = scale.apply(*value);
        }
    }
}
