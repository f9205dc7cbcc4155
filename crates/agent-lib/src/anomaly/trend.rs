//! Linear trend estimation
//!
//! Fits an ordinary least squares line to one memory metric against sample
//! index (0..n-1) and reports slope, intercept and R².

use crate::models::MemorySample;
use serde::Serialize;

/// Memory metric a trend is fitted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    HeapUsed,
    HeapTotal,
    Rss,
    External,
}

impl Metric {
    pub fn value(&self, sample: &MemorySample) -> u64 {
        match self {
            Metric::HeapUsed => sample.heap_used,
            Metric::HeapTotal => sample.heap_total,
            Metric::Rss => sample.rss,
            Metric::External => sample.external,
        }
    }
}

/// Linear regression summary for a window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    /// Bytes per sample-index unit
    pub slope: f64,
    pub intercept: f64,
    /// Goodness of fit; 0 when the correlation is undefined
    pub r_squared: f64,
}

/// Pure OLS trend fitter
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendEstimator {
    metric: Metric,
}

impl TrendEstimator {
    pub fn new(metric: Metric) -> Self {
        Self { metric }
    }

    /// Fit a line through `samples`, oldest first
    ///
    /// Fewer than two samples or a flat series yield `r_squared = 0`.
    pub fn estimate(&self, samples: &[MemorySample]) -> TrendResult {
        let n = samples.len();
        if n == 0 {
            return TrendResult::default();
        }

        let ys: Vec<f64> = samples
            .iter()
            .map(|s| self.metric.value(s) as f64)
            .collect();

        if n < 2 {
            return TrendResult {
                slope: 0.0,
                intercept: ys[0],
                r_squared: 0.0,
            };
        }

        let n_f = n as f64;
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xy = 0.0;
        let mut sum_xx = 0.0;

        for (i, y) in ys.iter().enumerate() {
            let x = i as f64;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denominator = n_f * sum_xx - sum_x * sum_x;
        let slope = if denominator.abs() < f64::EPSILON {
            0.0
        } else {
            (n_f * sum_xy - sum_x * sum_y) / denominator
        };
        let intercept = (sum_y - slope * sum_x) / n_f;

        TrendResult {
            slope,
            intercept,
            r_squared: r_squared(&ys, slope, intercept, sum_y / n_f),
        }
    }
}

/// Coefficient of determination for the fitted line
fn r_squared(ys: &[f64], slope: f64, intercept: f64, mean_y: f64) -> f64 {
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;

    for (i, y) in ys.iter().enumerate() {
        let y_pred = slope * i as f64 + intercept;
        ss_res += (y - y_pred).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }

    if ss_tot.abs() < f64::EPSILON {
        return 0.0;
    }

    1.0 - (ss_res / ss_tot)
}
