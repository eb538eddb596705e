//! Regression error measures.

use serde::{Deserialize, Serialize};

/// Mean absolute error; 0 for empty input.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() { return 0.0 }
    actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum::<f64>() / actual.len() as f64
}

/// Root mean squared error; 0 for empty input.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() { return 0.0 }
    (actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / actual.len() as f64).sqrt()
}

/// Coefficient of determination `1 - SS_res / SS_tot`.
/// A target with zero variance has no explainable variance, so R² is 0.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() { return 0.0 }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 { return 0.0 }
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    1.0 - ss_res / ss_tot
}

/// Error measures over one partition of the data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub samples: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// `None` for an empty partition.
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        if actual.is_empty() { return None }
        Some(Self {
            samples: actual.len(),
            mae: mae(actual, predicted),
            rmse: rmse(actual, predicted),
            r2: r2(actual, predicted),
        })
    }
}

/// Training summary stored with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub train: RegressionMetrics,
    /// Held-out partition; absent when only one usable row exists.
    pub test: Option<RegressionMetrics>,
    /// Rows dropped for a missing or non-finite target.
    pub dropped_rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.0, 2.0, 3.0, 8.0];
        assert_eq!(mae(&actual, &predicted), 1.0);
        assert_eq!(rmse(&actual, &predicted), 2.0);
        // SS_tot = 5, SS_res = 16
        assert_eq!(r2(&actual, &predicted), 1.0 - 16.0 / 5.0);
        assert_eq!(r2(&actual, &actual), 1.0);
    }

    #[test]
    fn zero_variance_target() {
        assert_eq!(r2(&[2.0, 2.0], &[2.0, 2.0]), 0.0);
        assert_eq!(r2(&[2.0, 2.0], &[1.0, 3.0]), 0.0);
        assert_eq!(RegressionMetrics::evaluate(&[], &[]), None);
    }
}
