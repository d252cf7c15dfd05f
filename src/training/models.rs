//! Evaluation metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Regression metrics on the monetary scale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    pub n_samples: usize,
}

impl ModelMetrics {
    /// Compute regression metrics. An empty input yields all-zero metrics;
    /// a constant target yields R² = 0.
    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n_samples = y_true.len().min(y_pred.len());
        if n_samples == 0 {
            return Self::default();
        }
        let n = n_samples as f64;

        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let mean = y_true.iter().take(n_samples).sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().take(n_samples).map(|t| (t - mean).powi(2)).sum();
        let ss_res = mse * n;
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            mse,
            rmse: mse.sqrt(),
            mae,
            r2,
            n_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_fit() {
        let y = array![1.0, 2.0, 3.0];
        let m = ModelMetrics::compute_regression(&y, &y);
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_known_values() {
        let y_true = array![10.0, 20.0, 30.0, 40.0];
        let y_pred = array![12.0, 18.0, 33.0, 37.0];
        let m = ModelMetrics::compute_regression(&y_true, &y_pred);
        // errors: -2, 2, -3, 3
        assert!((m.mae - 2.5).abs() < 1e-12);
        assert!((m.mse - 6.5).abs() < 1e-12);
        assert!((m.rmse - 6.5f64.sqrt()).abs() < 1e-12);
        // ss_tot = 500, ss_res = 26
        assert!((m.r2 - (1.0 - 26.0 / 500.0)).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target() {
        let y_true = array![5.0, 5.0];
        let m = ModelMetrics::compute_regression(&y_true, &array![4.0, 6.0]);
        assert_eq!(m.r2, 0.0);
        assert_eq!(m.mae, 1.0);
    }
}
