//! Missing value imputation

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Median imputer for numeric columns. Fill values are computed once per
/// column from the whole input and reused for every transform.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    fill_values: HashMap<String, f64>,
}

impl Imputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and remember the median of the observed values of `column`
    pub fn fit_values(&mut self, column: &str, values: &[Option<f64>]) -> Result<f64> {
        let observed: Vec<f64> = values.iter().flatten().copied().collect();
        if observed.is_empty() {
            return Err(PipelineError::InsufficientData(format!(
                "column '{}' has no observed values to impute from ({} rows)",
                column,
                values.len()
            )));
        }
        let fill = median(observed);
        self.fill_values.insert(column.to_string(), fill);
        Ok(fill)
    }

    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fill_values.get(column).copied()
    }

    /// Replace nulls in `values` with the fitted fill value for `column`
    pub fn transform_values(&self, column: &str, values: &[Option<f64>]) -> Result<Vec<f64>> {
        let fill = self
            .fill_value(column)
            .ok_or(PipelineError::ModelNotFitted)?;
        Ok(values.iter().map(|v| v.unwrap_or(fill)).collect())
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
