//! Training engine: feature matrix, hold-out evaluation, persistence

use super::models::ModelMetrics;
use super::random_forest::RandomForest;
use super::split::train_test_split;
use crate::config::TrainingConfig;
use crate::error::{PipelineError, Result};
use crate::feature_engineering::inverse_log_transform;
use crate::schema::{self, DatasetKind};
use crate::utils::columns::f64_values;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Outcome of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub dataset: DatasetKind,
    pub n_train: usize,
    pub n_test: usize,
    pub feature_names: Vec<String>,
    /// (feature, importance), most important first
    pub feature_importances: Vec<(String, f64)>,
    /// Metrics on the monetary scale (만원)
    pub metrics: ModelMetrics,
    /// Held-out targets on the monetary scale
    pub actual: Vec<f64>,
    /// Held-out predictions on the monetary scale
    pub predicted: Vec<f64>,
    pub training_time_secs: f64,
}

/// Fits and serves the price model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainEngine {
    config: TrainingConfig,
    dataset: DatasetKind,
    feature_names: Vec<String>,
    model: Option<RandomForest>,
    report: Option<TrainingReport>,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig, dataset: DatasetKind) -> Self {
        Self {
            config,
            dataset,
            feature_names: Vec::new(),
            model: None,
            report: None,
        }
    }

    /// Columns used as model inputs: every column except the target and
    /// the configured exclusions
    pub fn select_features(&self, df: &DataFrame) -> Vec<String> {
        let target = self.dataset.target_column();
        df.get_column_names()
            .iter()
            .map(|c| c.to_string())
            .filter(|name| name != target && !self.config.excluded_columns.contains(name))
            .collect()
    }

    /// Split, fit on the training rows and evaluate on the held-out rows
    pub fn fit(&mut self, df: &DataFrame) -> Result<&TrainingReport> {
        let start = Instant::now();
        self.config.validate()?;
        let target = self.dataset.target_column();
        schema::require_columns(df, &[target], "train")?;

        let feature_names = self.select_features(df);
        if feature_names.is_empty() {
            return Err(PipelineError::InsufficientData(
                "no feature columns left after exclusions".to_string(),
            ));
        }

        let x = columns_to_array2(df, &feature_names)?;
        let y = Array1::from_vec(f64_values(df, target)?);

        let split = train_test_split(df.height(), self.config.test_size, self.config.random_state)?;
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_test = x.select(Axis(0), &split.test_indices);
        let y_test = y.select(Axis(0), &split.test_indices);

        let mut model = RandomForest::new(self.config.n_estimators)
            .with_max_depth(self.config.max_depth)
            .with_min_samples_split(self.config.min_samples_split)
            .with_min_samples_leaf(self.config.min_samples_leaf)
            .with_max_features(self.config.max_features)
            .with_bootstrap(self.config.bootstrap)
            .with_random_state(self.config.random_state);
        model.fit(&x_train, &y_train)?;

        let actual = y_test.mapv(inverse_log_transform);
        let predicted = model.predict(&x_test)?.mapv(inverse_log_transform);
        let metrics = ModelMetrics::compute_regression(&actual, &predicted);

        let mut feature_importances: Vec<(String, f64)> = match model.feature_importances() {
            Some(imp) => feature_names.iter().cloned().zip(imp.iter().copied()).collect(),
            None => Vec::new(),
        };
        feature_importances.sort_by(|a, b| b.1.total_cmp(&a.1));

        let report = TrainingReport {
            dataset: self.dataset,
            n_train: split.train_indices.len(),
            n_test: split.test_indices.len(),
            feature_names: feature_names.clone(),
            feature_importances,
            metrics,
            actual: actual.to_vec(),
            predicted: predicted.to_vec(),
            training_time_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            dataset = %self.dataset,
            n_train = report.n_train,
            n_test = report.n_test,
            r2 = report.metrics.r2,
            rmse = report.metrics.rmse,
            mae = report.metrics.mae,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model trained"
        );

        self.feature_names = feature_names;
        self.model = Some(model);
        Ok(&*self.report.insert(report))
    }

    /// Predictions on the monetary scale for rows of a feature table
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let model = self.model.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        schema::require_columns(
            df,
            &self.feature_names.iter().map(String::as_str).collect::<Vec<_>>(),
            "predict",
        )?;
        let x = columns_to_array2(df, &self.feature_names)?;
        Ok(model.predict(&x)?.mapv(inverse_log_transform))
    }

    pub fn report(&self) -> Option<&TrainingReport> {
        self.report.as_ref()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn dataset(&self) -> DatasetKind {
        self.dataset
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    /// JSON form of the fitted engine, read back by [`TrainEngine::load`]
    pub fn to_json(&self) -> Result<String> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelNotFitted);
        }
        Ok(serde_json::to_string(self)?)
    }

    /// Load an engine from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingFile {
                path: path.to_path_buf(),
                hint: "run `aptprice train` first".to_string(),
            });
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Extract named columns into a row-major matrix. Any null or
/// non-numeric cell is a parse error.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let col_data = col_names
        .iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<Vec<f64>>>>()?;
    Ok(Array2::from_shape_fn((df.height(), col_names.len()), |(r, c)| {
        col_data[c][r]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_engineering::log_transform;

    fn feature_frame(n: usize) -> DataFrame {
        let area: Vec<f64> = (0..n).map(|i| 50.0 + i as f64).collect();
        let floor: Vec<i64> = (0..n).map(|i| (i % 20) as i64 + 1).collect();
        let unified: Vec<i64> = (0..n).map(|i| 10_000 + 100 * i as i64).collect();
        let target: Vec<f64> = (0..n)
            .map(|i| log_transform(10_000.0 + 100.0 * i as f64))
            .collect();
        df!(
            "전용면적(㎡)" => area,
            "층" => floor,
            "전세환산가(만원)" => unified,
            "log_보증금" => target,
        )
        .unwrap()
    }

    #[test]
    fn test_excludes_target_and_unified_value() {
        let engine = TrainEngine::new(TrainingConfig::default(), DatasetKind::Rent);
        let features = engine.select_features(&feature_frame(5));
        assert_eq!(features, vec!["전용면적(㎡)".to_string(), "층".to_string()]);
    }

    #[test]
    fn test_fit_reports_monetary_metrics() {
        let mut engine = TrainEngine::new(
            TrainingConfig::default().with_n_estimators(20),
            DatasetKind::Rent,
        );
        let report = engine.fit(&feature_frame(50)).unwrap().clone();
        assert_eq!(report.n_test, 10);
        assert_eq!(report.n_train, 40);
        assert_eq!(report.actual.len(), 10);
        // targets were in the 10,000..15,000 range before the log
        assert!(report.actual.iter().all(|v| (9_999.0..15_000.0).contains(v)));
        assert!(report.metrics.r2 > 0.5, "r2 = {}", report.metrics.r2);
        assert_eq!(report.feature_importances.len(), 2);
        assert_eq!(report.feature_importances[0].0, "전용면적(㎡)");
    }

    #[test]
    fn test_save_load_predict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let df = feature_frame(30);

        let mut engine = TrainEngine::new(
            TrainingConfig::default().with_n_estimators(5),
            DatasetKind::Rent,
        );
        engine.fit(&df).unwrap();
        fs::write(&path, engine.to_json().unwrap()).unwrap();

        let loaded = TrainEngine::load(&path).unwrap();
        let before = engine.predict(&df).unwrap();
        let after = loaded.predict(&df).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() <= 1e-6 * a.abs(), "{a} vs {b}");
        }
        assert_eq!(loaded.feature_names(), engine.feature_names());
    }

    #[test]
    fn test_unfitted_engine() {
        let engine = TrainEngine::new(TrainingConfig::default(), DatasetKind::Sale);
        assert!(matches!(
            engine.predict(&feature_frame(3)),
            Err(PipelineError::ModelNotFitted)
        ));
        assert!(matches!(
            TrainEngine::load("/nonexistent/model.json"),
            Err(PipelineError::MissingFile { .. })
        ));
    }

    #[test]
    fn test_missing_target() {
        let df = feature_frame(10).drop("log_보증금").unwrap();
        let mut engine = TrainEngine::new(TrainingConfig::default(), DatasetKind::Rent);
        assert!(matches!(
            engine.fit(&df),
            Err(PipelineError::MissingColumn { .. })
        ));
    }
}
