//! Pipeline configuration
//!
//! Everything a stage needs is carried in [`PipelineConfig`] and passed
//! explicitly. The whole structure round-trips through JSON so an operator
//! can keep a run profile on disk and override parts of it from the CLI.

use crate::error::{PipelineError, Result};
use crate::schema::{self, DatasetKind, SchemaPolicy};
use crate::training::MaxFeatures;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Annual conversion rate between a monthly-rent stream and a lump-sum deposit
pub const DEFAULT_CONVERSION_RATE: f64 = 0.05;

/// Placeholder substituted for missing complex/district names
pub const DEFAULT_MISSING_CATEGORY: &str = "기타";

/// How the categorical codebook behaves across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodebookMode {
    /// Fresh codebook per run, never written to disk
    Ephemeral,
    /// Load the persisted codebook, append unseen values, save it back
    #[default]
    Extend,
    /// Load the persisted codebook and reject unseen values
    Frozen,
}

/// Explicit per-stage file locations. Unset entries fall back to the
/// dataset's default names under `data_dir`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePaths {
    pub raw: Option<PathBuf>,
    pub processed: Option<PathBuf>,
    pub features: Option<PathBuf>,
    pub model: Option<PathBuf>,
    pub codebook: Option<PathBuf>,
}

/// Random forest and split settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Fraction of rows held out for evaluation
    pub test_size: f64,
    /// Seed for the split shuffle and the forest
    pub random_state: u64,
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Feature columns withheld from the model besides the target itself
    pub excluded_columns: Vec<String>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            excluded_columns: vec![schema::UNIFIED_VALUE.to_string()],
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_excluded_columns(mut self, columns: Vec<String>) -> Self {
        self.excluded_columns = columns;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must lie strictly between 0 and 1".to_string(),
            });
        }
        if self.n_estimators == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "at least one tree is required".to_string(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "min_samples_split".to_string(),
                value: self.min_samples_split.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        Ok(())
    }
}

/// Mock data generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub rent_rows: usize,
    pub sale_rows: usize,
    /// `None` seeds from OS entropy
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            rent_rows: 2_000,
            sale_rows: 200_000,
            seed: None,
        }
    }
}

impl SyntheticConfig {
    pub fn rows_for(&self, kind: DatasetKind) -> usize {
        match kind {
            DatasetKind::Rent => self.rent_rows,
            DatasetKind::Sale => self.sale_rows,
        }
    }
}

/// Top-level configuration shared by every stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dataset: DatasetKind,
    /// Directory holding the stage CSV files
    pub data_dir: PathBuf,
    pub paths: StagePaths,
    /// Where charts and the training report are written
    pub report_dir: PathBuf,
    pub conversion_rate: f64,
    pub schema_policy: SchemaPolicy,
    pub missing_category: String,
    pub codebook_mode: CodebookMode,
    pub training: TrainingConfig,
    pub synthetic: SyntheticConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetKind::Rent,
            data_dir: PathBuf::from("."),
            paths: StagePaths::default(),
            report_dir: PathBuf::from("reports"),
            conversion_rate: DEFAULT_CONVERSION_RATE,
            schema_policy: SchemaPolicy::Lenient,
            missing_category: DEFAULT_MISSING_CATEGORY.to_string(),
            codebook_mode: CodebookMode::Extend,
            training: TrainingConfig::default(),
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a JSON run profile. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::Config(format!("cannot open {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.conversion_rate > 0.0) || !self.conversion_rate.is_finite() {
            return Err(PipelineError::InvalidParameter {
                name: "conversion_rate".to_string(),
                value: self.conversion_rate.to_string(),
                reason: "must be a positive finite rate".to_string(),
            });
        }
        if self.missing_category.trim().is_empty() {
            return Err(PipelineError::Config(
                "missing_category placeholder must not be empty".to_string(),
            ));
        }
        self.training.validate()
    }

    pub fn with_dataset(mut self, dataset: DatasetKind) -> Self {
        self.dataset = dataset;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    pub fn with_conversion_rate(mut self, rate: f64) -> Self {
        self.conversion_rate = rate;
        self
    }

    pub fn with_schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = policy;
        self
    }

    pub fn with_missing_category(mut self, placeholder: impl Into<String>) -> Self {
        self.missing_category = placeholder.into();
        self
    }

    pub fn with_codebook_mode(mut self, mode: CodebookMode) -> Self {
        self.codebook_mode = mode;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticConfig) -> Self {
        self.synthetic = synthetic;
        self
    }

    fn default_path(&self, suffix: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}", self.dataset.file_stem(), suffix))
    }

    /// Stage 1 output / stage 2 input
    pub fn raw_path(&self) -> PathBuf {
        self.paths
            .raw
            .clone()
            .unwrap_or_else(|| self.default_path("raw_data.csv"))
    }

    /// Stage 2 output / stage 3 input
    pub fn processed_path(&self) -> PathBuf {
        self.paths
            .processed
            .clone()
            .unwrap_or_else(|| self.default_path("processed.csv"))
    }

    /// Stage 3 output / stage 4 input
    pub fn features_path(&self) -> PathBuf {
        self.paths
            .features
            .clone()
            .unwrap_or_else(|| self.default_path("final_features.csv"))
    }

    pub fn model_path(&self) -> PathBuf {
        self.paths
            .model
            .clone()
            .unwrap_or_else(|| self.default_path("model.json"))
    }

    pub fn codebook_path(&self) -> PathBuf {
        self.paths
            .codebook
            .clone()
            .unwrap_or_else(|| self.default_path("codebook.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_follow_dataset() {
        let config = PipelineConfig::new().with_data_dir("/data");
        assert_eq!(
            config.raw_path(),
            PathBuf::from("/data/apartment_rent_raw_data.csv")
        );
        let sale = config.with_dataset(DatasetKind::Sale);
        assert_eq!(
            sale.features_path(),
            PathBuf::from("/data/apartment_sales_final_features.csv")
        );
        assert_eq!(
            sale.processed_path(),
            PathBuf::from("/data/apartment_sales_processed.csv")
        );
    }

    #[test]
    fn test_explicit_path_wins() {
        let mut config = PipelineConfig::new();
        config.paths.processed = Some(PathBuf::from("clean.csv"));
        assert_eq!(config.processed_path(), PathBuf::from("clean.csv"));
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.conversion_rate, 0.05);
        assert_eq!(config.missing_category, "기타");
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.training.random_state, 42);
        assert_eq!(config.synthetic.rent_rows, 2_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_with_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{ "dataset": "sale", "conversion_rate": 0.04, "training": { "n_estimators": 10 } }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.dataset, DatasetKind::Sale);
        assert_eq!(config.conversion_rate, 0.04);
        assert_eq!(config.training.n_estimators, 10);
        assert_eq!(config.training.test_size, 0.2);

        let out = dir.path().join("saved.json");
        config.save(&out).unwrap();
        let reloaded = PipelineConfig::load(&out).unwrap();
        assert_eq!(reloaded.training.n_estimators, 10);
    }

    #[test]
    fn test_rejects_bad_rate() {
        let config = PipelineConfig::new().with_conversion_rate(0.0);
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_training_builder() {
        let training = TrainingConfig::new()
            .with_n_estimators(20)
            .with_max_depth(6)
            .with_test_size(0.3);
        assert_eq!(training.n_estimators, 20);
        assert_eq!(training.max_depth, Some(6));
        assert!(training.validate().is_ok());
        assert!(training.with_test_size(1.0).validate().is_err());
    }
}
