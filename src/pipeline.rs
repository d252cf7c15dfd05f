//! Stage orchestration
//!
//! Every stage loads its input file, transforms it fully in memory and
//! writes its output only once the transform succeeded. A failed stage
//! leaves every file from earlier stages untouched.

use crate::config::{CodebookMode, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::feature_engineering::{build_features, CategoryCodebook, FeatureBuilder, FeatureSummary};
use crate::preprocessing::{preprocess, PreprocessSummary};
use crate::schema;
use crate::synthetic;
use crate::training::{TrainEngine, TrainingReport};
use crate::utils::{DataLoader, DataSaver, StagedFiles, Timer};
use crate::visualization::{render_actual_vs_predicted, render_feature_importances};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Generate,
    Preprocess,
    Features,
    Train,
    Predict,
}

impl Stage {
    /// CLI subcommand producing this stage's output
    pub fn command(&self) -> &'static str {
        match self {
            Stage::Generate => "generate",
            Stage::Preprocess => "preprocess",
            Stage::Features => "features",
            Stage::Train => "train",
            Stage::Predict => "predict",
        }
    }

    fn missing_input_hint(&self) -> String {
        match self {
            Stage::Generate => String::new(),
            Stage::Preprocess => {
                "run `aptprice generate` first or place the raw API export there".to_string()
            }
            Stage::Features => "run `aptprice preprocess` first".to_string(),
            Stage::Train => "run `aptprice features` first".to_string(),
            Stage::Predict => "pass a preprocessed table".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Stage-specific detail of a completed stage
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageSummary {
    Generated { seeded: bool },
    Preprocessed(PreprocessSummary),
    Features(FeatureSummary),
    Trained(Box<TrainingReport>),
    Predicted { model: PathBuf },
}

/// Result of one successful stage
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Primary output file
    pub output: PathBuf,
    /// Side outputs (codebook, model, report, charts)
    pub artifacts: Vec<PathBuf>,
    pub summary: StageSummary,
    pub elapsed_secs: f64,
}

fn load_stage_input(stage: Stage, path: &Path) -> Result<DataFrame> {
    DataLoader::new()
        .with_missing_hint(stage.missing_input_hint())
        .load_csv(path)
}

/// Stage 1: write a mock raw table in place of the API download
pub fn run_generate(config: &PipelineConfig) -> Result<StageOutcome> {
    let timer = Timer::start();
    let mut raw = synthetic::generate(config.dataset, &config.synthetic)?;
    let output = config.raw_path();
    DataSaver::save_csv(&mut raw, &output)?;

    info!(stage = "generate", rows = raw.height(), path = %output.display(), "Stage complete");
    Ok(StageOutcome {
        stage: Stage::Generate,
        rows_in: 0,
        rows_out: raw.height(),
        output,
        artifacts: Vec::new(),
        summary: StageSummary::Generated {
            seeded: config.synthetic.seed.is_some(),
        },
        elapsed_secs: timer.elapsed().as_secs_f64(),
    })
}

/// Stage 2: raw API table to the clean table
pub fn run_preprocess(config: &PipelineConfig) -> Result<StageOutcome> {
    let timer = Timer::start();
    let raw = load_stage_input(Stage::Preprocess, &config.raw_path())?;
    let (mut clean, summary) = preprocess(&raw, config)?;
    let output = config.processed_path();
    DataSaver::save_csv(&mut clean, &output)?;

    info!(stage = "preprocess", rows = clean.height(), path = %output.display(), "Stage complete");
    Ok(StageOutcome {
        stage: Stage::Preprocess,
        rows_in: raw.height(),
        rows_out: clean.height(),
        output,
        artifacts: Vec::new(),
        summary: StageSummary::Preprocessed(summary),
        elapsed_secs: timer.elapsed().as_secs_f64(),
    })
}

/// Codebook for a feature run according to the configured mode
fn open_codebook(config: &PipelineConfig) -> Result<CategoryCodebook> {
    match config.codebook_mode {
        CodebookMode::Ephemeral => Ok(CategoryCodebook::new()),
        CodebookMode::Extend => CategoryCodebook::load_or_new(config.codebook_path()),
        CodebookMode::Frozen => CategoryCodebook::load(config.codebook_path()),
    }
}

/// Stage 3: clean table to the model-ready feature table
pub fn run_features(config: &PipelineConfig) -> Result<StageOutcome> {
    let timer = Timer::start();
    let clean = load_stage_input(Stage::Features, &config.processed_path())?;
    let mut codebook = open_codebook(config)?;
    let (mut features, summary) = build_features(&clean, &mut codebook, config)?;

    // Codebook first, feature table last: a failed stage leaves neither.
    let output = config.features_path();
    let mut staged = StagedFiles::new();
    let mut artifacts = Vec::new();
    if config.codebook_mode == CodebookMode::Extend {
        let path = config.codebook_path();
        staged.stage_bytes(codebook.to_json()?.as_bytes(), &path)?;
        artifacts.push(path);
    }
    staged.stage_csv(&mut features, &output)?;
    staged.commit()?;

    info!(stage = "features", rows = features.height(), path = %output.display(), "Stage complete");
    Ok(StageOutcome {
        stage: Stage::Features,
        rows_in: clean.height(),
        rows_out: features.height(),
        output,
        artifacts,
        summary: StageSummary::Features(summary),
        elapsed_secs: timer.elapsed().as_secs_f64(),
    })
}

/// Stage 4: fit the forest, persist it, write the report and charts
pub fn run_training(config: &PipelineConfig) -> Result<StageOutcome> {
    let timer = Timer::start();
    let features = load_stage_input(Stage::Train, &config.features_path())?;

    let mut engine = TrainEngine::new(config.training.clone(), config.dataset);
    let report = engine.fit(&features)?.clone();

    // Report first, model last: a failed stage leaves neither.
    let output = config.model_path();
    let stem = config.dataset.file_stem();
    let report_path = config.report_dir.join(format!("{}_report.json", stem));
    let mut staged = StagedFiles::new();
    staged.stage_bytes(serde_json::to_string_pretty(&report)?.as_bytes(), &report_path)?;
    staged.stage_bytes(engine.to_json()?.as_bytes(), &output)?;
    staged.commit()?;
    let mut artifacts = vec![report_path];

    let scatter = config
        .report_dir
        .join(format!("{}_actual_vs_predicted.svg", stem));
    match render_actual_vs_predicted(&report.actual, &report.predicted, &scatter) {
        Ok(()) => artifacts.push(scatter),
        Err(e) => warn!(error = %e, "Skipping actual-vs-predicted chart"),
    }

    let (names, values): (Vec<String>, Vec<f64>) =
        report.feature_importances.iter().cloned().unzip();
    let bars = config
        .report_dir
        .join(format!("{}_feature_importance.svg", stem));
    match render_feature_importances(&names, &values, &bars) {
        Ok(()) => artifacts.push(bars),
        Err(e) => warn!(error = %e, "Skipping feature importance chart"),
    }

    info!(stage = "train", path = %output.display(), r2 = report.metrics.r2, "Stage complete");
    Ok(StageOutcome {
        stage: Stage::Train,
        rows_in: features.height(),
        rows_out: report.n_test,
        output,
        artifacts,
        summary: StageSummary::Trained(Box::new(report)),
        elapsed_secs: timer.elapsed().as_secs_f64(),
    })
}

/// Predict prices for a clean table with the persisted model.
///
/// Categories are encoded with the persisted codebook in frozen mode, so a
/// district or complex the model never saw fails with `UnknownCategory`.
/// The monetary amount column is optional, so unlabeled listings can be
/// scored. The output is the input table with the prediction column appended.
pub fn run_predict(config: &PipelineConfig, input: &Path, output: &Path) -> Result<StageOutcome> {
    let timer = Timer::start();
    let clean = load_stage_input(Stage::Predict, input)?;

    let model_path = config.model_path();
    let engine = TrainEngine::load(&model_path)?;
    if engine.dataset() != config.dataset {
        return Err(PipelineError::Config(format!(
            "model at {} was trained on the {} dataset, not {}",
            model_path.display(),
            engine.dataset(),
            config.dataset
        )));
    }

    let frozen = config.clone().with_codebook_mode(CodebookMode::Frozen);
    let mut codebook = open_codebook(&frozen)?;
    let features = FeatureBuilder::for_scoring().transform(&clean, &mut codebook, &frozen)?;
    let predictions = engine.predict(&features)?;

    let mut scored = clean.clone();
    let rounded: Vec<i64> = predictions.iter().map(|p| p.round() as i64).collect();
    scored.with_column(Series::new(schema::PREDICTED_VALUE.into(), rounded))?;
    DataSaver::save_csv(&mut scored, output)?;

    info!(stage = "predict", rows = scored.height(), path = %output.display(), "Stage complete");
    Ok(StageOutcome {
        stage: Stage::Predict,
        rows_in: clean.height(),
        rows_out: scored.height(),
        output: output.to_path_buf(),
        artifacts: Vec::new(),
        summary: StageSummary::Predicted { model: model_path },
        elapsed_secs: timer.elapsed().as_secs_f64(),
    })
}

/// Stages 2 to 4 in order, optionally preceded by mock generation.
/// Stops at the first failing stage.
pub fn run_all(config: &PipelineConfig, generate: bool) -> Result<Vec<StageOutcome>> {
    config.validate()?;
    let mut outcomes = Vec::with_capacity(4);
    if generate {
        outcomes.push(run_generate(config)?);
    }
    outcomes.push(run_preprocess(config)?);
    outcomes.push(run_features(config)?);
    outcomes.push(run_training(config)?);
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyntheticConfig, TrainingConfig};
    use crate::schema::DatasetKind;
    use std::fs;

    fn small_config(dir: &Path, dataset: DatasetKind) -> PipelineConfig {
        PipelineConfig::new()
            .with_dataset(dataset)
            .with_data_dir(dir)
            .with_report_dir(dir.join("reports"))
            .with_training(TrainingConfig::default().with_n_estimators(10))
            .with_synthetic(SyntheticConfig {
                rent_rows: 120,
                sale_rows: 120,
                seed: Some(11),
            })
    }

    #[test]
    fn test_missing_raw_file_carries_hint() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path(), DatasetKind::Rent);
        match run_preprocess(&config) {
            Err(PipelineError::MissingFile { hint, .. }) => assert!(hint.contains("generate")),
            other => panic!("expected MissingFile, got {:?}", other.map(|o| o.stage)),
        }
        assert!(!config.processed_path().exists());
    }

    #[test]
    fn test_run_all_rent() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path(), DatasetKind::Rent);
        let outcomes = run_all(&config, true).unwrap();

        let stages: Vec<Stage> = outcomes.iter().map(|o| o.stage).collect();
        assert_eq!(
            stages,
            vec![Stage::Generate, Stage::Preprocess, Stage::Features, Stage::Train]
        );
        // row counts are preserved through stages 2 and 3
        assert_eq!(outcomes[1].rows_in, 120);
        assert_eq!(outcomes[1].rows_out, 120);
        assert_eq!(outcomes[2].rows_out, 120);
        assert_eq!(outcomes[3].rows_out, 24);

        assert!(config.model_path().exists());
        assert!(config.codebook_path().exists());
        assert!(dir.path().join("reports/apartment_rent_report.json").exists());
    }

    #[test]
    fn test_failed_stage_keeps_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path(), DatasetKind::Sale);
        run_generate(&config).unwrap();
        run_preprocess(&config).unwrap();
        let processed = fs::read(config.processed_path()).unwrap();

        // a frozen codebook that does not exist yet
        let frozen = config.clone().with_codebook_mode(CodebookMode::Frozen);
        assert!(matches!(
            run_features(&frozen),
            Err(PipelineError::MissingFile { .. })
        ));
        assert!(!config.features_path().exists());
        assert_eq!(fs::read(config.processed_path()).unwrap(), processed);
    }

    #[test]
    fn test_predict_appends_column() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path(), DatasetKind::Sale);
        run_all(&config, true).unwrap();

        let out = dir.path().join("scored.csv");
        let outcome = run_predict(&config, &config.processed_path(), &out).unwrap();
        assert_eq!(outcome.rows_out, 120);

        let scored = DataLoader::new().load_csv(&out).unwrap();
        assert!(schema::has_column(&scored, schema::PREDICTED_VALUE));
    }

    #[test]
    fn test_failed_codebook_write_leaves_no_features() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = small_config(dir.path(), DatasetKind::Rent);
        run_generate(&config).unwrap();
        run_preprocess(&config).unwrap();

        // the codebook directory is a regular file, so the codebook cannot land
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        config.paths.codebook = Some(blocker.join("codebook.json"));

        assert!(run_features(&config).is_err());
        assert!(!config.features_path().exists());
        assert!(!config.codebook_path().exists());
    }

    #[test]
    fn test_failed_report_write_leaves_no_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path(), DatasetKind::Sale);
        run_generate(&config).unwrap();
        run_preprocess(&config).unwrap();
        run_features(&config).unwrap();

        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let blocked = config.clone().with_report_dir(blocker.join("reports"));

        assert!(run_training(&blocked).is_err());
        assert!(!config.model_path().exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_predict_unlabeled_listings() {
        let dir = tempfile::tempdir().unwrap();
        let config = small_config(dir.path(), DatasetKind::Sale);
        run_all(&config, true).unwrap();

        let processed = DataLoader::new().load_csv(&config.processed_path()).unwrap();
        let mut listings = processed.drop("거래금액(만원)").unwrap();
        let input = dir.path().join("listings.csv");
        DataSaver::save_csv(&mut listings, &input).unwrap();

        let out = dir.path().join("listings_scored.csv");
        let outcome = run_predict(&config, &input, &out).unwrap();
        assert_eq!(outcome.rows_out, 120);

        let scored = DataLoader::new().load_csv(&out).unwrap();
        assert!(schema::has_column(&scored, schema::PREDICTED_VALUE));
        assert!(!schema::has_column(&scored, "거래금액(만원)"));
    }
}
