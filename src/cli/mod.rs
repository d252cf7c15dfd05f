//! aptprice CLI Module
//!
//! Command-line interface for running the pipeline stages.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};

use crate::config::{CodebookMode, PipelineConfig};
use crate::error::PipelineError;
use crate::pipeline::{
    run_all, run_features, run_generate, run_predict, run_preprocess, run_training, StageOutcome,
    StageSummary,
};
use crate::schema::{DatasetKind, SchemaPolicy};
use crate::training::TrainingReport;
use crate::utils::{format_thousands, DataLoader};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width
const TOP_FEATURES: usize = 5;

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "aptprice")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Apartment rent/sale transaction ETL and price model")]
#[command(long_about = None)]
pub struct Cli {
    /// Pipeline configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dataset to process (rent, sale)
    #[arg(long, global = true)]
    pub dataset: Option<DatasetKind>,

    /// Directory holding the stage files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Fail when an expected column is absent instead of skipping it
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a mock raw table in place of the API download
    Generate {
        /// Number of rows
        #[arg(long)]
        rows: Option<usize>,

        /// Random seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Clean the raw table
    Preprocess,

    /// Build the model-ready feature table
    Features {
        /// Category codebook mode (ephemeral, extend, frozen)
        #[arg(long, value_parser = ["ephemeral", "extend", "frozen"])]
        codebook: Option<String>,
    },

    /// Train the random forest and write the evaluation report
    Train {
        /// Number of trees
        #[arg(long)]
        n_estimators: Option<usize>,

        /// Maximum tree depth
        #[arg(long)]
        max_depth: Option<usize>,

        /// Random seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Predict prices for a preprocessed table
    Predict {
        /// Preprocessed input (defaults to the stage 2 output)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file with the prediction column appended
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run preprocess, features and train in order
    Run {
        /// Generate mock raw data first
        #[arg(long)]
        generate: bool,
    },

    /// Show stage files for the dataset, or one given file
    Info {
        /// CSV file to inspect
        data: Option<PathBuf>,
    },
}

/// Configuration from the optional file with command-line overrides applied
pub fn resolve_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dataset) = cli.dataset {
        config.dataset = dataset;
    }
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.strict {
        config.schema_policy = SchemaPolicy::Strict;
    }
    Ok(config)
}

fn parse_codebook_mode(mode: &str) -> anyhow::Result<CodebookMode> {
    Ok(match mode {
        "ephemeral" => CodebookMode::Ephemeral,
        "extend" => CodebookMode::Extend,
        "frozen" => CodebookMode::Frozen,
        other => anyhow::bail!("Invalid codebook mode: {}", other),
    })
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = resolve_config(&cli)?;

    match cli.command {
        Commands::Generate { rows, seed } => {
            if let Some(rows) = rows {
                match config.dataset {
                    DatasetKind::Rent => config.synthetic.rent_rows = rows,
                    DatasetKind::Sale => config.synthetic.sale_rows = rows,
                }
            }
            if seed.is_some() {
                config.synthetic.seed = seed;
            }
            cmd_generate(&config)
        }
        Commands::Preprocess => cmd_preprocess(&config),
        Commands::Features { codebook } => {
            if let Some(mode) = codebook {
                config.codebook_mode = parse_codebook_mode(&mode)?;
            }
            cmd_features(&config)
        }
        Commands::Train { n_estimators, max_depth, seed } => {
            if let Some(n) = n_estimators {
                config.training.n_estimators = n;
            }
            if max_depth.is_some() {
                config.training.max_depth = max_depth;
            }
            if let Some(seed) = seed {
                config.training.random_state = seed;
            }
            cmd_train(&config)
        }
        Commands::Predict { input, output } => {
            let input = input.unwrap_or_else(|| config.processed_path());
            cmd_predict(&config, &input, &output)
        }
        Commands::Run { generate } => cmd_run(&config, generate),
        Commands::Info { data } => cmd_info(&config, data.as_deref()),
    }
}

/// Print the operator hint for errors that have one
pub fn report_error(err: &anyhow::Error) {
    eprintln!();
    eprintln!("  {} {}", "✗".red(), err);
    if let Some(PipelineError::MissingFile { hint, .. }) = err.downcast_ref::<PipelineError>() {
        eprintln!("  {} {}", accent("›"), hint);
    }
    eprintln!();
}

fn outcome_line(outcome: &StageOutcome) {
    step_done(&format!(
        "{} → {} rows in {:.2}s",
        format_thousands(outcome.rows_in as i64),
        format_thousands(outcome.rows_out as i64),
        outcome.elapsed_secs
    ));
    step_ok(&format!("wrote {}", outcome.output.display()));
    for artifact in &outcome.artifacts {
        step_ok(&format!("wrote {}", artifact.display()));
    }
}

pub fn cmd_generate(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Generate");
    step_run(&format!("Generating mock {} listings", config.dataset.to_string().cyan()));
    let outcome = run_generate(config)?;
    outcome_line(&outcome);
    println!();
    Ok(())
}

pub fn cmd_preprocess(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Preprocess");
    step_run(&format!("Cleaning {}", config.raw_path().display()));
    let outcome = run_preprocess(config)?;
    outcome_line(&outcome);

    if let StageSummary::Preprocessed(summary) = &outcome.summary {
        println!();
        if let Some(median) = summary.build_year_median {
            println!("  {:<20} {} ({} rows)", muted("Build year median"), median, summary.imputed_build_year);
        }
        if let Some(median) = summary.floor_median {
            println!("  {:<20} {} ({} rows)", muted("Floor median"), median, summary.imputed_floor);
        }
        if config.dataset == DatasetKind::Rent {
            println!(
                "  {:<20} {} / {}",
                muted("Lease / rent"),
                summary.lease_rows,
                summary.monthly_rent_rows
            );
        }
        if summary.negative_age_rows > 0 {
            println!("  {:<20} {}", muted("Negative age"), summary.negative_age_rows.to_string().yellow());
        }
    }
    println!();
    Ok(())
}

pub fn cmd_features(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Features");
    step_run(&format!("Encoding {}", config.processed_path().display()));
    let outcome = run_features(config)?;
    outcome_line(&outcome);

    if let StageSummary::Features(summary) = &outcome.summary {
        println!();
        println!("  {:<20} {}", muted("Districts"), summary.district_categories);
        println!("  {:<20} {}", muted("Complexes"), summary.complex_categories);
        println!("  {:<20} {}", muted("Placeholder fills"), summary.placeholder_fills);
        println!("  {:<20} {}", muted("Columns"), summary.output_columns.join(", "));
    }
    println!();
    Ok(())
}

fn print_report(report: &TrainingReport) {
    println!();
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", report.metrics.r2).white().bold());
    println!("  {:<16} {}", muted("RMSE (만원)"), format!("{:.0}", report.metrics.rmse).white());
    println!("  {:<16} {}", muted("MAE (만원)"), format!("{:.0}", report.metrics.mae).white());
    println!("  {:<16} {}", muted("Train / test"), format!("{} / {}", report.n_train, report.n_test).white());
    println!("  {:<16} {}", muted("Time"), format!("{:.3}s", report.training_time_secs).white());

    println!();
    println!("  {:<24} {:>10}", muted("Feature"), muted("Importance"));
    println!("  {}", dim(&"─".repeat(36)));
    for (name, importance) in report.feature_importances.iter().take(TOP_FEATURES) {
        println!("  {:<24} {:>10.4}", name, importance);
    }
    println!();
}

pub fn cmd_train(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Train");
    step_run(&format!(
        "Training {} trees on {}",
        config.training.n_estimators.to_string().cyan(),
        config.features_path().display()
    ));
    let outcome = run_training(config)?;
    outcome_line(&outcome);
    if let StageSummary::Trained(report) = &outcome.summary {
        print_report(report);
    }
    Ok(())
}

pub fn cmd_predict(config: &PipelineConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    section("Predict");
    step_run(&format!("Scoring {}", input.display()));
    let outcome = run_predict(config, input, output)?;
    outcome_line(&outcome);
    println!();
    Ok(())
}

pub fn cmd_run(config: &PipelineConfig, generate: bool) -> anyhow::Result<()> {
    section(&format!("Run ({})", config.dataset));
    step_run("Running stages");
    let outcomes = run_all(config, generate)?;
    step_done(&format!("{} stages", outcomes.len()));

    println!();
    line_box_top();
    line_box_center(&format!("{}", "aptprice".white().bold()));
    line_box_sep();
    for outcome in &outcomes {
        line_box(&kv(
            &format!("{:<11}", outcome.stage.command()),
            &format!(
                "{:>9} rows  {:.2}s",
                format_thousands(outcome.rows_out as i64),
                outcome.elapsed_secs
            ),
        ));
    }
    line_box_bottom();

    if let Some(StageSummary::Trained(report)) = outcomes.last().map(|o| &o.summary) {
        print_report(report);
    }
    Ok(())
}

pub fn cmd_info(config: &PipelineConfig, data: Option<&Path>) -> anyhow::Result<()> {
    section("Data Info");

    let paths: Vec<PathBuf> = match data {
        Some(path) => vec![path.to_path_buf()],
        None => vec![
            config.raw_path(),
            config.processed_path(),
            config.features_path(),
        ],
    };

    let loader = DataLoader::new();
    for path in paths {
        if !path.exists() {
            println!("  {:<12} {} {}", muted("File"), path.display(), dim("(missing)"));
            println!();
            continue;
        }
        let info = loader.get_file_info(&path)?;
        println!("  {:<12} {}", muted("File"), info.path.display());
        println!("  {:<12} {}", muted("Rows"), info.n_rows);
        println!("  {:<12} {}", muted("Columns"), info.n_cols);
        println!("  {:<12} {}", muted("Encoding"), info.encoding);
        println!("  {:<12} {:.2} KB", muted("Size"), info.file_size as f64 / 1024.0);
        println!();

        println!("  {:<24} {:>6}", muted("Column"), muted("Nulls"));
        println!("  {}", dim(&"─".repeat(32)));
        for (name, nulls) in info.columns.iter().zip(&info.null_counts) {
            println!("  {:<24} {:>6}", name, nulls);
        }
        println!();
    }

    let model = config.model_path();
    println!(
        "  {:<12} {} {}",
        muted("Model"),
        model.display(),
        if model.exists() { ok("(present)") } else { dim("(missing)") }
    );
    println!();
    Ok(())
}
