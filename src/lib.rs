//! aptprice - Apartment transaction ETL and price model
//!
//! A batch pipeline over Korean apartment rent and sale transaction
//! records, run as four file-backed stages:
//!
//! 1. [`synthetic`] - mock raw tables shaped like the open-data API export
//! 2. [`preprocessing`] - parse amounts, impute, derive age, lease type and date
//! 3. [`feature_engineering`] - log target, lease-equivalent value, category codes
//! 4. [`training`] - random forest on the feature table, hold-out metrics
//!
//! [`pipeline`] wires the stages to their input and output files and
//! [`cli`] exposes them as subcommands.
//!
//! # Modules
//!
//! - [`config`] - `PipelineConfig` and its JSON file
//! - [`schema`] - canonical column names and schema policy
//! - [`utils`] - CSV load/save and typed column access
//! - [`visualization`] - evaluation charts (SVG)

// Core error handling
pub mod error;

pub mod config;
pub mod schema;
pub mod utils;

// Stages
pub mod synthetic;
pub mod preprocessing;
pub mod feature_engineering;
pub mod training;
pub mod visualization;

pub mod pipeline;
pub mod cli;

pub use config::{CodebookMode, PipelineConfig, SyntheticConfig, TrainingConfig};
pub use error::{PipelineError, Result};
pub use pipeline::{
    run_all, run_features, run_generate, run_predict, run_preprocess, run_training, Stage,
    StageOutcome, StageSummary,
};
pub use schema::{DatasetKind, LeaseType, SchemaPolicy};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
