//! Error types for the apartment pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Expected input file is absent. `hint` tells the operator which stage produces it.
    #[error("Input file not found: {path} ({hint})")]
    MissingFile { path: PathBuf, hint: String },

    #[error("Cannot parse column '{column}' at row {row}: {value:?}")]
    Parse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Invalid contract date at row {row}: {value}")]
    Date { row: usize, value: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Cannot decode {path} as UTF-8 or CP949")]
    Decode { path: PathBuf },

    #[error("Column '{column}' is required by the {stage} stage but is missing")]
    MissingColumn { stage: String, column: String },

    #[error("Unknown category {value:?} in column '{column}' (codebook is frozen)")]
    UnknownCategory { column: String, value: String },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl PipelineError {
    /// Shorthand for a parse failure at `row` of `column`.
    pub fn parse(column: &str, row: usize, value: impl Into<String>) -> Self {
        PipelineError::Parse {
            column: column.to_string(),
            row,
            value: value.into(),
        }
    }

    /// Shorthand for a missing required column.
    pub fn missing_column(stage: &str, column: &str) -> Self {
        PipelineError::MissingColumn {
            stage: stage.to_string(),
            column: column.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::parse("보증금액", 3, "3O,000");
        assert_eq!(
            err.to_string(),
            "Cannot parse column '보증금액' at row 3: \"3O,000\""
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_missing_file_mentions_hint() {
        let err = PipelineError::MissingFile {
            path: PathBuf::from("apartment_rent_raw_data.csv"),
            hint: "run `aptprice generate` first".to_string(),
        };
        assert!(err.to_string().contains("aptprice generate"));
    }
}
