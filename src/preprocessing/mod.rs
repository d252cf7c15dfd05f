//! Raw record preprocessing
//!
//! Cleans the raw API fields into typed columns:
//! - currency text (`"30,000"`) to integer amounts
//! - year/month/day parts to an ISO contract date
//! - median imputation for construction year and floor
//! - lease type and property age derivation

mod imputer;
pub mod parse;
mod pipeline;

pub use imputer::Imputer;
pub use parse::{contract_date, parse_amount};
pub use pipeline::{preprocess, PreprocessSummary, Preprocessor};
