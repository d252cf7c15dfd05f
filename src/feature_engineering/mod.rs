//! Feature engineering
//!
//! Turns clean records into the model table: log-scaled target, the
//! lease-equivalent value of rent contracts, and integer codes for the
//! district and complex names.

mod builder;
pub mod codebook;
pub mod transforms;

pub use builder::{build_features, FeatureBuilder, FeatureSummary};
pub use codebook::CategoryCodebook;
pub use transforms::{inverse_log_transform, log_transform, unified_value};
