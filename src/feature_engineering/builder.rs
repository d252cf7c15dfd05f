//! Feature table construction

use super::codebook::CategoryCodebook;
use super::transforms::{log_transform, unified_value};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::schema::{self, DatasetKind, LeaseType};
use crate::utils::columns::{f64_values, string_values, whole_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

const STAGE: &str = "features";

/// What happened during one feature run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub rows: usize,
    pub rename_applied: bool,
    /// Missing complex/district names replaced by the placeholder
    pub placeholder_fills: usize,
    pub district_categories: usize,
    pub complex_categories: usize,
    pub output_columns: Vec<String>,
}

/// Builds model-ready features from clean records
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    /// Accept records without the monetary amount (new listings to score)
    unlabeled: bool,
    summary: Option<FeatureSummary>,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for scoring: when the amount column is absent, the log
    /// target and the unified value are left out instead of failing
    pub fn for_scoring() -> Self {
        Self {
            unlabeled: true,
            summary: None,
        }
    }

    pub fn summary(&self) -> Option<&FeatureSummary> {
        self.summary.as_ref()
    }

    pub fn transform(
        &mut self,
        clean: &DataFrame,
        codebook: &mut CategoryCodebook,
        config: &PipelineConfig,
    ) -> Result<DataFrame> {
        let start = Instant::now();
        let kind = config.dataset;
        let mut summary = FeatureSummary {
            rows: clean.height(),
            ..Default::default()
        };

        let mut df = clean.clone();
        summary.rename_applied = schema::canonicalize_complex_name(&mut df)?;
        let amounts = if schema::has_column(&df, kind.amount_column()) {
            Some(whole_values(&df, kind.amount_column())?)
        } else if self.unlabeled {
            None
        } else {
            return Err(PipelineError::missing_column(STAGE, kind.amount_column()));
        };

        if let Some(amounts) = &amounts {
            let target: Vec<f64> = amounts.iter().map(|&v| log_transform(v as f64)).collect();
            df.with_column(Series::new(kind.target_column().into(), target))?;
        }

        if let (DatasetKind::Rent, Some(amounts)) = (kind, &amounts) {
            if schema::has_column(&df, schema::MONTHLY_RENT) {
                let rents = whole_values(&df, schema::MONTHLY_RENT)?;
                let leases: Vec<LeaseType> = if schema::has_column(&df, schema::LEASE_TYPE) {
                    string_values(&df, schema::LEASE_TYPE)?
                        .iter()
                        .zip(&rents)
                        .map(|(label, &rent)| {
                            label
                                .as_deref()
                                .and_then(LeaseType::from_label)
                                .unwrap_or_else(|| LeaseType::from_monthly_rent(rent))
                        })
                        .collect()
                } else {
                    rents.iter().map(|&r| LeaseType::from_monthly_rent(r)).collect()
                };
                let unified: Vec<i64> = amounts
                    .iter()
                    .zip(&rents)
                    .zip(&leases)
                    .map(|((&deposit, &rent), &lease)| {
                        unified_value(deposit, rent, lease, config.conversion_rate)
                    })
                    .collect();
                df.with_column(Series::new(schema::UNIFIED_VALUE.into(), unified))?;
            }
        }

        for (source, encoded) in [
            (schema::DISTRICT, schema::DISTRICT_CODE),
            (schema::COMPLEX_NAME, schema::COMPLEX_CODE),
        ] {
            if !schema::has_column(&df, source) {
                continue;
            }
            let (values, filled) = fill_missing_categories(&df, source, &config.missing_category)?;
            if filled > 0 {
                warn!(
                    column = source,
                    rows = filled,
                    placeholder = %config.missing_category,
                    "Missing category values replaced"
                );
            }
            summary.placeholder_fills += filled;
            let codes = codebook.encode_column(source, &values, config.codebook_mode)?;
            df.with_column(Series::new(encoded.into(), codes))?;
        }
        summary.district_categories = codebook.len(schema::DISTRICT);
        summary.complex_categories = codebook.len(schema::COMPLEX_NAME);

        if schema::has_column(&df, schema::AREA) {
            let area = f64_values(&df, schema::AREA)?;
            df.with_column(Series::new(schema::AREA.into(), area))?;
        }
        for name in [schema::FLOOR, schema::BUILD_YEAR, schema::PROPERTY_AGE] {
            if schema::has_column(&df, name) {
                let values = whole_values(&df, name)?;
                df.with_column(Series::new(name.into(), values))?;
            }
        }

        let mut specs = kind.feature_columns();
        if amounts.is_none() {
            specs.retain(|spec| {
                spec.name != kind.target_column() && spec.name != schema::UNIFIED_VALUE
            });
        }
        let features = schema::select_columns(&df, &specs, config.schema_policy, STAGE)?;

        summary.output_columns = features
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        info!(
            dataset = %kind,
            rows = summary.rows,
            districts = summary.district_categories,
            complexes = summary.complex_categories,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature construction complete"
        );
        self.summary = Some(summary);
        Ok(features)
    }
}

/// Column values with nulls and blanks replaced by `placeholder`
fn fill_missing_categories(
    df: &DataFrame,
    column: &str,
    placeholder: &str,
) -> Result<(Vec<String>, usize)> {
    let mut filled = 0;
    let values = string_values(df, column)?
        .into_iter()
        .map(|v| match v {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                filled += 1;
                placeholder.to_string()
            }
        })
        .collect();
    Ok((values, filled))
}

/// Convenience wrapper returning the feature table and its summary
pub fn build_features(
    clean: &DataFrame,
    codebook: &mut CategoryCodebook,
    config: &PipelineConfig,
) -> Result<(DataFrame, FeatureSummary)> {
    let mut builder = FeatureBuilder::new();
    let features = builder.transform(clean, codebook, config)?;
    Ok((features, builder.summary.take().unwrap_or_default()))
}
