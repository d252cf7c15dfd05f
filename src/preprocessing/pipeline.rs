//! Raw record cleaning

use super::imputer::Imputer;
use super::parse::{amount_values, contract_date, optional_whole_values};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::{self, DatasetKind, LeaseType};
use crate::utils::columns::{f64_values, string_values, whole_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

const STAGE: &str = "preprocess";

/// What happened during one preprocessing run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessSummary {
    pub rows: usize,
    pub rename_applied: bool,
    pub build_year_median: Option<f64>,
    pub floor_median: Option<f64>,
    pub imputed_build_year: usize,
    pub imputed_floor: usize,
    pub lease_rows: usize,
    pub monthly_rent_rows: usize,
    /// Rows whose construction year is after the transaction year
    pub negative_age_rows: usize,
    pub output_columns: Vec<String>,
    pub elapsed_secs: f64,
}

/// Turns a raw API table into clean records of the same length
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    summary: Option<PreprocessSummary>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summary of the last successful [`Preprocessor::transform`]
    pub fn summary(&self) -> Option<&PreprocessSummary> {
        self.summary.as_ref()
    }

    pub fn transform(&mut self, raw: &DataFrame, config: &PipelineConfig) -> Result<DataFrame> {
        let start = Instant::now();
        let kind = config.dataset;
        let n_rows = raw.height();
        let mut summary = PreprocessSummary {
            rows: n_rows,
            ..Default::default()
        };

        let mut df = raw.clone();
        summary.rename_applied = schema::canonicalize_complex_name(&mut df)?;

        let mut required = vec![schema::RAW_AREA, schema::YEAR, schema::MONTH, schema::DAY];
        match kind {
            DatasetKind::Rent => required.extend([schema::RAW_DEPOSIT, schema::RAW_MONTHLY_RENT]),
            DatasetKind::Sale => required.push(schema::RAW_SALE_PRICE),
        }
        schema::require_columns(&df, &required, STAGE)?;

        let mut out: Vec<Series> = Vec::new();

        // Amounts
        let amount = amount_values(&df, kind.raw_amount_column())?;
        out.push(Series::new(kind.amount_column().into(), amount));
        if kind == DatasetKind::Rent {
            let rent = amount_values(&df, schema::RAW_MONTHLY_RENT)?;
            let lease_types: Vec<&str> = rent
                .iter()
                .map(|&r| LeaseType::from_monthly_rent(r).label())
                .collect();
            summary.monthly_rent_rows = rent.iter().filter(|&&r| r != 0).count();
            summary.lease_rows = n_rows - summary.monthly_rent_rows;
            out.push(Series::new(schema::LEASE_TYPE.into(), lease_types));
            out.push(Series::new(schema::MONTHLY_RENT.into(), rent));
        }

        out.push(Series::new(
            schema::AREA.into(),
            f64_values(&df, schema::RAW_AREA)?,
        ));

        // Contract date
        let years = whole_values(&df, schema::YEAR)?;
        let months = whole_values(&df, schema::MONTH)?;
        let days = whole_values(&df, schema::DAY)?;
        let dates = years
            .iter()
            .zip(&months)
            .zip(&days)
            .enumerate()
            .map(|(row, ((&y, &m), &d))| {
                contract_date(y, m, d, row).map(|date| date.format("%Y-%m-%d").to_string())
            })
            .collect::<Result<Vec<String>>>()?;
        out.push(Series::new(schema::CONTRACT_DATE.into(), dates));

        // Median imputation over the whole input table
        let mut imputer = Imputer::new();
        if schema::has_column(&df, schema::BUILD_YEAR) {
            let (filled, median, imputed) = impute_whole(&mut imputer, &df, schema::BUILD_YEAR)?;
            summary.build_year_median = Some(median);
            summary.imputed_build_year = imputed;

            let ages: Vec<i64> = years.iter().zip(&filled).map(|(y, b)| y - b).collect();
            summary.negative_age_rows = ages.iter().filter(|&&a| a < 0).count();
            if summary.negative_age_rows > 0 {
                warn!(
                    rows = summary.negative_age_rows,
                    "Construction year after transaction year, property age left negative"
                );
            }
            out.push(Series::new(schema::BUILD_YEAR.into(), filled));
            out.push(Series::new(schema::PROPERTY_AGE.into(), ages));
        }
        if schema::has_column(&df, schema::FLOOR) {
            let (filled, median, imputed) = impute_whole(&mut imputer, &df, schema::FLOOR)?;
            summary.floor_median = Some(median);
            summary.imputed_floor = imputed;
            out.push(Series::new(schema::FLOOR.into(), filled));
        }

        for series in out {
            df.with_column(series)?;
        }

        // Pass-through text columns are normalised to strings
        for name in [schema::COMPLEX_NAME, schema::DISTRICT] {
            if schema::has_column(&df, name) {
                let values = string_values(&df, name)?;
                df.with_column(Series::new(name.into(), values))?;
            }
        }

        let clean = schema::select_columns(&df, &kind.clean_columns(), config.schema_policy, STAGE)?;

        summary.output_columns = clean
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        summary.elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            dataset = %kind,
            rows = n_rows,
            imputed_build_year = summary.imputed_build_year,
            imputed_floor = summary.imputed_floor,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessing complete"
        );
        self.summary = Some(summary);
        Ok(clean)
    }
}

/// Impute a nullable integer column with the fitted median, truncating
/// the fill value toward zero. Returns values, median and imputed count.
fn impute_whole(
    imputer: &mut Imputer,
    df: &DataFrame,
    column: &str,
) -> Result<(Vec<i64>, f64, usize)> {
    let parsed = optional_whole_values(df, column)?;
    let as_float: Vec<Option<f64>> = parsed.iter().map(|v| v.map(|x| x as f64)).collect();
    let median = imputer.fit_values(column, &as_float)?;
    let imputed = parsed.iter().filter(|v| v.is_none()).count();
    let filled = imputer
        .transform_values(column, &as_float)?
        .into_iter()
        .map(|v| v.trunc() as i64)
        .collect();
    debug!(column, median, imputed, "Imputed missing values with median");
    Ok((filled, median, imputed))
}

/// Convenience wrapper returning the clean table and its summary
pub fn preprocess(raw: &DataFrame, config: &PipelineConfig) -> Result<(DataFrame, PreprocessSummary)> {
    let mut preprocessor = Preprocessor::new();
    let clean = preprocessor.transform(raw, config)?;
    let summary = preprocessor.summary.take().unwrap_or_default();
    Ok((clean, summary))
}
