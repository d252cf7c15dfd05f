//! Canonical column names and per-stage column declarations
//!
//! Column labels follow the government open-data API (Korean). Each stage
//! declares which of its output columns are required and which are
//! optional; [`select_columns`] enforces that declaration under a
//! [`SchemaPolicy`].

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

// Raw (API) columns
pub const LEGACY_COMPLEX_NAME: &str = "단지명";
pub const RAW_DEPOSIT: &str = "보증금액";
pub const RAW_MONTHLY_RENT: &str = "월세금";
pub const RAW_SALE_PRICE: &str = "거래금액";
pub const RAW_AREA: &str = "전용면적";
pub const YEAR: &str = "년";
pub const MONTH: &str = "월";
pub const DAY: &str = "일";
pub const CANCELLED: &str = "해제여부";
pub const CANCELLED_AT: &str = "해제사유발생일";
pub const RENEWAL_USED: &str = "갱신청구권사용여부";
pub const LOT_NUMBER: &str = "지번";
pub const REGION_CODE: &str = "지역코드";

// Clean columns
pub const COMPLEX_NAME: &str = "아파트";
pub const DISTRICT: &str = "법정동";
pub const AREA: &str = "전용면적(㎡)";
pub const FLOOR: &str = "층";
pub const BUILD_YEAR: &str = "건축년도";
pub const PROPERTY_AGE: &str = "아파트연식";
pub const LEASE_TYPE: &str = "전월세구분";
pub const DEPOSIT: &str = "보증금(만원)";
pub const MONTHLY_RENT: &str = "월세(만원)";
pub const SALE_PRICE: &str = "거래금액(만원)";
pub const CONTRACT_DATE: &str = "계약일자";

// Feature columns
pub const DISTRICT_CODE: &str = "법정동_인코딩";
pub const COMPLEX_CODE: &str = "아파트_인코딩";
pub const UNIFIED_VALUE: &str = "전세환산가(만원)";
pub const LOG_DEPOSIT: &str = "log_보증금";
pub const LOG_SALE_PRICE: &str = "log_거래금액";

/// Appended by the predict command
pub const PREDICTED_VALUE: &str = "예측가(만원)";

/// Which transaction dataset a run processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// Lease (전세) and monthly-rent (월세) contracts
    #[default]
    Rent,
    /// Outright sales (매매)
    Sale,
}

impl DatasetKind {
    /// Raw text column holding the monetary amount
    pub fn raw_amount_column(&self) -> &'static str {
        match self {
            DatasetKind::Rent => RAW_DEPOSIT,
            DatasetKind::Sale => RAW_SALE_PRICE,
        }
    }

    /// Parsed integer column holding the monetary amount (10,000 KRW units)
    pub fn amount_column(&self) -> &'static str {
        match self {
            DatasetKind::Rent => DEPOSIT,
            DatasetKind::Sale => SALE_PRICE,
        }
    }

    /// Name of the log-transformed regression target
    pub fn target_column(&self) -> &'static str {
        match self {
            DatasetKind::Rent => LOG_DEPOSIT,
            DatasetKind::Sale => LOG_SALE_PRICE,
        }
    }

    /// File name stem shared by every stage output
    pub fn file_stem(&self) -> &'static str {
        match self {
            DatasetKind::Rent => "apartment_rent",
            DatasetKind::Sale => "apartment_sales",
        }
    }

    /// Output columns of the preprocessing stage, in order
    pub fn clean_columns(&self) -> Vec<ColumnSpec> {
        let mut cols = vec![
            ColumnSpec::optional(COMPLEX_NAME),
            ColumnSpec::optional(DISTRICT),
            ColumnSpec::required(AREA),
            ColumnSpec::optional(FLOOR),
            ColumnSpec::optional(BUILD_YEAR),
            ColumnSpec::optional(PROPERTY_AGE),
        ];
        match self {
            DatasetKind::Rent => cols.extend([
                ColumnSpec::required(LEASE_TYPE),
                ColumnSpec::required(DEPOSIT),
                ColumnSpec::required(MONTHLY_RENT),
            ]),
            DatasetKind::Sale => cols.push(ColumnSpec::required(SALE_PRICE)),
        }
        cols.push(ColumnSpec::required(CONTRACT_DATE));
        cols
    }

    /// Output columns of the feature construction stage, in order
    pub fn feature_columns(&self) -> Vec<ColumnSpec> {
        let mut cols = vec![
            ColumnSpec::optional(AREA),
            ColumnSpec::optional(FLOOR),
            ColumnSpec::optional(BUILD_YEAR),
            ColumnSpec::optional(PROPERTY_AGE),
            ColumnSpec::optional(DISTRICT_CODE),
            ColumnSpec::optional(COMPLEX_CODE),
        ];
        if *self == DatasetKind::Rent {
            cols.push(ColumnSpec::optional(UNIFIED_VALUE));
        }
        cols.push(ColumnSpec::required(self.target_column()));
        cols
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Rent => write!(f, "rent"),
            DatasetKind::Sale => write!(f, "sale"),
        }
    }
}

impl std::str::FromStr for DatasetKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rent" | "lease" | "전월세" => Ok(DatasetKind::Rent),
            "sale" | "sales" | "매매" => Ok(DatasetKind::Sale),
            other => Err(PipelineError::InvalidParameter {
                name: "dataset".to_string(),
                value: other.to_string(),
                reason: "expected 'rent' or 'sale'".to_string(),
            }),
        }
    }
}

/// Lease classification of a rent contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseType {
    /// Deposit-only agreement (전세)
    Lease,
    /// Deposit plus recurring monthly rent (월세)
    Rent,
}

impl LeaseType {
    /// RENT iff the monthly rent is non-zero
    pub fn from_monthly_rent(monthly_rent: i64) -> Self {
        if monthly_rent != 0 {
            LeaseType::Rent
        } else {
            LeaseType::Lease
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeaseType::Lease => "전세",
            LeaseType::Rent => "월세",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "전세" => Some(LeaseType::Lease),
            "월세" => Some(LeaseType::Rent),
            _ => None,
        }
    }
}

/// A declared output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub required: bool,
}

impl ColumnSpec {
    pub const fn required(name: &'static str) -> Self {
        Self { name, required: true }
    }

    pub const fn optional(name: &'static str) -> Self {
        Self { name, required: false }
    }
}

/// How strictly a stage treats missing optional columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Missing optional columns are dropped from the output with a warning
    #[default]
    Lenient,
    /// Any declared column that is missing fails the stage
    Strict,
}

/// Whether `df` has a column called `name`
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Rename the legacy complex-name label to the canonical one.
///
/// Only renames when the canonical column is absent, so applying it twice
/// is the same as applying it once. Returns whether a rename happened.
pub fn canonicalize_complex_name(df: &mut DataFrame) -> Result<bool> {
    if has_column(df, COMPLEX_NAME) || !has_column(df, LEGACY_COMPLEX_NAME) {
        return Ok(false);
    }
    df.rename(LEGACY_COMPLEX_NAME, COMPLEX_NAME.into())?;
    info!(from = LEGACY_COMPLEX_NAME, to = COMPLEX_NAME, "Renamed complex-name column");
    Ok(true)
}

/// Keep the declared columns, in declaration order.
pub fn select_columns(
    df: &DataFrame,
    specs: &[ColumnSpec],
    policy: SchemaPolicy,
    stage: &str,
) -> Result<DataFrame> {
    let mut keep: Vec<&str> = Vec::with_capacity(specs.len());
    for spec in specs {
        if has_column(df, spec.name) {
            keep.push(spec.name);
        } else if spec.required || policy == SchemaPolicy::Strict {
            return Err(PipelineError::missing_column(stage, spec.name));
        } else {
            warn!(stage, column = spec.name, "Optional column absent, omitted from output");
        }
    }
    Ok(df.select(keep)?)
}

/// Fail with `MissingColumn` unless every name is present.
pub fn require_columns(df: &DataFrame, names: &[&str], stage: &str) -> Result<()> {
    match names.iter().find(|name| !has_column(df, name)) {
        Some(name) => Err(PipelineError::missing_column(stage, name)),
        None => Ok(()),
    }
}
