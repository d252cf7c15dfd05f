//! Typed column access over polars frames
//!
//! Stage files are loaded as text, while in-memory fixtures may carry
//! native dtypes. These helpers read either kind and return plain vectors
//! so the stages can apply their own parsing rules and report the exact
//! row and value that failed.

use crate::error::{PipelineError, Result};
use polars::prelude::*;

/// Column values as optional strings, whatever the column dtype
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df.column(name)?.as_materialized_series();
    let as_text = series.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Parse a numeric text cell. Surrounding whitespace is ignored; blank is `None`.
pub fn parse_f64_cell(raw: Option<&str>) -> std::result::Result<Option<f64>, ()> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse::<f64>().map(Some).map_err(|_| ()),
    }
}

/// Parse an integer cell, accepting whole floats such as `2001.0`.
pub fn parse_whole_cell(raw: Option<&str>) -> std::result::Result<Option<i64>, ()> {
    match parse_f64_cell(raw)? {
        None => Ok(None),
        Some(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(_) => Err(()),
    }
}

/// Nullable floats; unparsable text fails with `Parse`
pub fn optional_f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    string_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, raw)| {
            parse_f64_cell(raw.as_deref())
                .map_err(|_| PipelineError::parse(name, row, raw.unwrap_or_default()))
        })
        .collect()
}

/// Non-null floats; a null or unparsable cell fails with `Parse`
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    optional_f64_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| v.ok_or_else(|| PipelineError::parse(name, row, "")))
        .collect()
}

/// Non-null integers (whole floats accepted)
pub fn whole_values(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    string_values(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, raw)| match parse_whole_cell(raw.as_deref()) {
            Ok(Some(v)) => Ok(v),
            _ => Err(PipelineError::parse(name, row, raw.unwrap_or_default())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values_from_native_dtype() {
        let df = df!("층" => &[Some(3i64), None, Some(12)]).unwrap();
        let values = string_values(&df, "층").unwrap();
        assert_eq!(values, vec![Some("3".to_string()), None, Some("12".to_string())]);
    }

    #[test]
    fn test_whole_cell_accepts_float_text() {
        assert_eq!(parse_whole_cell(Some("2001.0")), Ok(Some(2001)));
        assert_eq!(parse_whole_cell(Some(" 7 ")), Ok(Some(7)));
        assert_eq!(parse_whole_cell(Some("")), Ok(None));
        assert!(parse_whole_cell(Some("7.5")).is_err());
        assert!(parse_whole_cell(Some("칠")).is_err());
    }

    #[test]
    fn test_f64_values_reports_row() {
        let df = df!("전용면적" => &["84.9", "넓음", "59.9"]).unwrap();
        match f64_values(&df, "전용면적").unwrap_err() {
            PipelineError::Parse { column, row, value } => {
                assert_eq!(column, "전용면적");
                assert_eq!(row, 1);
                assert_eq!(value, "넓음");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_f64_values_rejects_null() {
        let df = df!("전용면적" => &[Some("84.9"), None]).unwrap();
        assert!(f64_values(&df, "전용면적").is_err());
        let optional = optional_f64_values(&df, "전용면적").unwrap();
        assert_eq!(optional, vec![Some(84.9), None]);
    }
}
