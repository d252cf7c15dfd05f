//! Field parsers for raw transaction records

use crate::error::{PipelineError, Result};
use crate::utils::columns::{parse_whole_cell, string_values};
use chrono::NaiveDate;
use polars::prelude::*;

/// Parse a currency amount such as `"30,000"` into an integer.
///
/// Thousands separators and surrounding whitespace are removed; anything
/// left that is not an integer, including an empty cell, is a parse error.
pub fn parse_amount(raw: Option<&str>, column: &str, row: usize) -> Result<i64> {
    let text = raw.unwrap_or_default();
    let cleaned: String = text.chars().filter(|c| *c != ',').collect();
    cleaned
        .trim()
        .parse::<i64>()
        .map_err(|_| PipelineError::parse(column, row, text))
}

/// Parse every cell of a currency column
pub fn amount_values(df: &DataFrame, column: &str) -> Result<Vec<i64>> {
    string_values(df, column)?
        .iter()
        .enumerate()
        .map(|(row, raw)| parse_amount(raw.as_deref(), column, row))
        .collect()
}

/// Parse a nullable integer column (whole floats such as `1999.0` accepted)
pub fn optional_whole_values(df: &DataFrame, column: &str) -> Result<Vec<Option<i64>>> {
    string_values(df, column)?
        .into_iter()
        .enumerate()
        .map(|(row, raw)| {
            parse_whole_cell(raw.as_deref())
                .map_err(|_| PipelineError::parse(column, row, raw.unwrap_or_default()))
        })
        .collect()
}

/// Assemble a calendar date, rejecting combinations such as February 30th
pub fn contract_date(year: i64, month: i64, day: i64, row: usize) -> Result<NaiveDate> {
    let invalid = || PipelineError::Date {
        row,
        value: format!("{}-{}-{}", year, month, day),
    };
    let year = i32::try_from(year).map_err(|_| invalid())?;
    let month = u32::try_from(month).map_err(|_| invalid())?;
    let day = u32::try_from(day).map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_strips_separators() {
        assert_eq!(parse_amount(Some("30,000"), "보증금액", 0).unwrap(), 30000);
        assert_eq!(parse_amount(Some(" 1,250,000 "), "거래금액", 0).unwrap(), 1_250_000);
        assert_eq!(parse_amount(Some("0"), "월세금", 0).unwrap(), 0);
    }

    #[test]
    fn test_parse_amount_rejects_residue() {
        let err = parse_amount(Some("3O,000"), "보증금액", 4).unwrap_err();
        match err {
            PipelineError::Parse { column, row, value } => {
                assert_eq!(column, "보증금액");
                assert_eq!(row, 4);
                assert_eq!(value, "3O,000");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(parse_amount(None, "월세금", 0).is_err());
        assert!(parse_amount(Some("12.5"), "월세금", 0).is_err());
    }

    #[test]
    fn test_contract_date() {
        let date = contract_date(2024, 1, 15, 0).unwrap();
        assert_eq!(date.to_string(), "2024-01-15");
        assert!(matches!(
            contract_date(2024, 2, 30, 7),
            Err(PipelineError::Date { row: 7, .. })
        ));
        assert!(contract_date(2024, 13, 1, 0).is_err());
        assert!(contract_date(2024, -1, 1, 0).is_err());
    }

    #[test]
    fn test_optional_whole_values() {
        let df = df!("건축년도" => &[Some("2001.0"), None, Some("1998")]).unwrap();
        let values = optional_whole_values(&df, "건축년도").unwrap();
        assert_eq!(values, vec![Some(2001), None, Some(1998)]);
    }
}
