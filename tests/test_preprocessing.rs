//! Integration test: Preprocessing and feature construction

use aptprice::config::{CodebookMode, PipelineConfig};
use aptprice::feature_engineering::{build_features, inverse_log_transform, log_transform, CategoryCodebook};
use aptprice::preprocessing::{preprocess, Preprocessor};
use aptprice::schema::{self, DatasetKind, LeaseType};
use aptprice::synthetic::generate_rent_listings;
use aptprice::config::SyntheticConfig;
use aptprice::utils::columns::{string_values, whole_values};
use polars::prelude::*;

fn generated_rent(rows: usize) -> DataFrame {
    generate_rent_listings(&SyntheticConfig {
        rent_rows: rows,
        sale_rows: 0,
        seed: Some(21),
    })
    .unwrap()
}

#[test]
fn test_row_count_preserved() {
    let raw = generated_rent(250);
    let config = PipelineConfig::default();
    let (clean, summary) = preprocess(&raw, &config).unwrap();
    assert_eq!(clean.height(), 250);
    assert_eq!(summary.rows, 250);
    assert_eq!(summary.lease_rows + summary.monthly_rent_rows, 250);

    let (features, _) = build_features(&clean, &mut CategoryCodebook::new(), &config).unwrap();
    assert_eq!(features.height(), 250);
}

#[test]
fn test_lease_type_iff_rent_positive() {
    let (clean, _) = preprocess(&generated_rent(200), &PipelineConfig::default()).unwrap();
    let rents = whole_values(&clean, schema::MONTHLY_RENT).unwrap();
    let labels = string_values(&clean, schema::LEASE_TYPE).unwrap();

    for (rent, label) in rents.iter().zip(&labels) {
        let expected = if *rent > 0 { LeaseType::Rent } else { LeaseType::Lease };
        assert_eq!(label.as_deref(), Some(expected.label()));
    }
}

#[test]
fn test_preprocessor_is_reusable() {
    let config = PipelineConfig::default();
    let mut preprocessor = Preprocessor::new();
    let first = preprocessor.transform(&generated_rent(30), &config).unwrap();
    let second = preprocessor.transform(&first.clone(), &config);
    // a clean table no longer has the raw amount columns
    assert!(second.is_err());
    assert_eq!(preprocessor.summary().map(|s| s.rows), Some(30));
}

#[test]
fn test_log_round_trip() {
    for v in [0.0, 1.0, 25_000.0, 150_000.0, 3_500_000.0] {
        let back = inverse_log_transform(log_transform(v));
        assert!((back - v).abs() <= 1e-9 * v.max(1.0), "{v} -> {back}");
    }
}

#[test]
fn test_codes_stable_across_runs() {
    let config = PipelineConfig::default();
    let (clean, _) = preprocess(&generated_rent(100), &config).unwrap();

    let mut codebook = CategoryCodebook::new();
    let (first, _) = build_features(&clean, &mut codebook, &config).unwrap();
    let frozen = config.clone().with_codebook_mode(CodebookMode::Frozen);
    let (second, _) = build_features(&clean, &mut codebook, &frozen).unwrap();

    let a = whole_values(&first, schema::DISTRICT_CODE).unwrap();
    let b = whole_values(&second, schema::DISTRICT_CODE).unwrap();
    assert_eq!(a, b);

    // one code per distinct district
    let names = string_values(&clean, schema::DISTRICT).unwrap();
    for (name, code) in names.iter().zip(&a) {
        let name = name.as_deref().unwrap_or_default();
        assert_eq!(codebook.code(schema::DISTRICT, name), Some(*code));
    }
}

#[test]
fn test_sale_dataset_has_no_unified_value() {
    let config = PipelineConfig::default().with_dataset(DatasetKind::Sale);
    let raw = df!(
        "아파트" => &["압구정동 현대", "반포동 자이"],
        "법정동" => &["압구정동", "반포동"],
        "거래금액" => &["250,000", "198,500"],
        "전용면적" => &["84.9", "114.5"],
        "층" => &["10", "22"],
        "건축년도" => &["1987", "2009"],
        "년" => &["2024", "2024"],
        "월" => &["5", "6"],
        "일" => &["1", "2"],
    )
    .unwrap();

    let (clean, _) = preprocess(&raw, &config).unwrap();
    let (features, _) = build_features(&clean, &mut CategoryCodebook::new(), &config).unwrap();
    assert!(!schema::has_column(&features, schema::UNIFIED_VALUE));
    assert!(schema::has_column(&features, schema::LOG_SALE_PRICE));
}
