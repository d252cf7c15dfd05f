//! Mock transaction generators
//!
//! Produce raw tables shaped like the open-data API responses so the
//! pipeline can run without network access. Column labels and value
//! formats (thousands-separated amounts, `O`/`X` flags) follow the API.

use crate::config::SyntheticConfig;
use crate::error::Result;
use crate::schema::{self, DatasetKind};
use crate::utils::format_thousands;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Transaction year of every generated record
pub const MOCK_YEAR: i64 = 2024;

const RENT_REGION_CODE: &str = "11680";
const RENT_DISTRICTS: [&str; 5] = ["역삼동", "대치동", "삼성동", "청담동", "압구정동"];
const RENT_NAMED_COMPLEXES: [&str; 3] = ["타워팰리스", "아이파크", "래미안"];

/// District and its location price weight
const SALE_DISTRICTS: [(&str, f64); 7] = [
    ("압구정동", 2.5),
    ("반포동", 2.3),
    ("대치동", 2.0),
    ("삼성동", 1.8),
    ("도곡동", 1.6),
    ("역삼동", 1.3),
    ("개포동", 1.4),
];
const SALE_BRANDS: [&str; 10] = [
    "현대", "래미안", "자이", "힐스테이트", "아이파크", "푸르지오", "더샵", "e편한세상", "아크로", "롯데캐슬",
];
/// Typical exclusive areas (25, 34, 40 and 50 pyeong classes)
const SALE_AREAS: [f64; 4] = [59.9, 84.9, 114.5, 135.8];
const SQM_PER_PYEONG: f64 = 3.3;
const MIN_SALE_PRICE: f64 = 100_000.0;

fn rng_for(config: &SyntheticConfig) -> ChaCha8Rng {
    match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Generate the configured dataset
pub fn generate(kind: DatasetKind, config: &SyntheticConfig) -> Result<DataFrame> {
    match kind {
        DatasetKind::Rent => generate_rent_listings(config),
        DatasetKind::Sale => generate_sale_listings(config),
    }
}

/// Lease and monthly-rent contracts in Gangnam-gu
pub fn generate_rent_listings(config: &SyntheticConfig) -> Result<DataFrame> {
    let n = config.rent_rows;
    let mut rng = rng_for(config);

    let complexes: Vec<String> = (1..=9)
        .map(|i| format!("강남_{}차_아파트", i))
        .chain(RENT_NAMED_COMPLEXES.iter().map(|s| s.to_string()))
        .collect();

    let mut renewal: Vec<Option<&str>> = Vec::with_capacity(n);
    let mut complex: Vec<String> = Vec::with_capacity(n);
    let mut district: Vec<&str> = Vec::with_capacity(n);
    let mut deposit: Vec<String> = Vec::with_capacity(n);
    let mut build_year: Vec<i64> = Vec::with_capacity(n);
    let mut monthly_rent: Vec<String> = Vec::with_capacity(n);
    let mut area: Vec<f64> = Vec::with_capacity(n);
    let mut lot: Vec<String> = Vec::with_capacity(n);
    let mut floor: Vec<i64> = Vec::with_capacity(n);
    let mut cancelled: Vec<Option<&str>> = Vec::with_capacity(n);
    let mut cancelled_at: Vec<Option<String>> = Vec::with_capacity(n);
    let mut month: Vec<i64> = Vec::with_capacity(n);
    let mut day: Vec<i64> = Vec::with_capacity(n);

    for _ in 0..n {
        district.push(RENT_DISTRICTS[rng.gen_range(0..RENT_DISTRICTS.len())]);
        complex.push(complexes[rng.gen_range(0..complexes.len())].clone());

        let m = rng.gen_range(1..=3);
        let d = rng.gen_range(1..=28);
        month.push(m);
        day.push(d);

        build_year.push(rng.gen_range(1980..=2024));
        floor.push(rng.gen_range(1..=45));
        area.push(round2(rng.gen_range(50.0..150.0)));

        // 70% lease contracts
        if rng.gen_bool(0.7) {
            deposit.push(format_thousands(rng.gen_range(30_000..=150_000)));
            monthly_rent.push(format_thousands(0));
            renewal.push([Some("O"), Some("X"), None][rng.gen_range(0..3)]);
        } else {
            deposit.push(format_thousands(rng.gen_range(1_000..=5_000)));
            monthly_rent.push(format_thousands(rng.gen_range(50..=300)));
            renewal.push([Some("O"), Some("X"), None, None][rng.gen_range(0..4)]);
        }

        // 5% of contracts are later cancelled
        if rng.gen_bool(0.05) {
            cancelled.push(Some("O"));
            cancelled_at.push(Some(format!("{}{:02}{:02}", MOCK_YEAR, m, d)));
        } else {
            cancelled.push(None);
            cancelled_at.push(None);
        }

        lot.push(rng.gen_range(100..=999).to_string());
    }

    let df = DataFrame::new(vec![
        Column::new(schema::RENEWAL_USED.into(), renewal),
        Column::new(schema::LEGACY_COMPLEX_NAME.into(), complex),
        Column::new(schema::DISTRICT.into(), district),
        Column::new(schema::RAW_DEPOSIT.into(), deposit),
        Column::new(schema::BUILD_YEAR.into(), build_year),
        Column::new(schema::RAW_MONTHLY_RENT.into(), monthly_rent),
        Column::new(schema::RAW_AREA.into(), area),
        Column::new(schema::LOT_NUMBER.into(), lot),
        Column::new(schema::REGION_CODE.into(), vec![RENT_REGION_CODE; n]),
        Column::new(schema::FLOOR.into(), floor),
        Column::new(schema::CANCELLED.into(), cancelled),
        Column::new(schema::CANCELLED_AT.into(), cancelled_at),
        Column::new(schema::YEAR.into(), vec![MOCK_YEAR; n]),
        Column::new(schema::MONTH.into(), month),
        Column::new(schema::DAY.into(), day),
    ])?;

    info!(rows = n, seeded = config.seed.is_some(), "Generated mock rent listings");
    Ok(df)
}

/// Sale price in 만원 from location, size, age and floor.
///
/// New builds (age <= 5) carry a 25% premium and redevelopment candidates
/// (age >= 30) 35%; mid-aged stock (15..30) is discounted 10%. High floors
/// add 300 per floor, the lowest three floors lose 5,000. The result is
/// floored at 100,000 and truncated to a multiple of 100.
pub fn sale_price(
    area: f64,
    price_per_pyeong: f64,
    weight: f64,
    age: i64,
    floor: i64,
    noise: f64,
) -> i64 {
    let mut price = area / SQM_PER_PYEONG * price_per_pyeong * weight;

    if age <= 5 {
        price *= 1.25;
    } else if age >= 30 {
        price *= 1.35;
    } else if age >= 15 {
        price *= 0.9;
    }

    if floor >= 20 {
        price += floor as f64 * 300.0;
    } else if floor <= 3 {
        price -= 5_000.0;
    }

    let price = (price + noise).max(MIN_SALE_PRICE);
    (price / 100.0).trunc() as i64 * 100
}

/// Outright sales with location, age and floor premiums
pub fn generate_sale_listings(config: &SyntheticConfig) -> Result<DataFrame> {
    let n = config.sale_rows;
    let mut rng = rng_for(config);

    let mut complex: Vec<String> = Vec::with_capacity(n);
    let mut district: Vec<&str> = Vec::with_capacity(n);
    let mut price: Vec<String> = Vec::with_capacity(n);
    let mut build_year: Vec<i64> = Vec::with_capacity(n);
    let mut area: Vec<f64> = Vec::with_capacity(n);
    let mut floor: Vec<i64> = Vec::with_capacity(n);
    let mut month: Vec<i64> = Vec::with_capacity(n);
    let mut day: Vec<i64> = Vec::with_capacity(n);

    for _ in 0..n {
        let (dong, weight) = SALE_DISTRICTS[rng.gen_range(0..SALE_DISTRICTS.len())];
        let brand = SALE_BRANDS[rng.gen_range(0..SALE_BRANDS.len())];
        let f = rng.gen_range(1..=45);
        let a = SALE_AREAS[rng.gen_range(0..SALE_AREAS.len())] + round2(rng.gen_range(-1.0..=1.0));
        let built = rng.gen_range(1980..=2024);
        let per_pyeong = rng.gen_range(5_000..=8_000) as f64;
        let noise = rng.gen_range(-15_000..=15_000) as f64;

        let p = sale_price(a, per_pyeong, weight, MOCK_YEAR - built, f, noise);

        complex.push(format!("{} {}", dong, brand));
        district.push(dong);
        price.push(format_thousands(p));
        build_year.push(built);
        area.push(round2(a));
        floor.push(f);
        month.push(rng.gen_range(1..=12));
        day.push(rng.gen_range(1..=28));
    }

    let df = DataFrame::new(vec![
        Column::new(schema::COMPLEX_NAME.into(), complex),
        Column::new(schema::DISTRICT.into(), district),
        Column::new(schema::RAW_SALE_PRICE.into(), price),
        Column::new(schema::BUILD_YEAR.into(), build_year),
        Column::new(schema::RAW_AREA.into(), area),
        Column::new(schema::FLOOR.into(), floor),
        Column::new(schema::YEAR.into(), vec![MOCK_YEAR; n]),
        Column::new(schema::MONTH.into(), month),
        Column::new(schema::DAY.into(), day),
    ])?;

    info!(rows = n, seeded = config.seed.is_some(), "Generated mock sale listings");
    Ok(df)
}
