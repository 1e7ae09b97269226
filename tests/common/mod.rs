//! Shared test utilities and synthetic survey generators

use faer::Mat;
use pisarisk::pipeline::EncodedData;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// Name of the raw target column in the synthetic surveys
pub const TARGET: &str = "FAILMATH";

/// Raw code meaning "failed math"; any other code means passed
pub const FAIL_CODE: &str = "1";

/// Survey with `rows` Canadian students plus 20 from another country.
///
/// - `CNT`: country, "CAN" or "USA"
/// - `ST01Q01`..`ST10Q01`: categorical codes 1-4
/// - `ST02Q01`, `ST05Q01`, `ST08Q01`: ~2% missing
/// - `FAILMATH`: 1 (fail, ~30%) or 2 (pass), 5 missing
/// - `SC01Q01`: school questionnaire column, dropped by the prefix filter
pub fn create_survey_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let total = rows + 20;

    let mut columns: Vec<Column> = Vec::with_capacity(13);
    let country: Vec<&str> = (0..total).map(|i| if i < rows { "CAN" } else { "USA" }).collect();
    columns.push(Column::new("CNT".into(), country));

    for q in 1..=10 {
        let with_missing = [2, 5, 8].contains(&q);
        let values: Vec<Option<i32>> = (0..total)
            .map(|_| {
                if with_missing && rng.gen::<f64>() < 0.02 {
                    None
                } else {
                    Some(rng.gen_range(1..=4))
                }
            })
            .collect();
        columns.push(Column::new(format!("ST{:02}Q01", q).into(), values));
    }

    let school: Vec<i32> = (0..total).map(|_| rng.gen_range(1..=3)).collect();
    columns.push(Column::new("SC01Q01".into(), school));

    let target: Vec<Option<i32>> = (0..total)
        .map(|i| {
            if i < 5 {
                None
            } else if rng.gen::<f64>() < 0.3 {
                Some(1)
            } else {
                Some(2)
            }
        })
        .collect();
    columns.push(Column::new(TARGET.into(), target));

    DataFrame::new(columns).unwrap()
}

/// Survey where `ST01Q01` equals the target code and `ST02Q01` is noise
pub fn create_perfect_predictor_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let target: Vec<i32> = (0..rows)
        .map(|_| if rng.gen::<f64>() < 0.3 { 1 } else { 2 })
        .collect();
    let noise: Vec<i32> = (0..rows).map(|_| rng.gen_range(1..=3)).collect();

    df! {
        "CNT" => vec!["CAN"; rows],
        "ST01Q01" => target.clone(),
        "ST02Q01" => noise,
        TARGET => target,
    }
    .unwrap()
}

/// Survey with one strongly informative question (`ST01Q01`, agrees with the
/// outcome 90% of the time) and three pure-noise questions
pub fn create_informative_dataframe(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let target: Vec<i32> = (0..rows)
        .map(|_| if rng.gen::<bool>() { 1 } else { 2 })
        .collect();
    let informative: Vec<i32> = target
        .iter()
        .map(|&t| if rng.gen::<f64>() < 0.9 { t } else { 3 - t })
        .collect();

    let mut columns = vec![Column::new("ST01Q01".into(), informative)];
    for q in 2..=4 {
        let noise: Vec<i32> = (0..rows).map(|_| rng.gen_range(1..=3)).collect();
        columns.push(Column::new(format!("ST{:02}Q01", q).into(), noise));
    }
    columns.push(Column::new(TARGET.into(), target));
    DataFrame::new(columns).unwrap()
}

/// Balanced design matrix: column 0 is a noisy signal, column 1 noise
pub fn create_balanced_encoded(rows: usize, seed: u64) -> EncodedData {
    let mut rng = StdRng::seed_from_u64(seed);
    let y: Vec<u8> = (0..rows).map(|i| (i % 2) as u8).collect();
    let values: Vec<(f64, f64)> = y
        .iter()
        .map(|&label| (f64::from(label) + rng.gen::<f64>() * 1.5, rng.gen::<f64>()))
        .collect();

    EncodedData {
        x: Mat::from_fn(rows, 2, |i, j| if j == 0 { values[i].0 } else { values[i].1 }),
        y,
        columns: vec!["signal".to_string(), "noise".to_string()],
        groups: vec![0, 1],
    }
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in unexpected_cols {
        assert!(
            !actual_cols.contains(&col.to_string()),
            "Unexpected column still present: '{}'",
            col
        );
    }
}
