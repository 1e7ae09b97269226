//! Tests for the seeded train/test split

use pisarisk::error::{PipelineError, Stage};
use pisarisk::pipeline::*;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn indexed(rows: usize) -> DataFrame {
    df! {
        "row" => (0..rows as u32).collect::<Vec<_>>(),
        TARGET => (0..rows).map(|i| (i % 3 == 0) as u8).collect::<Vec<u8>>(),
    }
    .unwrap()
}

fn row_ids(df: &DataFrame) -> Vec<u32> {
    df.column("row").unwrap().u32().unwrap().into_no_null_iter().collect()
}

#[test]
fn test_split_sizes_for_seventy_percent() {
    let df = indexed(1000);
    let mut rng = StdRng::seed_from_u64(2020);
    let split = train_test_split(&df, 0.7, &mut rng).unwrap();

    assert_shape(&split.train, 700, 2);
    assert_shape(&split.test, 300, 2);
}

#[test]
fn test_split_is_disjoint_and_complete() {
    let df = indexed(1000);
    let mut rng = StdRng::seed_from_u64(2020);
    let split = train_test_split(&df, 0.7, &mut rng).unwrap();

    let mut all: Vec<u32> = row_ids(&split.train);
    all.extend(row_ids(&split.test));
    all.sort_unstable();
    assert_eq!(all, (0..1000).collect::<Vec<u32>>());
    assert_eq!(split.train_rows.len() + split.test_rows.len(), 1000);
}

#[test]
fn test_same_seed_same_partition() {
    let df = indexed(1000);
    let a = train_test_split(&df, 0.7, &mut StdRng::seed_from_u64(2020)).unwrap();
    let b = train_test_split(&df, 0.7, &mut StdRng::seed_from_u64(2020)).unwrap();
    let c = train_test_split(&df, 0.7, &mut StdRng::seed_from_u64(7)).unwrap();

    assert_eq!(a.train_rows, b.train_rows);
    assert!(a.train.equals(&b.train));
    assert_ne!(a.train_rows, c.train_rows);
}

#[test]
fn test_rounding_of_odd_sizes() {
    let df = indexed(15);
    let split = train_test_split(&df, 0.5, &mut StdRng::seed_from_u64(1)).unwrap();
    // round(7.5) = 8
    assert_eq!(split.train.height(), 8);
    assert_eq!(split.test.height(), 7);
}

#[test]
fn test_empty_partition_is_split_error() {
    let df = indexed(2);
    let err = train_test_split(&df, 0.1, &mut StdRng::seed_from_u64(1)).unwrap_err();
    let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
    assert_eq!(pipeline_err.stage(), Some(Stage::Split));

    for ratio in [0.0, 1.0, -0.5] {
        assert!(train_test_split(&indexed(10), ratio, &mut StdRng::seed_from_u64(1)).is_err());
    }
}
