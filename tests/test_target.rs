//! Tests for target analysis and binarization

use pisarisk::pipeline::*;
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_binarize_is_idempotent() {
    let df = df! {
        TARGET => ["1", "2", "1", "2", "2"],
    }
    .unwrap();
    let mapping = TargetMapping::new(vec![FAIL_CODE.to_string()]);

    let once = binarize_target(&df, TARGET, &mapping).unwrap();
    let twice = binarize_target(&once, TARGET, &TargetMapping::binarized()).unwrap();

    assert!(once.equals(&twice));
    assert_eq!(target_labels(&twice, TARGET).unwrap(), vec![1, 0, 1, 0, 0]);
}

#[test]
fn test_multiple_positive_codes() {
    let df = df! {
        TARGET => [1i32, 2, 3, 4],
    }
    .unwrap();
    let mapping = TargetMapping::new(vec!["3".to_string(), "4".to_string()]);

    let binary = binarize_target(&df, TARGET, &mapping).unwrap();
    assert_eq!(target_labels(&binary, TARGET).unwrap(), vec![0, 0, 1, 1]);
    assert_eq!(count_classes(&binary, TARGET).unwrap(), (2, 2));
}

#[test]
fn test_analysis_lists_distinct_values() {
    let raw = df! {
        TARGET => [Some(1i32), Some(2), Some(2), None],
    }
    .unwrap();
    let analysis = analyze_target_column(&raw, TARGET).unwrap();
    assert_eq!(analysis.unique_values, vec!["1", "2"]);
    assert_eq!(analysis.null_count, 1);
}

#[test]
fn test_u8_codes_are_mapped_not_passed_through() {
    // Parquet extract storing 0 = failed, 1 = passed as u8
    let df = df! {
        TARGET => [0u8, 1, 1, 1],
    }
    .unwrap();
    let mapping = TargetMapping::new(vec!["0".to_string()]);

    let binary = binarize_target(&df, TARGET, &mapping).unwrap();
    assert_eq!(target_labels(&binary, TARGET).unwrap(), vec![1, 0, 0, 0]);
    assert_eq!(count_classes(&binary, TARGET).unwrap(), (3, 1));
}

#[test]
fn test_binarize_rejects_remaining_nulls() {
    let df = df! {
        TARGET => [Some(1i32), None, Some(2)],
    }
    .unwrap();
    let mapping = TargetMapping::new(vec![FAIL_CODE.to_string()]);
    assert!(binarize_target(&df, TARGET, &mapping).is_err());
}
