//! Tests for Boruta feature selection on cleaned survey tables

use pisarisk::pipeline::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn cleaned_informative(rows: usize, seed: u64) -> CleanedTable {
    let options = CleaningOptions {
        target: TARGET.to_string(),
        mapping: TargetMapping::new(vec![FAIL_CODE.to_string()]),
        policy: MissingPolicy::FullyMissing,
        manual_exclusions: vec![],
        numeric_columns: vec![],
        sentinel: "0".to_string(),
    };
    clean(&create_informative_dataframe(rows, seed), &options).unwrap()
}

fn small_config() -> BorutaConfig {
    BorutaConfig {
        max_runs: 30,
        n_trees: 50,
        ..BorutaConfig::default()
    }
}

#[test]
fn test_informative_question_is_confirmed() {
    let cleaned = cleaned_informative(300, 1);
    let features = cleaned.predictors();
    let mut rng = StdRng::seed_from_u64(2020);

    let result = select_features(&cleaned.df, TARGET, &features, &small_config(), &mut rng).unwrap();

    assert_eq!(result.decisions.len(), 4);
    assert!(result.selected().contains(&"ST01Q01".to_string()));
    let st01 = &result.decisions[0];
    assert_eq!(st01.decision, Decision::Confirmed);
    assert!(!st01.rough_fixed);
    assert!(!result.rejected().is_empty());
}

#[test]
fn test_no_feature_left_tentative() {
    let cleaned = cleaned_informative(200, 2);
    let features = cleaned.predictors();
    let config = BorutaConfig {
        max_runs: 3,
        ..small_config()
    };

    let result = select_features(&cleaned.df, TARGET, &features, &config, &mut StdRng::seed_from_u64(5)).unwrap();

    assert!(result.runs <= 3);
    assert!(result
        .decisions
        .iter()
        .all(|d| d.decision != Decision::Tentative));
    // three runs cannot reach significance, so every decision is rough-fixed
    assert_eq!(result.rough_fixed(), 4);
    assert_eq!(result.selected().len() + result.rejected().len(), 4);
}

#[test]
fn test_selection_is_reproducible() {
    let cleaned = cleaned_informative(200, 3);
    let features = cleaned.predictors();

    let a = select_features(&cleaned.df, TARGET, &features, &small_config(), &mut StdRng::seed_from_u64(9)).unwrap();
    let b = select_features(&cleaned.df, TARGET, &features, &small_config(), &mut StdRng::seed_from_u64(9)).unwrap();

    assert_eq!(a.selected(), b.selected());
    assert_eq!(a.runs, b.runs);
    for (x, y) in a.decisions.iter().zip(&b.decisions) {
        assert_eq!(x.hits, y.hits);
    }
}
