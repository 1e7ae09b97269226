//! Tests for stratified folds, AUC grid search and fold failure policies

use pisarisk::error::PipelineError;
use pisarisk::pipeline::cv::PENALTY_AUC;
use pisarisk::pipeline::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn folds_for(data: &EncodedData, k: usize, seed: u64) -> Vec<Fold> {
    StratifiedKFold::new(k)
        .split(&data.y, &mut StdRng::seed_from_u64(seed))
        .unwrap()
}

/// 40 rows with only two events, so most validation folds hold one class
fn rare_event_data() -> EncodedData {
    let mut data = create_balanced_encoded(40, 3);
    data.y = (0..40).map(|i| u8::from(i == 0 || i == 1)).collect();
    data
}

#[test]
fn test_smote_on_balanced_data_matches_plain_cv() {
    let data = create_balanced_encoded(100, 1);
    let folds = folds_for(&data, 5, 2020);
    let smote = Smote::default();

    for (family, candidates) in [
        (ModelFamily::LogisticRegression, vec![Hyperparameters::None]),
        (
            ModelFamily::RandomForest,
            vec![Hyperparameters::Forest { mtry: 1, n_trees: 25 }],
        ),
    ] {
        let plain = grid_search(
            family,
            &data,
            &folds,
            &candidates,
            FoldPolicy::Skip,
            None,
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();
        let oversampled = grid_search(
            family,
            &data,
            &folds,
            &candidates,
            FoldPolicy::Skip,
            Some(&smote),
            &mut StdRng::seed_from_u64(7),
        )
        .unwrap();

        // every training fold is exactly balanced, so SMOTE adds nothing
        assert_eq!(plain.best_auc(), oversampled.best_auc(), "{}", family);
        assert_eq!(
            plain.best_candidate().fold_aucs,
            oversampled.best_candidate().fold_aucs
        );
    }
}

#[test]
fn test_folds_are_stratified() {
    let y: Vec<u8> = (0..103).map(|i| u8::from(i % 4 == 0)).collect();
    let events = y.iter().filter(|&&v| v == 1).count();
    let folds = StratifiedKFold::new(5)
        .split(&y, &mut StdRng::seed_from_u64(1))
        .unwrap();

    assert_eq!(folds.len(), 5);
    for fold in &folds {
        let fold_events = fold.validation.iter().filter(|&&i| y[i] == 1).count();
        assert!(fold_events == events / 5 || fold_events == events / 5 + 1);
        assert!(fold.validation.iter().all(|i| !fold.train.contains(i)));
    }
}

#[test]
fn test_fold_count_must_fit_data() {
    let mut rng = StdRng::seed_from_u64(1);
    assert!(matches!(
        StratifiedKFold::new(1).split(&[0, 1, 0, 1], &mut rng),
        Err(PipelineError::Config(_))
    ));
    assert!(StratifiedKFold::new(5).split(&[0, 1, 0], &mut rng).is_err());
}

#[test]
fn test_fail_policy_aborts_with_fold_number() {
    let data = rare_event_data();
    let folds = folds_for(&data, 5, 11);

    let err = grid_search(
        ModelFamily::LogisticRegression,
        &data,
        &folds,
        &[Hyperparameters::None],
        FoldPolicy::Fail,
        None,
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap_err();

    match err {
        PipelineError::FoldFailed { fold, .. } => assert!((1..=5).contains(&fold)),
        other => panic!("expected FoldFailed, got {:?}", other),
    }
}

#[test]
fn test_penalize_policy_scores_failed_folds_at_chance() {
    let data = rare_event_data();
    let folds = folds_for(&data, 5, 11);

    let result = grid_search(
        ModelFamily::LogisticRegression,
        &data,
        &folds,
        &[Hyperparameters::None],
        FoldPolicy::Penalize,
        None,
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap();

    let best = result.best_candidate();
    // at most two folds can hold an event in validation
    assert!(best.failed_folds >= 3);
    let penalized = best
        .fold_aucs
        .iter()
        .filter(|auc| **auc == Some(PENALTY_AUC))
        .count();
    assert!(penalized >= best.failed_folds);
    assert_eq!(best.fold_aucs.len(), 5);
}

#[test]
fn test_skip_policy_averages_surviving_folds() {
    let data = rare_event_data();
    let folds = folds_for(&data, 5, 11);

    let result = grid_search(
        ModelFamily::LogisticRegression,
        &data,
        &folds,
        &[Hyperparameters::None],
        FoldPolicy::Skip,
        None,
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap();

    let best = result.best_candidate();
    let surviving: Vec<f64> = best.fold_aucs.iter().flatten().copied().collect();
    assert_eq!(surviving.len() + best.failed_folds, 5);
    let mean = surviving.iter().sum::<f64>() / surviving.len() as f64;
    assert!((best.mean_auc.unwrap() - mean).abs() < 1e-12);
}

#[test]
fn test_all_folds_failing_is_reported() {
    let data = create_balanced_encoded(50, 4);
    let folds = folds_for(&data, 5, 1);

    for policy in [FoldPolicy::Skip, FoldPolicy::Penalize] {
        // forest settings never apply to a plain logistic fit
        let err = grid_search(
            ModelFamily::LogisticRegression,
            &data,
            &folds,
            &[Hyperparameters::Forest { mtry: 1, n_trees: 5 }],
            policy,
            None,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::AllFoldsFailed { folds: 5, .. }));
    }
}

#[test]
fn test_grid_search_prefers_higher_auc() {
    let data = create_balanced_encoded(200, 5);
    let folds = folds_for(&data, 5, 3);
    let candidates = vec![
        Hyperparameters::Penalized { alpha: 1.0, lambda: 10.0 },
        Hyperparameters::Penalized { alpha: 1.0, lambda: 0.001 },
    ];

    let result = grid_search(
        ModelFamily::LassoLogistic,
        &data,
        &folds,
        &candidates,
        FoldPolicy::Skip,
        None,
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap();

    // the heavily penalized fit is intercept-only and scores 0.5
    assert_eq!(result.candidates[0].mean_auc, Some(0.5));
    assert_eq!(result.best, 1);
    assert!(result.best_auc() > 0.8);
}
