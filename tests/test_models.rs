//! Tests for the four model families through the shared fit/predict interface

use faer::Mat;
use pisarisk::pipeline::model::{lambda_path, PenalizedLogistic};
use pisarisk::pipeline::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[path = "common/mod.rs"]
mod common;

use common::*;

/// Three columns, only the first carries signal
fn signal_data(rows: usize, seed: u64) -> (Mat<f64>, Vec<u8>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let values: Vec<f64> = (0..rows * 3).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
    let x = Mat::from_fn(rows, 3, |i, j| values[i * 3 + j]);
    let y = (0..rows)
        .map(|i| {
            let p = 1.0 / (1.0 + (-4.0 * x[(i, 0)]).exp());
            u8::from(rng.gen::<f64>() < p)
        })
        .collect();
    (x, y)
}

fn default_hyperparameters(family: ModelFamily) -> Hyperparameters {
    match family {
        ModelFamily::LogisticRegression => Hyperparameters::None,
        ModelFamily::RandomForest => Hyperparameters::Forest { mtry: 2, n_trees: 50 },
        ModelFamily::LassoLogistic => Hyperparameters::Penalized { alpha: 1.0, lambda: 0.01 },
        ModelFamily::ElasticNetLogistic => Hyperparameters::Penalized { alpha: 0.5, lambda: 0.01 },
    }
}

#[test]
fn test_every_family_beats_chance() {
    let (x, y) = signal_data(400, 1);
    let (x_test, y_test) = signal_data(200, 2);

    for family in ModelFamily::ALL {
        let mut rng = StdRng::seed_from_u64(2020);
        let model = family
            .fit(&x, &y, &default_hyperparameters(family), &mut rng)
            .unwrap();
        let probs = model.predict_proba(&x_test);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));

        let auc = roc_auc(&probs, &y_test).unwrap();
        assert!(auc > 0.75, "{} AUC {:.3}", family, auc);
    }
}

#[test]
fn test_predict_uses_inclusive_threshold() {
    let (x, y) = signal_data(200, 3);
    let mut rng = StdRng::seed_from_u64(0);
    let model = ModelFamily::LogisticRegression
        .fit(&x, &y, &Hyperparameters::None, &mut rng)
        .unwrap();

    let probs = model.predict_proba(&x);
    let labels = model.predict(&x, 0.5);
    for (p, label) in probs.iter().zip(labels) {
        assert_eq!(label, u8::from(*p >= 0.5));
    }
    assert!(model.predict(&x, 0.0).iter().all(|&l| l == 1));
}

#[test]
fn test_lasso_zeroes_coefficients_at_large_lambda() {
    let (x, y) = signal_data(300, 4);
    let path = lambda_path(&x, &y, 1.0, 10, 0.01);

    let strict = PenalizedLogistic::fit(&x, &y, 1.0, path[0] * 1.01).unwrap();
    assert_eq!(strict.nonzero(), 0);

    let loose = PenalizedLogistic::fit(&x, &y, 1.0, path[9]).unwrap();
    assert!(loose.nonzero() >= 1);
    // the signal column enters first and with a positive sign
    assert!(loose.coefficients[0] > 0.0);
}

#[test]
fn test_single_class_is_fit_error() {
    let x = Mat::from_fn(10, 2, |i, j| (i + j) as f64);
    let y = vec![0u8; 10];
    let mut rng = StdRng::seed_from_u64(0);

    for family in ModelFamily::ALL {
        let err = family
            .fit(&x, &y, &default_hyperparameters(family), &mut rng)
            .unwrap_err();
        assert_eq!(err, FitError::SingleClass);
    }
}

#[test]
fn test_forest_exposes_importances_and_linear_models_coefficients() {
    let data = create_balanced_encoded(200, 5);
    let mut rng = StdRng::seed_from_u64(1);

    let forest = ModelFamily::RandomForest
        .fit(&data.x, &data.y, &Hyperparameters::Forest { mtry: 1, n_trees: 40 }, &mut rng)
        .unwrap();
    let importance = forest.importances().unwrap();
    assert_eq!(importance.len(), 2);
    assert!(importance[0] > importance[1]);
    assert!(forest.coefficients().is_none());

    let logistic = ModelFamily::LogisticRegression
        .fit(&data.x, &data.y, &Hyperparameters::None, &mut rng)
        .unwrap();
    let (_, coefs) = logistic.coefficients().unwrap();
    assert!(coefs[0] > 0.0);
}

#[test]
fn test_fit_grid_matches_individual_fits_in_order() {
    let (x, y) = signal_data(200, 6);
    let path = lambda_path(&x, &y, 0.5, 5, 0.05);
    let candidates: Vec<Hyperparameters> = path
        .iter()
        .rev()
        .map(|&lambda| Hyperparameters::Penalized { alpha: 0.5, lambda })
        .collect();
    let mut rng = StdRng::seed_from_u64(0);

    let grid = ModelFamily::ElasticNetLogistic.fit_grid(&x, &y, &candidates, &mut rng);
    assert_eq!(grid.len(), candidates.len());

    for (hp, fitted) in candidates.iter().zip(grid) {
        let Hyperparameters::Penalized { lambda, .. } = hp else {
            unreachable!()
        };
        let FittedModel::Penalized(model) = fitted.unwrap() else {
            panic!("expected a penalized model")
        };
        assert_eq!(model.lambda, *lambda);

        let single = PenalizedLogistic::fit(&x, &y, 0.5, *lambda).unwrap();
        for (a, b) in model.coefficients.iter().zip(&single.coefficients) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }
}
