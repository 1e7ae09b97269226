//! Model families and fitted models
//!
//! The four families share one capability interface: `fit` on a design
//! matrix with hyperparameters, `predict_proba` / `predict` on a design
//! matrix. Dispatch is over a closed enum rather than trait objects since the
//! set of families is fixed.

mod forest;
mod logistic;
mod penalized;

use faer::Mat;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use forest::{DecisionTree, ForestParams, RandomForest};
pub use logistic::LogisticRegression;
pub use penalized::{lambda_path, PenalizedLogistic};

/// Model-level fitting failures. Cross-validation turns these into fold
/// failures handled by the fold policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("training data is empty")]
    Empty,

    #[error("training labels contain a single class")]
    SingleClass,

    #[error("design matrix has {rows} rows but {labels} labels were given")]
    DimensionMismatch { rows: usize, labels: usize },

    #[error("normal equations are singular")]
    Singular,

    #[error("hyperparameters {0} do not apply to this model family")]
    InvalidHyperparameters(String),
}

/// Check the shape and class content of a training set
pub(crate) fn validate_training(x: &Mat<f64>, y: &[u8]) -> Result<(), FitError> {
    if x.nrows() != y.len() {
        return Err(FitError::DimensionMismatch {
            rows: x.nrows(),
            labels: y.len(),
        });
    }
    if y.is_empty() {
        return Err(FitError::Empty);
    }
    let events = y.iter().filter(|&&v| v == 1).count();
    if events == 0 || events == y.len() {
        return Err(FitError::SingleClass);
    }
    Ok(())
}

#[inline]
pub(crate) fn sigmoid(eta: f64) -> f64 {
    1.0 / (1.0 + (-eta).exp())
}

/// The closed set of model families compared by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    RandomForest,
    LassoLogistic,
    ElasticNetLogistic,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::LogisticRegression,
        ModelFamily::RandomForest,
        ModelFamily::LassoLogistic,
        ModelFamily::ElasticNetLogistic,
    ];

    /// Linear families use reference coding; trees see every level.
    pub fn drop_reference_level(&self) -> bool {
        !matches!(self, ModelFamily::RandomForest)
    }

    /// Fit one model
    pub fn fit(
        &self,
        x: &Mat<f64>,
        y: &[u8],
        hyperparameters: &Hyperparameters,
        rng: &mut StdRng,
    ) -> Result<FittedModel, FitError> {
        match (self, hyperparameters) {
            (ModelFamily::LogisticRegression, Hyperparameters::None) => {
                LogisticRegression::fit(x, y).map(FittedModel::Logistic)
            }
            (ModelFamily::RandomForest, Hyperparameters::Forest { mtry, n_trees }) => {
                let params = ForestParams {
                    n_trees: *n_trees,
                    mtry: Some(*mtry),
                    ..ForestParams::default()
                };
                RandomForest::fit(x, y, &params, rng).map(FittedModel::Forest)
            }
            (
                ModelFamily::LassoLogistic | ModelFamily::ElasticNetLogistic,
                Hyperparameters::Penalized { alpha, lambda },
            ) => PenalizedLogistic::fit(x, y, *alpha, *lambda).map(FittedModel::Penalized),
            (_, hp) => Err(FitError::InvalidHyperparameters(hp.to_string())),
        }
    }

    /// Fit one model per candidate, in candidate order.
    ///
    /// Penalized families fit each alpha's lambdas as a single warm-started
    /// path; the other families fit candidates independently.
    pub fn fit_grid(
        &self,
        x: &Mat<f64>,
        y: &[u8],
        candidates: &[Hyperparameters],
        rng: &mut StdRng,
    ) -> Vec<Result<FittedModel, FitError>> {
        match self {
            ModelFamily::LassoLogistic | ModelFamily::ElasticNetLogistic => {
                penalized::fit_candidates(x, y, candidates)
            }
            _ => candidates.iter().map(|hp| self.fit(x, y, hp, rng)).collect(),
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFamily::LogisticRegression => write!(f, "logistic regression"),
            ModelFamily::RandomForest => write!(f, "random forest"),
            ModelFamily::LassoLogistic => write!(f, "lasso logistic"),
            ModelFamily::ElasticNetLogistic => write!(f, "elastic-net logistic"),
        }
    }
}

impl std::str::FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "logistic" | "logistic_regression" | "glm" => Ok(ModelFamily::LogisticRegression),
            "forest" | "random_forest" | "rf" => Ok(ModelFamily::RandomForest),
            "lasso" | "lasso_logistic" => Ok(ModelFamily::LassoLogistic),
            "elastic_net" | "elasticnet" | "elastic_net_logistic" | "enet" => {
                Ok(ModelFamily::ElasticNetLogistic)
            }
            _ => Err(format!(
                "Unknown model family: '{}'. Use 'logistic', 'forest', 'lasso' or 'elastic-net'.",
                s
            )),
        }
    }
}

/// Tunable settings of one fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Hyperparameters {
    None,
    Forest { mtry: usize, n_trees: usize },
    Penalized { alpha: f64, lambda: f64 },
}

impl std::fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Hyperparameters::None => write!(f, "-"),
            Hyperparameters::Forest { mtry, n_trees } => {
                write!(f, "mtry={} trees={}", mtry, n_trees)
            }
            Hyperparameters::Penalized { alpha, lambda } => {
                write!(f, "alpha={:.2} lambda={:.5}", alpha, lambda)
            }
        }
    }
}

/// A trained model of one of the families
#[derive(Debug, Clone)]
pub enum FittedModel {
    Logistic(LogisticRegression),
    Forest(RandomForest),
    Penalized(PenalizedLogistic),
}

impl FittedModel {
    /// Probability of the positive class for every row
    pub fn predict_proba(&self, x: &Mat<f64>) -> Vec<f64> {
        match self {
            FittedModel::Logistic(m) => m.predict_proba(x),
            FittedModel::Forest(m) => m.predict_proba(x),
            FittedModel::Penalized(m) => m.predict_proba(x),
        }
    }

    /// Hard labels: 1 when the positive-class probability reaches `threshold`
    pub fn predict(&self, x: &Mat<f64>, threshold: f64) -> Vec<u8> {
        self.predict_proba(x)
            .into_iter()
            .map(|p| u8::from(p >= threshold))
            .collect()
    }

    /// (intercept, coefficients) for the linear families
    pub fn coefficients(&self) -> Option<(f64, &[f64])> {
        match self {
            FittedModel::Logistic(m) => Some((m.intercept, &m.coefficients)),
            FittedModel::Penalized(m) => Some((m.intercept, &m.coefficients)),
            FittedModel::Forest(_) => None,
        }
    }

    /// Mean impurity decrease per design-matrix column, forests only
    pub fn importances(&self) -> Option<&[f64]> {
        match self {
            FittedModel::Forest(m) => Some(m.impurity_importance()),
            _ => None,
        }
    }
}
