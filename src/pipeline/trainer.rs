//! Model training: grid search with stratified CV, optional SMOTE, refit
//!
//! Every family is trained twice, on the plain training rows and with
//! SMOTE-balanced training rows. Both variants, and every candidate inside a
//! variant, are scored on one shared fold split.

use anyhow::{Context, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cv::{grid_search, Fold, FoldPolicy, GridSearchResult, StratifiedKFold};
use super::encode::{CategoricalEncoder, EncodedData};
use super::model::{lambda_path, FittedModel, Hyperparameters, ModelFamily};
use super::resample::Smote;
use super::target::target_labels;
use crate::error::{PipelineError, Stage};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub folds: usize,
    pub fold_policy: FoldPolicy,
    pub families: Vec<ModelFamily>,
    pub n_trees: usize,
    /// Forest `mtry` values; empty picks a grid around sqrt(p)
    pub mtry_grid: Vec<usize>,
    pub alpha_grid: Vec<f64>,
    pub lambda_count: usize,
    pub lambda_min_ratio: f64,
    /// Explicit lambdas; empty derives a path from the data
    pub lambda_grid: Vec<f64>,
    pub smote_neighbors: usize,
    /// Probability at or above which a row is predicted positive
    pub threshold: f64,
    /// Families trained on the selected feature subset
    pub families_using_selection: Vec<ModelFamily>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            fold_policy: FoldPolicy::Skip,
            families: ModelFamily::ALL.to_vec(),
            n_trees: 500,
            mtry_grid: Vec::new(),
            alpha_grid: vec![0.25, 0.5, 0.75],
            lambda_count: 20,
            lambda_min_ratio: 0.01,
            lambda_grid: Vec::new(),
            smote_neighbors: 5,
            threshold: 0.5,
            families_using_selection: vec![ModelFamily::LogisticRegression],
        }
    }
}

/// Default forest `mtry` values for `p` design columns
fn auto_mtry(p: usize) -> Vec<usize> {
    let root = (p as f64).sqrt();
    let mut grid: Vec<usize> = [root / 2.0, root, root * 2.0]
        .iter()
        .map(|&m| (m.floor() as usize).clamp(1, p.max(1)))
        .collect();
    grid.dedup();
    grid
}

/// Hyperparameter candidates of `family` for the given training data
pub fn candidate_grid(family: ModelFamily, data: &EncodedData, config: &TrainerConfig) -> Vec<Hyperparameters> {
    let lambdas = |alpha: f64| {
        if config.lambda_grid.is_empty() {
            lambda_path(&data.x, &data.y, alpha, config.lambda_count, config.lambda_min_ratio)
        } else {
            config.lambda_grid.clone()
        }
    };

    match family {
        ModelFamily::LogisticRegression => vec![Hyperparameters::None],
        ModelFamily::RandomForest => {
            let grid = if config.mtry_grid.is_empty() {
                auto_mtry(data.x.ncols())
            } else {
                config.mtry_grid.clone()
            };
            grid.into_iter()
                .map(|mtry| Hyperparameters::Forest {
                    mtry,
                    n_trees: config.n_trees,
                })
                .collect()
        }
        ModelFamily::LassoLogistic => lambdas(1.0)
            .into_iter()
            .map(|lambda| Hyperparameters::Penalized { alpha: 1.0, lambda })
            .collect(),
        ModelFamily::ElasticNetLogistic => config
            .alpha_grid
            .iter()
            .flat_map(|&alpha| {
                lambdas(alpha)
                    .into_iter()
                    .map(move |lambda| Hyperparameters::Penalized { alpha, lambda })
            })
            .collect(),
    }
}

/// A refitted model with its tuning record
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub family: ModelFamily,
    pub oversampled: bool,
    pub hyperparameters: Hyperparameters,
    pub cv_auc: f64,
    pub cv_results: GridSearchResult,
    pub model: FittedModel,
    pub encoder: CategoricalEncoder,
    pub features: Vec<String>,
    /// Rows the final model was fitted on, synthetic rows included
    pub fitted_rows: usize,
}

impl TrainedModel {
    pub fn name(&self) -> String {
        if self.oversampled {
            format!("{} + SMOTE", self.family)
        } else {
            self.family.to_string()
        }
    }

    /// Positive-class probability for every row of `df`
    pub fn predict_proba(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let x = self.encoder.transform(df)?;
        Ok(self.model.predict_proba(&x))
    }
}

/// Tune and refit one family on `features` of the training table
#[allow(clippy::too_many_arguments)]
pub fn train_model(
    family: ModelFamily,
    train: &DataFrame,
    target: &str,
    features: &[String],
    folds: &[Fold],
    oversample: bool,
    config: &TrainerConfig,
    rng: &mut StdRng,
) -> Result<TrainedModel> {
    let encoder = CategoricalEncoder::fit(train, features, family.drop_reference_level())?;
    let data = encoder
        .encode(train, target)
        .with_context(|| format!("Failed to encode training data for {}", family))?;

    let candidates = candidate_grid(family, &data, config);
    let smote = oversample.then(|| Smote::new(config.smote_neighbors));
    debug!(model = %family, oversample, candidates = candidates.len(), columns = data.x.ncols(), "grid search");

    let cv_results = grid_search(
        family,
        &data,
        folds,
        &candidates,
        config.fold_policy,
        smote.as_ref(),
        rng,
    )?;
    let best = cv_results.best_candidate().clone();

    let final_data = match &smote {
        Some(smote) => smote.oversample(&data, rng),
        None => data,
    };
    let model = family
        .fit(&final_data.x, &final_data.y, &best.hyperparameters, rng)
        .map_err(|e| PipelineError::shape(Stage::Train, format!("refit of {} failed: {}", family, e)))?;

    let trained = TrainedModel {
        family,
        oversampled: oversample,
        hyperparameters: best.hyperparameters,
        cv_auc: cv_results.best_auc(),
        cv_results,
        model,
        encoder,
        features: features.to_vec(),
        fitted_rows: final_data.y.len(),
    };
    info!(model = %trained.name(), cv_auc = trained.cv_auc, params = %trained.hyperparameters, "model trained");
    Ok(trained)
}

/// Train every configured family with and without SMOTE.
///
/// `selected` is used for the families listed in
/// `config.families_using_selection`; all `predictors` otherwise.
/// `on_trained` is called after each model is refitted.
pub fn train_all(
    train: &DataFrame,
    target: &str,
    predictors: &[String],
    selected: Option<&[String]>,
    config: &TrainerConfig,
    rng: &mut StdRng,
    mut on_trained: impl FnMut(&TrainedModel),
) -> Result<Vec<TrainedModel>> {
    let y = target_labels(train, target)?;
    let folds = StratifiedKFold::new(config.folds).split(&y, rng)?;

    let mut models = Vec::with_capacity(config.families.len() * 2);
    for &family in &config.families {
        let features = match selected {
            Some(subset) if !subset.is_empty() && config.families_using_selection.contains(&family) => subset,
            _ => predictors,
        };
        for oversample in [false, true] {
            let trained = train_model(family, train, target, features, &folds, oversample, config, rng)?;
            on_trained(&trained);
            models.push(trained);
        }
    }
    Ok(models)
}
