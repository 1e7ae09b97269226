//! Stratified cross-validation and AUC-scored grid search

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::encode::EncodedData;
use super::model::{Hyperparameters, ModelFamily};
use super::resample::Smote;
use crate::error::{PipelineError, Stage};

/// Validation AUC assigned to a failed fold under [`FoldPolicy::Penalize`]
pub const PENALTY_AUC: f64 = 0.5;

/// What to do with a fold that cannot be scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldPolicy {
    /// Leave the fold out of the candidate's mean
    #[default]
    Skip,
    /// Score the fold as a coin flip
    Penalize,
    /// Abort the run
    Fail,
}

impl std::fmt::Display for FoldPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FoldPolicy::Skip => write!(f, "skip"),
            FoldPolicy::Penalize => write!(f, "penalize"),
            FoldPolicy::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for FoldPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(FoldPolicy::Skip),
            "penalize" | "penalise" => Ok(FoldPolicy::Penalize),
            "fail" => Ok(FoldPolicy::Fail),
            _ => Err(format!(
                "Unknown fold policy: '{}'. Use 'skip', 'penalize' or 'fail'.",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub k: usize,
}

impl StratifiedKFold {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Partition row indices into `k` folds with the class mix of `y`
    /// preserved in every validation part.
    pub fn split(&self, y: &[u8], rng: &mut StdRng) -> Result<Vec<Fold>, PipelineError> {
        if self.k < 2 {
            return Err(PipelineError::Config(format!(
                "cross-validation needs at least 2 folds, got {}",
                self.k
            )));
        }
        if y.len() < self.k {
            return Err(PipelineError::shape(
                Stage::Train,
                format!("{} training rows cannot fill {} folds", y.len(), self.k),
            ));
        }

        let mut assignment = vec![0usize; y.len()];
        let mut slot = 0;
        for class in [0u8, 1] {
            let mut rows: Vec<usize> = (0..y.len()).filter(|&i| y[i] == class).collect();
            rows.shuffle(rng);
            for row in rows {
                assignment[row] = slot % self.k;
                slot += 1;
            }
        }

        Ok((0..self.k)
            .map(|fold| {
                let (validation, train): (Vec<usize>, Vec<usize>) =
                    (0..y.len()).partition(|&i| assignment[i] == fold);
                Fold { train, validation }
            })
            .collect())
    }
}

/// Area under the ROC curve via the Mann-Whitney statistic, with tied scores
/// sharing their average rank. `None` when only one class is present.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Cross-validated score of one hyperparameter candidate
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub hyperparameters: Hyperparameters,
    /// Per-fold validation AUC; `None` for skipped folds
    pub fold_aucs: Vec<Option<f64>>,
    pub failed_folds: usize,
    /// `None` when every fold failed
    pub mean_auc: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSearchResult {
    pub candidates: Vec<CandidateScore>,
    /// Index of the winning candidate
    pub best: usize,
}

impl GridSearchResult {
    pub fn best_candidate(&self) -> &CandidateScore {
        &self.candidates[self.best]
    }

    pub fn best_auc(&self) -> f64 {
        self.best_candidate().mean_auc.unwrap_or(f64::NAN)
    }
}

/// Score every candidate on the same folds and pick the highest mean AUC.
///
/// When `smote` is given only the training part of each fold is oversampled.
/// Ties go to the earlier candidate.
pub fn grid_search(
    family: ModelFamily,
    data: &EncodedData,
    folds: &[Fold],
    candidates: &[Hyperparameters],
    policy: FoldPolicy,
    smote: Option<&Smote>,
    rng: &mut StdRng,
) -> Result<GridSearchResult, PipelineError> {
    let label = match smote {
        Some(_) => format!("{} + SMOTE", family),
        None => family.to_string(),
    };

    let mut fold_aucs: Vec<Vec<Option<f64>>> = vec![Vec::with_capacity(folds.len()); candidates.len()];
    let mut failures = vec![0usize; candidates.len()];

    for (fold_idx, fold) in folds.iter().enumerate() {
        let fold_no = fold_idx + 1;
        let validation = data.select_rows(&fold.validation);
        let mut train = data.select_rows(&fold.train);
        if let Some(smote) = smote {
            train = smote.oversample(&train, rng);
        }

        let outcomes: Vec<Result<f64, String>> = if validation.events() == 0
            || validation.events() == validation.n_rows()
        {
            vec![Err("validation fold has a single class".to_string()); candidates.len()]
        } else {
            family
                .fit_grid(&train.x, &train.y, candidates, rng)
                .into_iter()
                .map(|fitted| {
                    let model = fitted.map_err(|e| e.to_string())?;
                    let scores = model.predict_proba(&validation.x);
                    roc_auc(&scores, &validation.y)
                        .ok_or_else(|| "validation AUC is undefined".to_string())
                })
                .collect()
        };

        for (c, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(auc) => {
                    debug!(model = %label, fold = fold_no, candidate = %candidates[c], auc, "fold scored");
                    fold_aucs[c].push(Some(auc));
                }
                Err(reason) => {
                    failures[c] += 1;
                    match policy {
                        FoldPolicy::Fail => {
                            return Err(PipelineError::FoldFailed {
                                model: label,
                                fold: fold_no,
                                reason,
                            })
                        }
                        FoldPolicy::Skip => {
                            warn!(model = %label, fold = fold_no, candidate = %candidates[c], %reason, "skipping fold");
                            fold_aucs[c].push(None);
                        }
                        FoldPolicy::Penalize => {
                            warn!(model = %label, fold = fold_no, candidate = %candidates[c], %reason, "penalizing fold");
                            fold_aucs[c].push(Some(PENALTY_AUC));
                        }
                    }
                }
            }
        }
    }

    let scored: Vec<CandidateScore> = candidates
        .iter()
        .zip(fold_aucs)
        .zip(failures)
        .map(|((hp, aucs), failed_folds)| {
            let valid: Vec<f64> = aucs.iter().flatten().copied().collect();
            let mean_auc = if failed_folds == folds.len() || valid.is_empty() {
                None
            } else {
                Some(valid.iter().sum::<f64>() / valid.len() as f64)
            };
            CandidateScore {
                hyperparameters: hp.clone(),
                fold_aucs: aucs,
                failed_folds,
                mean_auc,
            }
        })
        .collect();

    let best = scored
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.mean_auc.map(|auc| (i, auc)))
        .fold(None::<(usize, f64)>, |best, (i, auc)| match best {
            Some((_, b)) if b >= auc => best,
            _ => Some((i, auc)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| PipelineError::AllFoldsFailed {
            model: label.clone(),
            folds: folds.len(),
            candidates: candidates.len(),
        })?;

    debug!(model = %label, best = %scored[best].hyperparameters, "grid search finished");

    Ok(GridSearchResult {
        candidates: scored,
        best,
    })
}
