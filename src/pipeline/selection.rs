//! Boruta all-relevant feature selection
//!
//! Every run pits the undecided and confirmed features against row-permuted
//! shadow copies of themselves inside a random forest. A feature whose
//! permutation importance beats the best shadow collects a hit; binomial
//! tests on the hit counts confirm or reject it.

use anyhow::{Context, Result};
use faer::Mat;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::encode::CategoricalEncoder;
use super::model::{ForestParams, RandomForest};
use super::target::target_labels;
use crate::error::{PipelineError, Stage};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BorutaConfig {
    pub max_runs: usize,
    pub p_value: f64,
    pub n_trees: usize,
    /// Columns per split; `None` means sqrt of the real + shadow width
    pub mtry: Option<usize>,
}

impl Default for BorutaConfig {
    fn default() -> Self {
        Self {
            max_runs: 100,
            p_value: 0.01,
            n_trees: 200,
            mtry: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirmed,
    Tentative,
    Rejected,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Confirmed => write!(f, "Confirmed"),
            Decision::Tentative => write!(f, "Tentative"),
            Decision::Rejected => write!(f, "Rejected"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureDecision {
    pub name: String,
    pub decision: Decision,
    pub hits: usize,
    /// Runs the feature took part in
    pub runs: usize,
    pub median_importance: f64,
    /// Decided by comparing medians after the run limit
    pub rough_fixed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionResult {
    pub decisions: Vec<FeatureDecision>,
    pub runs: usize,
    pub shadow_max_median: f64,
}

impl SelectionResult {
    /// Confirmed features in input order
    pub fn selected(&self) -> Vec<String> {
        self.with_decision(Decision::Confirmed)
    }

    pub fn rejected(&self) -> Vec<String> {
        self.with_decision(Decision::Rejected)
    }

    fn with_decision(&self, decision: Decision) -> Vec<String> {
        self.decisions
            .iter()
            .filter(|d| d.decision == decision)
            .map(|d| d.name.clone())
            .collect()
    }

    pub fn rough_fixed(&self) -> usize {
        self.decisions.iter().filter(|d| d.rough_fixed).count()
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// P(X = k) for X ~ Binomial(n, 1/2)
fn binomial_half_pmf(n: usize, k: usize) -> f64 {
    let ln_choose: f64 = (1..=k).map(|i| ((n - k + i) as f64).ln() - (i as f64).ln()).sum();
    (ln_choose - n as f64 * std::f64::consts::LN_2).exp()
}

/// P(X >= k)
pub(crate) fn binomial_upper_tail(n: usize, k: usize) -> f64 {
    (k..=n).map(|i| binomial_half_pmf(n, i)).sum::<f64>().min(1.0)
}

/// P(X <= k)
pub(crate) fn binomial_lower_tail(n: usize, k: usize) -> f64 {
    (0..=k.min(n)).map(|i| binomial_half_pmf(n, i)).sum::<f64>().min(1.0)
}

/// Per-feature bookkeeping across runs
struct Track {
    decision: Decision,
    hits: usize,
    runs: usize,
    history: Vec<f64>,
}

/// Real columns of the active features followed by a row-permuted copy of
/// each, with one permutation per feature block
fn with_shadows(
    x: &Mat<f64>,
    blocks: &[Vec<usize>],
    rng: &mut StdRng,
) -> (Mat<f64>, Vec<usize>) {
    let n = x.nrows();
    let mut columns: Vec<(usize, Option<usize>)> = Vec::new(); // (source column, shadow permutation)
    let mut groups = Vec::new();
    let mut perms: Vec<Vec<usize>> = Vec::with_capacity(blocks.len());

    for (g, block) in blocks.iter().enumerate() {
        for &col in block {
            columns.push((col, None));
            groups.push(g);
        }
    }
    for (g, block) in blocks.iter().enumerate() {
        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(rng);
        perms.push(perm);
        for &col in block {
            columns.push((col, Some(g)));
            groups.push(blocks.len() + g);
        }
    }

    let matrix = Mat::from_fn(n, columns.len(), |i, j| match columns[j] {
        (col, None) => x[(i, col)],
        (col, Some(p)) => x[(perms[p][i], col)],
    });
    (matrix, groups)
}

/// Run Boruta on `features` of the training table
pub fn select_features(
    train: &DataFrame,
    target: &str,
    features: &[String],
    config: &BorutaConfig,
    rng: &mut StdRng,
) -> Result<SelectionResult> {
    if features.is_empty() {
        return Err(PipelineError::shape(Stage::Select, "no candidate features for selection").into());
    }
    if config.max_runs == 0 || !(0.0..1.0).contains(&config.p_value) {
        return Err(PipelineError::Config(format!(
            "boruta needs max_runs > 0 and p_value in [0, 1), got {} and {}",
            config.max_runs, config.p_value
        ))
        .into());
    }

    let encoder = CategoricalEncoder::fit(train, features, false)?;
    let x = encoder.transform(train)?;
    let y = target_labels(train, target).context("Failed to read target for selection")?;
    let groups = encoder.groups();

    let mut tracks: Vec<Track> = features
        .iter()
        .map(|_| Track {
            decision: Decision::Tentative,
            hits: 0,
            runs: 0,
            history: Vec::new(),
        })
        .collect();
    let mut shadow_max_history = Vec::new();
    let mut runs = 0;

    while runs < config.max_runs && tracks.iter().any(|t| t.decision == Decision::Tentative) {
        runs += 1;

        let active: Vec<usize> = (0..features.len())
            .filter(|&f| tracks[f].decision != Decision::Rejected)
            .collect();
        let blocks: Vec<Vec<usize>> = active
            .iter()
            .map(|&f| (0..groups.len()).filter(|&j| groups[j] == f).collect())
            .collect();

        let (xs, run_groups) = with_shadows(&x, &blocks, rng);
        let params = ForestParams {
            n_trees: config.n_trees,
            mtry: config.mtry,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&xs, &y, &params, rng)
            .map_err(|e| PipelineError::shape(Stage::Select, format!("boruta forest failed: {}", e)))?;
        let importance = forest.permutation_importance(&xs, &y, &run_groups, 2 * active.len(), rng);

        let (real, shadow) = importance.split_at(active.len());
        let shadow_max = shadow.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        shadow_max_history.push(shadow_max);

        for (pos, &f) in active.iter().enumerate() {
            let track = &mut tracks[f];
            track.history.push(real[pos]);
            if track.decision == Decision::Tentative {
                track.runs += 1;
                if real[pos] > shadow_max {
                    track.hits += 1;
                }
            }
        }

        let undecided = tracks.iter().filter(|t| t.decision == Decision::Tentative).count();
        for track in tracks.iter_mut().filter(|t| t.decision == Decision::Tentative) {
            let confirm_p = binomial_upper_tail(track.runs, track.hits) * undecided as f64;
            let reject_p = binomial_lower_tail(track.runs, track.hits) * undecided as f64;
            if confirm_p < config.p_value {
                track.decision = Decision::Confirmed;
            } else if reject_p < config.p_value {
                track.decision = Decision::Rejected;
            }
        }

        debug!(
            run = runs,
            shadow_max,
            confirmed = tracks.iter().filter(|t| t.decision == Decision::Confirmed).count(),
            rejected = tracks.iter().filter(|t| t.decision == Decision::Rejected).count(),
            "boruta run"
        );
    }

    let shadow_max_median = median(&shadow_max_history);
    let decisions: Vec<FeatureDecision> = features
        .iter()
        .zip(tracks)
        .map(|(name, track)| {
            let median_importance = median(&track.history);
            let (decision, rough_fixed) = match track.decision {
                Decision::Tentative if median_importance > shadow_max_median => (Decision::Confirmed, true),
                Decision::Tentative => (Decision::Rejected, true),
                other => (other, false),
            };
            FeatureDecision {
                name: name.clone(),
                decision,
                hits: track.hits,
                runs: track.runs,
                median_importance,
                rough_fixed,
            }
        })
        .collect();

    let result = SelectionResult {
        decisions,
        runs,
        shadow_max_median,
    };
    info!(
        runs,
        selected = result.selected().len(),
        rough_fixed = result.rough_fixed(),
        "feature selection finished"
    );
    Ok(result)
}
