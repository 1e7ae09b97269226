//! Machine-readable report of a full run
//!
//! Everything printed to the console is also available as one JSON document
//! (`--json`), including the per-fold CV scores of every candidate.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use super::models::top_effects;
use super::summary::{missing_policy_note, StageTimings};
use crate::pipeline::{
    CleaningSummary, Evaluation, GridSearchResult, Hyperparameters, PipelineConfig, SelectionResult,
    TrainedModel,
};

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub pisarisk_version: String,
    pub input_file: String,
    pub seed: u64,
    pub target: String,
    pub positive_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_policy_note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitEntry {
    pub train_rows: usize,
    pub test_rows: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelEntry {
    pub name: String,
    pub oversampled: bool,
    pub hyperparameters: Hyperparameters,
    pub cv_auc: f64,
    pub features: Vec<String>,
    pub fitted_rows: usize,
    pub cross_validation: GridSearchResult,
    pub evaluation: Evaluation,
    /// Largest coefficients or importances
    pub top_effects: Vec<(String, f64)>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub metadata: ReportMetadata,
    pub config: PipelineConfig,
    pub cleaning: CleaningSummary,
    pub split: SplitEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionResult>,
    pub models: Vec<ModelEntry>,
    pub timings: StageTimings,
}

/// Number of effects listed per model
const TOP_EFFECTS: usize = 10;

pub struct RunReportBuilder {
    config: PipelineConfig,
    cleaning: CleaningSummary,
    split: SplitEntry,
    selection: Option<SelectionResult>,
    models: Vec<ModelEntry>,
}

impl RunReportBuilder {
    pub fn new(config: &PipelineConfig, cleaning: &CleaningSummary, train_rows: usize, test_rows: usize) -> Self {
        Self {
            config: config.clone(),
            cleaning: cleaning.clone(),
            split: SplitEntry {
                train_rows,
                test_rows,
                ratio: config.split_ratio,
            },
            selection: None,
            models: Vec::new(),
        }
    }

    pub fn set_selection(&mut self, selection: &SelectionResult) {
        self.selection = Some(selection.clone());
    }

    pub fn add_model(&mut self, trained: &TrainedModel, evaluation: &Evaluation) {
        self.models.push(ModelEntry {
            name: trained.name(),
            oversampled: trained.oversampled,
            hyperparameters: trained.hyperparameters.clone(),
            cv_auc: trained.cv_auc,
            features: trained.features.clone(),
            fitted_rows: trained.fitted_rows,
            cross_validation: trained.cv_results.clone(),
            evaluation: evaluation.clone(),
            top_effects: top_effects(trained, TOP_EFFECTS),
        });
    }

    pub fn build(self, timings: StageTimings) -> RunReport {
        RunReport {
            metadata: ReportMetadata {
                timestamp: Utc::now().to_rfc3339(),
                pisarisk_version: env!("CARGO_PKG_VERSION").to_string(),
                input_file: self
                    .config
                    .input
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                seed: self.config.seed,
                target: self.config.target.clone(),
                positive_values: self.config.positive_values.clone(),
                missing_policy_note: missing_policy_note(self.config.missing_policy),
            },
            config: self.config,
            cleaning: self.cleaning,
            split: self.split,
            selection: self.selection,
            models: self.models,
            timings,
        }
    }
}

impl RunReport {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    /// Entry with the highest test AUC
    pub fn best_model(&self) -> Option<&ModelEntry> {
        self.models
            .iter()
            .filter(|m| m.evaluation.metrics.auc.is_finite())
            .max_by(|a, b| {
                a.evaluation
                    .metrics
                    .auc
                    .partial_cmp(&b.evaluation.metrics.auc)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}
