//! Run configuration, loadable from JSON and overridable from the CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cleaner::CleaningOptions;
use super::missing::MissingPolicy;
use super::selection::BorutaConfig;
use super::target::TargetMapping;
use super::trainer::TrainerConfig;
use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: Option<PathBuf>,
    /// Rows used for CSV schema inference (0 scans the whole file)
    pub infer_schema_length: usize,
    pub seed: u64,
    /// Share of rows in the training partition
    pub split_ratio: f64,
    /// Rows are kept where this column equals `population_value`; empty disables the filter
    pub population_column: String,
    pub population_value: String,
    pub column_prefixes: Vec<String>,
    pub target: String,
    /// Raw target values mapped to 1
    pub positive_values: Vec<String>,
    pub missing_policy: MissingPolicy,
    pub manual_exclusions: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub sentinel: String,
    pub skip_selection: bool,
    pub boruta: BorutaConfig,
    pub trainer: TrainerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: None,
            infer_schema_length: 10000,
            seed: 2020,
            split_ratio: 0.7,
            population_column: "CNT".to_string(),
            population_value: "CAN".to_string(),
            column_prefixes: vec!["ST".to_string()],
            target: String::new(),
            positive_values: vec!["1".to_string()],
            missing_policy: MissingPolicy::FullyMissing,
            manual_exclusions: Vec::new(),
            numeric_columns: Vec::new(),
            sentinel: "0".to_string(),
            skip_selection: false,
            boruta: BorutaConfig::default(),
            trainer: TrainerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&text)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Smaller forests and fewer selection runs for a fast look at the data
    pub fn apply_quick(&mut self) {
        self.trainer.n_trees = self.trainer.n_trees.min(100);
        self.trainer.lambda_count = self.trainer.lambda_count.min(10);
        self.boruta.n_trees = self.boruta.n_trees.min(50);
        self.boruta.max_runs = self.boruta.max_runs.min(20);
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::Config(msg));

        if self.target.trim().is_empty() {
            return fail("a target column is required".to_string());
        }
        if self.positive_values.is_empty() {
            return fail("at least one positive target value is required".to_string());
        }
        if !(self.split_ratio > 0.0 && self.split_ratio < 1.0) {
            return fail(format!("split ratio must be in (0, 1), got {}", self.split_ratio));
        }
        if let MissingPolicy::Threshold(t) = self.missing_policy {
            if !(0.0..=1.0).contains(&t) {
                return fail(format!("missing threshold must be in [0, 1], got {}", t));
            }
        }
        if self.sentinel.is_empty() {
            return fail("sentinel label cannot be empty".to_string());
        }
        if self.trainer.folds < 2 {
            return fail(format!("at least 2 folds are required, got {}", self.trainer.folds));
        }
        if self.trainer.families.is_empty() {
            return fail("no model families configured".to_string());
        }
        if self.trainer.n_trees == 0 || self.boruta.n_trees == 0 {
            return fail("forests need at least one tree".to_string());
        }
        if let Some(alpha) = self
            .trainer
            .alpha_grid
            .iter()
            .find(|a| !(**a > 0.0 && **a <= 1.0))
        {
            return fail(format!("elastic-net alpha must be in (0, 1], got {}", alpha));
        }
        if !(self.trainer.lambda_min_ratio > 0.0 && self.trainer.lambda_min_ratio < 1.0) {
            return fail(format!(
                "lambda min ratio must be in (0, 1), got {}",
                self.trainer.lambda_min_ratio
            ));
        }
        if !(0.0..=1.0).contains(&self.trainer.threshold) {
            return fail(format!(
                "classification threshold must be in [0, 1], got {}",
                self.trainer.threshold
            ));
        }
        if self.trainer.smote_neighbors == 0 {
            return fail("SMOTE needs at least one neighbour".to_string());
        }
        Ok(())
    }

    pub fn cleaning_options(&self) -> CleaningOptions {
        CleaningOptions {
            target: self.target.clone(),
            mapping: TargetMapping::new(self.positive_values.clone()),
            policy: self.missing_policy,
            manual_exclusions: self.manual_exclusions.clone(),
            numeric_columns: self.numeric_columns.clone(),
            sentinel: self.sentinel.clone(),
        }
    }

    pub fn population_filter(&self) -> Option<(&str, &str)> {
        if self.population_column.is_empty() {
            None
        } else {
            Some((&self.population_column, &self.population_value))
        }
    }
}
