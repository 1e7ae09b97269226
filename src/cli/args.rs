//! Command-line argument definitions using clap

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::pipeline::{FoldPolicy, MissingPolicy, ModelFamily, PipelineConfig};

/// pisarisk - Predict which students fail math from survey responses
///
/// Loads the student questionnaire, cleans it, selects features with Boruta
/// and compares logistic, random forest, lasso and elastic-net models, each
/// with and without SMOTE oversampling.
#[derive(Parser, Debug)]
#[command(name = "pisarisk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Target column name (the "failed math" response)
    #[arg(short, long)]
    pub target: Option<String>,

    /// Target value(s) that mean failing, mapped to 1 (comma-separated).
    /// Default: 1
    #[arg(long, value_delimiter = ',')]
    pub positive: Vec<String>,

    /// JSON file with a full run configuration. Command-line options
    /// override values from the file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Random seed for the split, selection and model fitting. Default: 2020
    #[arg(long)]
    pub seed: Option<u64>,

    /// Share of rows used for training. Default: 0.7
    #[arg(long, value_parser = validate_open_unit)]
    pub split_ratio: Option<f64>,

    /// Column used to restrict the population. Default: CNT
    #[arg(long)]
    pub population_column: Option<String>,

    /// Value of the population column to keep. Default: CAN
    #[arg(long)]
    pub population_value: Option<String>,

    /// Keep every row regardless of population
    #[arg(long, default_value = "false")]
    pub all_rows: bool,

    /// Predictor column prefixes (comma-separated). Default: ST
    #[arg(long, value_delimiter = ',')]
    pub prefix: Vec<String>,

    /// Drop predictors with more than this share of missing values.
    /// Without it only completely empty columns are dropped.
    #[arg(long, value_parser = validate_unit)]
    pub missing_threshold: Option<f64>,

    /// Columns to exclude by hand (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Columns to treat as numeric instead of categorical (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub numeric: Vec<String>,

    /// Category label given to missing cells. Default: 0
    #[arg(long)]
    pub sentinel: Option<String>,

    /// Cross-validation folds. Default: 5
    #[arg(long)]
    pub folds: Option<usize>,

    /// What to do with a fold that cannot be scored: skip, penalize or fail.
    /// Default: skip
    #[arg(long)]
    pub fold_policy: Option<FoldPolicy>,

    /// Model families to train (comma-separated: logistic, forest, lasso,
    /// elastic-net). Default: all
    #[arg(long, value_delimiter = ',')]
    pub models: Vec<ModelFamily>,

    /// Trees per random forest. Default: 500
    #[arg(long)]
    pub trees: Option<usize>,

    /// Random forest mtry values to tune over (comma-separated).
    /// Default: around sqrt of the number of columns
    #[arg(long, value_delimiter = ',')]
    pub mtry: Vec<usize>,

    /// Elastic-net alpha values (comma-separated). Default: 0.25,0.5,0.75
    #[arg(long, value_delimiter = ',')]
    pub alpha: Vec<f64>,

    /// Lambdas per penalized path. Default: 20
    #[arg(long)]
    pub lambda_count: Option<usize>,

    /// SMOTE nearest neighbours. Default: 5
    #[arg(long)]
    pub smote_k: Option<usize>,

    /// Probability at which a student is predicted to fail. Default: 0.5
    #[arg(long, value_parser = validate_unit)]
    pub threshold: Option<f64>,

    /// Maximum Boruta runs. Default: 100
    #[arg(long)]
    pub boruta_runs: Option<usize>,

    /// Boruta significance level. Default: 0.01
    #[arg(long, value_parser = validate_open_unit)]
    pub boruta_p_value: Option<f64>,

    /// Trees per Boruta forest. Default: 200
    #[arg(long)]
    pub boruta_trees: Option<usize>,

    /// Train every family on all predictors without running Boruta
    #[arg(long, default_value = "false")]
    pub skip_selection: bool,

    /// Smaller forests and fewer selection runs
    #[arg(long, default_value = "false")]
    pub quick: bool,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,

    /// Print the run report as JSON instead of tables
    #[arg(long, default_value = "false")]
    pub json: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long)]
    pub infer_schema_length: Option<usize>,
}

fn validate_unit(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{} must be between 0 and 1", value))
    }
}

fn validate_open_unit(s: &str) -> Result<f64, String> {
    let value = validate_unit(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("{} must be strictly between 0 and 1", value))
    }
}

fn override_with<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

fn override_list<T: Clone>(slot: &mut Vec<T>, values: &[T]) {
    if !values.is_empty() {
        *slot = values.to_vec();
    }
}

impl Cli {
    /// Build the run configuration: file (or defaults), then command-line
    /// overrides, then validation
    pub fn to_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)?,
            None => PipelineConfig::default(),
        };

        if self.input.is_some() {
            config.input = self.input.clone();
        }
        override_with(&mut config.target, &self.target);
        override_list(&mut config.positive_values, &self.positive);
        override_with(&mut config.seed, &self.seed);
        override_with(&mut config.split_ratio, &self.split_ratio);
        override_with(&mut config.population_column, &self.population_column);
        override_with(&mut config.population_value, &self.population_value);
        if self.all_rows {
            config.population_column.clear();
        }
        override_list(&mut config.column_prefixes, &self.prefix);
        if let Some(t) = self.missing_threshold {
            config.missing_policy = MissingPolicy::Threshold(t);
        }
        override_list(&mut config.manual_exclusions, &self.exclude);
        override_list(&mut config.numeric_columns, &self.numeric);
        override_with(&mut config.sentinel, &self.sentinel);
        override_with(&mut config.infer_schema_length, &self.infer_schema_length);
        config.skip_selection |= self.skip_selection;

        let trainer = &mut config.trainer;
        override_with(&mut trainer.folds, &self.folds);
        override_with(&mut trainer.fold_policy, &self.fold_policy);
        override_list(&mut trainer.families, &self.models);
        override_with(&mut trainer.n_trees, &self.trees);
        override_list(&mut trainer.mtry_grid, &self.mtry);
        override_list(&mut trainer.alpha_grid, &self.alpha);
        override_with(&mut trainer.lambda_count, &self.lambda_count);
        override_with(&mut trainer.smote_neighbors, &self.smote_k);
        override_with(&mut trainer.threshold, &self.threshold);

        override_with(&mut config.boruta.max_runs, &self.boruta_runs);
        override_with(&mut config.boruta.p_value, &self.boruta_p_value);
        override_with(&mut config.boruta.n_trees, &self.boruta_trees);

        if self.quick {
            config.apply_quick();
        }
        if config.input.is_none() {
            return Err(crate::error::PipelineError::Config(
                "input file is required. Use -i/--input to specify a file.".to_string(),
            )
            .into());
        }
        config.validate()?;
        Ok(config)
    }
}
