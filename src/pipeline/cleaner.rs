//! Survey table cleaning
//!
//! Drops unusable columns, removes rows without an outcome, imputes the
//! remaining gaps and binarizes the target.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use super::missing::MissingPolicy;
use super::schema::{apply_schema, CleaningSchema, ExclusionReason};
use super::target::{analyze_target_column, binarize_target, count_classes, TargetMapping};
use crate::error::{PipelineError, Stage};

/// Everything the cleaner needs to know about the table
#[derive(Debug, Clone)]
pub struct CleaningOptions {
    pub target: String,
    pub mapping: TargetMapping,
    pub policy: MissingPolicy,
    pub manual_exclusions: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub sentinel: String,
}

/// Summary of the cleaning step
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningSummary {
    pub policy: Option<MissingPolicy>,
    pub initial_columns: usize,
    pub final_columns: usize,
    pub dropped_missing: Vec<(String, f64)>,
    pub dropped_manual: Vec<String>,
    pub rows_before: usize,
    pub rows_dropped_target: usize,
    pub imputed_cells: usize,
    pub sentinel_overrides: Vec<(String, String)>,
    /// (non_events, events) after binarization
    pub class_counts: (usize, usize),
}

/// Output of [`clean`]
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub df: DataFrame,
    pub target: String,
    pub schema: CleaningSchema,
    pub summary: CleaningSummary,
}

impl CleanedTable {
    /// Predictor column names, in table order
    pub fn predictors(&self) -> Vec<String> {
        self.schema.predictors()
    }
}

/// Clean a loaded survey table.
pub fn clean(df: &DataFrame, options: &CleaningOptions) -> Result<CleanedTable> {
    let target = options.target.as_str();

    // Validates presence and that the target is not entirely null
    analyze_target_column(df, target)?;

    let mut summary = CleaningSummary {
        policy: Some(options.policy),
        initial_columns: df.width().saturating_sub(1),
        rows_before: df.height(),
        ..Default::default()
    };

    // (a) column roles and drops
    let schema = CleaningSchema::infer(
        df,
        target,
        options.policy,
        &options.manual_exclusions,
        &options.numeric_columns,
    )?;
    for (name, reason) in schema.excluded() {
        match reason {
            ExclusionReason::Missing { ratio } => summary.dropped_missing.push((name, ratio)),
            ExclusionReason::Manual => summary.dropped_manual.push(name),
        }
    }

    if schema.predictors().is_empty() {
        return Err(PipelineError::shape(
            Stage::Clean,
            "no predictor columns remain after applying the missing-value policy",
        )
        .into());
    }

    let excluded: Vec<String> = schema.excluded().into_iter().map(|(name, _)| name).collect();
    let df = df.drop_many(&excluded);

    // (b) rows without an outcome
    let has_target = df
        .column(target)
        .with_context(|| format!("[clean] target column '{}' missing after column drops", target))?
        .is_not_null();
    let df = df
        .filter(&has_target)
        .with_context(|| format!("[clean] failed to drop rows with a null '{}'", target))?;
    summary.rows_dropped_target = summary.rows_before - df.height();

    // (c) + (d) impute and cast
    let (df, stats) = apply_schema(&df, &schema, &options.sentinel)?;
    summary.imputed_cells = stats.imputed_cells;
    summary.sentinel_overrides = stats.sentinel_overrides;

    // (e) target to 0/1
    let df = binarize_target(&df, target, &options.mapping)?;
    summary.class_counts = count_classes(&df, target)?;
    summary.final_columns = df.width() - 1;

    if summary.class_counts.1 == 0 {
        return Err(PipelineError::shape(
            Stage::Clean,
            format!(
                "no row of '{}' matches the positive value(s) {:?}",
                target, options.mapping.positive_values
            ),
        )
        .into());
    }
    if summary.class_counts.0 == 0 {
        return Err(PipelineError::shape(
            Stage::Clean,
            format!(
                "every row of '{}' matches the positive value(s) {:?}; no negative class remains",
                target, options.mapping.positive_values
            ),
        )
        .into());
    }

    info!(
        columns = summary.final_columns,
        rows = df.height(),
        imputed = summary.imputed_cells,
        "cleaning complete"
    );

    Ok(CleanedTable {
        df,
        target: target.to_string(),
        schema,
        summary,
    })
}
