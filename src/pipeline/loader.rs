//! Dataset loader for CSV and Parquet survey extracts

use anyhow::{Context, Result};
use polars::prelude::*;
use std::path::Path;
use tracing::info;

use super::target::column_to_string_vec;
use crate::error::{PipelineError, Stage};

/// Survey table after population and column filtering
#[derive(Debug, Clone)]
pub struct LoadedSurvey {
    pub df: DataFrame,
    /// (rows, columns) as read from disk
    pub raw_shape: (usize, usize),
    /// Rows remaining after the population filter
    pub population_rows: usize,
    pub memory_mb: f64,
}

/// Load a dataset from a file (CSV or Parquet based on extension)
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PipelineError::Load {
            stage: Stage::Load,
            path: path.to_path_buf(),
            message: "file not found".to_string(),
        }
        .into());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    // 0 means full table scan
    let schema_length = if infer_schema_length == 0 {
        None
    } else {
        Some(infer_schema_length)
    };

    let lf = match extension.as_str() {
        "csv" => LazyCsvReader::new(path)
            .with_infer_schema_length(schema_length)
            .finish(),
        "parquet" => LazyFrame::scan_parquet(path, Default::default()),
        _ => {
            return Err(PipelineError::Load {
                stage: Stage::Load,
                path: path.to_path_buf(),
                message: format!(
                    "unsupported file format '{}'. Supported formats: csv, parquet",
                    extension
                ),
            }
            .into())
        }
    };

    let df = lf.and_then(|lf| lf.collect()).map_err(|e| PipelineError::Load {
        stage: Stage::Load,
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(df)
}

/// Keep only the rows whose `column` equals `value`.
///
/// Values are compared in their string rendering, so a numeric country code
/// `124` matches the filter value `"124"`.
pub fn filter_population(df: &DataFrame, column: &str, value: &str) -> Result<DataFrame> {
    let col = df.column(column).map_err(|_| {
        PipelineError::shape(
            Stage::Load,
            format!("population column '{}' not found in dataset", column),
        )
    })?;

    let values = column_to_string_vec(col)?;
    let mask: Vec<bool> = values
        .iter()
        .map(|v| v.as_deref() == Some(value))
        .collect();

    if !mask.iter().any(|&keep| keep) {
        return Err(PipelineError::shape(
            Stage::Load,
            format!("no rows where '{}' equals '{}'", column, value),
        )
        .into());
    }

    let mask = BooleanChunked::from_slice("population".into(), &mask);
    let filtered = df
        .filter(&mask)
        .with_context(|| format!("Failed to filter rows on '{}'", column))?;

    Ok(filtered)
}

/// Keep columns whose name starts with one of `prefixes`, plus every column
/// listed in `keep`. Input column order is preserved.
pub fn select_by_prefix(df: &DataFrame, prefixes: &[String], keep: &[&str]) -> Result<DataFrame> {
    let selected: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .filter(|name| {
            keep.contains(&name.as_str()) || prefixes.iter().any(|p| name.starts_with(p.as_str()))
        })
        .collect();

    if selected.is_empty() {
        return Err(PipelineError::shape(
            Stage::Load,
            format!("no columns match prefixes {:?}", prefixes),
        )
        .into());
    }

    Ok(df.select(selected)?)
}

/// Load the survey file, restrict it to one population (when given as
/// `(column, value)`) and to the questionnaire columns.
pub fn load_survey(
    path: &Path,
    infer_schema_length: usize,
    population: Option<(&str, &str)>,
    prefixes: &[String],
    target: &str,
) -> Result<LoadedSurvey> {
    let df = load_dataset(path, infer_schema_length)?;
    let raw_shape = df.shape();

    let df = match population {
        Some((column, value)) => filter_population(&df, column, value)?,
        None => df,
    };
    let population_rows = df.height();

    let df = select_by_prefix(&df, prefixes, &[target])?;
    if df.column(target).is_err() {
        return Err(PipelineError::shape(
            Stage::Load,
            format!("target column '{}' not found in dataset", target),
        )
        .into());
    }

    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    info!(
        rows = df.height(),
        columns = df.width(),
        "loaded {} population rows out of {}",
        population_rows,
        raw_shape.0
    );

    Ok(LoadedSurvey {
        df,
        raw_shape,
        population_rows,
        memory_mb,
    })
}
