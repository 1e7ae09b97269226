//! Target column analysis and binarization
//!
//! The questionnaire answer used as outcome is remapped to a `UInt8` 0/1
//! column where 1 marks the positive ("failing") category. The mapping is
//! always applied to the raw values: a `UInt8` column of 0/1 codes is still
//! a survey answer until it has been mapped. Once binarized, the column is
//! described by [`TargetMapping::binarized`], and mapping it again with that
//! leaves it unchanged.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Stage};

/// Mapping configuration for converting target column values to binary 0/1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMapping {
    /// Values that map to 1 (event). Everything else maps to 0.
    pub positive_values: Vec<String>,
}

impl TargetMapping {
    pub fn new(positive_values: Vec<String>) -> Self {
        Self { positive_values }
    }

    /// The mapping that holds for a column this module has already binarized
    pub fn binarized() -> Self {
        Self::new(vec!["1".to_string()])
    }

    fn is_positive(&self, value: &str) -> bool {
        self.positive_values.iter().any(|p| p == value)
    }
}

/// Observed values of a target column
#[derive(Debug, Clone)]
pub struct TargetAnalysis {
    /// Distinct non-null values rendered as strings, sorted
    pub unique_values: Vec<String>,
    pub null_count: usize,
}

/// Check that the target exists and holds at least one value, and list its
/// distinct values
pub fn analyze_target_column(df: &DataFrame, target: &str) -> Result<TargetAnalysis> {
    let target_col = df
        .column(target)
        .map_err(|_| PipelineError::shape(Stage::Clean, format!("target column '{}' not found", target)))?;

    if target_col.len() == 0 {
        return Err(PipelineError::shape(Stage::Clean, format!("target column '{}' is empty", target)).into());
    }

    if target_col.null_count() == target_col.len() {
        return Err(PipelineError::shape(
            Stage::Clean,
            format!("target column '{}' contains only null values", target),
        )
        .into());
    }

    let mut unique_values: Vec<String> = column_to_string_vec(target_col)?
        .into_iter()
        .flatten()
        .collect();
    unique_values.sort();
    unique_values.dedup();

    Ok(TargetAnalysis {
        unique_values,
        null_count: target_col.null_count(),
    })
}

/// Create a binary target mask based on the mapping
///
/// Returns `Some(1)` for positive values, `Some(0)` for every other observed
/// value and `None` for nulls.
pub fn create_target_mask(
    df: &DataFrame,
    target: &str,
    mapping: &TargetMapping,
) -> Result<Vec<Option<u8>>> {
    let target_col = df
        .column(target)
        .with_context(|| format!("Target column '{}' not found", target))?;

    let mask = column_to_string_vec(target_col)?
        .iter()
        .map(|v| v.as_deref().map(|s| u8::from(mapping.is_positive(s))))
        .collect();

    Ok(mask)
}

/// Replace the target column with its binarized `UInt8` form.
///
/// Rows with a null target must have been removed beforehand. The mapping is
/// applied whatever the column's dtype.
pub fn binarize_target(df: &DataFrame, target: &str, mapping: &TargetMapping) -> Result<DataFrame> {
    let mask = create_target_mask(df, target, mapping)?;
    let nulls = mask.iter().filter(|v| v.is_none()).count();
    if nulls > 0 {
        return Err(PipelineError::shape(
            Stage::Clean,
            format!("target column '{}' still has {} null value(s)", target, nulls),
        )
        .into());
    }

    let values: Vec<u8> = mask.into_iter().flatten().collect();
    let mut out = df.clone();
    out.with_column(Column::new(target.into(), values))?;
    Ok(out)
}

/// Read a binarized target column into labels
pub fn target_labels(df: &DataFrame, target: &str) -> Result<Vec<u8>> {
    let col = df
        .column(target)
        .with_context(|| format!("Target column '{}' not found", target))?;
    let labels = col
        .u8()
        .with_context(|| format!("Target column '{}' is not binarized", target))?
        .into_iter()
        .map(|v| v.unwrap_or(0))
        .collect();
    Ok(labels)
}

/// Count (non_events, events) in a binarized target column
pub fn count_classes(df: &DataFrame, target: &str) -> Result<(usize, usize)> {
    let labels = target_labels(df, target)?;
    let events = labels.iter().filter(|&&v| v == 1).count();
    Ok((labels.len() - events, events))
}

/// Convert a column to a Vec of Option<String> for comparison
pub(crate) fn column_to_string_vec(col: &Column) -> Result<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(|n| format!("{}", n)))
                .collect()
        }
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => {
            // For other types, try to cast to string
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };

    Ok(values)
}
