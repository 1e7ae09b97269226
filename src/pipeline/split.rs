//! Seeded train/test partitioning

use anyhow::{Context, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{PipelineError, Stage};

/// Two disjoint row subsets of the cleaned table
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: DataFrame,
    pub test: DataFrame,
    /// Row indices into the input table, ascending
    pub train_rows: Vec<usize>,
    pub test_rows: Vec<usize>,
}

/// Partition `n` row indices into (train, test) with `round(ratio * n)`
/// training rows. Both sides come back in ascending order.
pub fn split_indices(n: usize, ratio: f64, rng: &mut StdRng) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(PipelineError::shape(
            Stage::Split,
            format!("split ratio must be between 0 and 1, got {}", ratio),
        )
        .into());
    }

    let n_train = (ratio * n as f64).round() as usize;
    let n_test = n - n_train;
    if n_train == 0 || n_test == 0 {
        return Err(PipelineError::shape(
            Stage::Split,
            format!(
                "split would produce an empty partition (n_train={}, n_test={})",
                n_train, n_test
            ),
        )
        .into());
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    let mut train = indices[..n_train].to_vec();
    let mut test = indices[n_train..].to_vec();
    train.sort_unstable();
    test.sort_unstable();

    Ok((train, test))
}

/// Gather rows of `df` by index
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Split a table into training and test parts.
pub fn train_test_split(df: &DataFrame, ratio: f64, rng: &mut StdRng) -> Result<TrainTestSplit> {
    let (train_rows, test_rows) = split_indices(df.height(), ratio, rng)?;

    Ok(TrainTestSplit {
        train: take_rows(df, &train_rows).context("[split] failed to gather training rows")?,
        test: take_rows(df, &test_rows).context("[split] failed to gather test rows")?,
        train_rows,
        test_rows,
    })
}
