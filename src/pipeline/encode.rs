//! Design-matrix construction from the cleaned table
//!
//! Categorical columns become one-hot blocks (optionally dropping the first
//! level as the reference), numeric columns pass through. Levels are learned
//! from the training split; unseen levels encode as an all-zero block.

use std::cmp::Ordering;

use anyhow::{Context, Result};
use faer::Mat;
use polars::prelude::*;
use serde::Serialize;

use super::target::{column_to_string_vec, target_labels};

/// How one source column is laid out in the design matrix
#[derive(Debug, Clone, Serialize)]
pub enum FeatureKind {
    Categorical { levels: Vec<String> },
    Numeric,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodedFeature {
    pub name: String,
    pub kind: FeatureKind,
}

/// Learned encoding for a set of predictor columns
#[derive(Debug, Clone, Serialize)]
pub struct CategoricalEncoder {
    features: Vec<EncodedFeature>,
    drop_first: bool,
}

/// Numeric design matrix plus labels
#[derive(Debug, Clone)]
pub struct EncodedData {
    pub x: Mat<f64>,
    pub y: Vec<u8>,
    /// Design-matrix column names (`feature=level` for one-hot columns)
    pub columns: Vec<String>,
    /// Index of the source feature for every design-matrix column
    pub groups: Vec<usize>,
}

impl EncodedData {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    /// Copy of the selected rows
    pub fn select_rows(&self, rows: &[usize]) -> EncodedData {
        EncodedData {
            x: gather_rows(&self.x, rows),
            y: rows.iter().map(|&r| self.y[r]).collect(),
            columns: self.columns.clone(),
            groups: self.groups.clone(),
        }
    }

    /// Number of positive labels
    pub fn events(&self) -> usize {
        self.y.iter().filter(|&&v| v == 1).count()
    }
}

/// Copy rows of a matrix in the given order
pub fn gather_rows(x: &Mat<f64>, rows: &[usize]) -> Mat<f64> {
    Mat::from_fn(rows.len(), x.ncols(), |i, j| x[(rows[i], j)])
}

/// Order category labels numerically when both parse, as text otherwise
fn compare_levels(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl CategoricalEncoder {
    /// Learn levels for `features` from `df`. String columns are categorical,
    /// every other dtype is numeric.
    pub fn fit(df: &DataFrame, features: &[String], drop_first: bool) -> Result<Self> {
        let mut encoded = Vec::with_capacity(features.len());

        for name in features {
            let col = df
                .column(name)
                .with_context(|| format!("Feature column '{}' not found", name))?;

            let kind = if col.dtype() == &DataType::String {
                let mut levels: Vec<String> = column_to_string_vec(col)?.into_iter().flatten().collect();
                levels.sort_by(|a, b| compare_levels(a, b));
                levels.dedup();
                FeatureKind::Categorical { levels }
            } else {
                FeatureKind::Numeric
            };

            encoded.push(EncodedFeature {
                name: name.clone(),
                kind,
            });
        }

        Ok(Self {
            features: encoded,
            drop_first,
        })
    }

    pub fn features(&self) -> &[EncodedFeature] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    /// Levels that get their own column for a categorical feature
    fn encoded_levels<'a>(&self, levels: &'a [String]) -> &'a [String] {
        if self.drop_first && !levels.is_empty() {
            &levels[1..]
        } else {
            levels
        }
    }

    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for feature in &self.features {
            match &feature.kind {
                FeatureKind::Categorical { levels } => {
                    for level in self.encoded_levels(levels) {
                        names.push(format!("{}={}", feature.name, level));
                    }
                }
                FeatureKind::Numeric => names.push(feature.name.clone()),
            }
        }
        names
    }

    /// Source feature index per design-matrix column
    pub fn groups(&self) -> Vec<usize> {
        let mut groups = Vec::new();
        for (idx, feature) in self.features.iter().enumerate() {
            let width = match &feature.kind {
                FeatureKind::Categorical { levels } => self.encoded_levels(levels).len(),
                FeatureKind::Numeric => 1,
            };
            groups.extend(std::iter::repeat(idx).take(width));
        }
        groups
    }

    pub fn n_columns(&self) -> usize {
        self.groups().len()
    }

    /// Build the design matrix for `df`
    pub fn transform(&self, df: &DataFrame) -> Result<Mat<f64>> {
        let n_rows = df.height();
        let mut x = Mat::<f64>::zeros(n_rows, self.n_columns());
        let mut offset = 0;

        for feature in &self.features {
            let col = df
                .column(&feature.name)
                .with_context(|| format!("Feature column '{}' not found", feature.name))?;

            match &feature.kind {
                FeatureKind::Categorical { levels } => {
                    let encoded = self.encoded_levels(levels);
                    let values = column_to_string_vec(col)?;
                    for (row, value) in values.iter().enumerate() {
                        let Some(value) = value else { continue };
                        if let Some(pos) = encoded.iter().position(|l| l == value) {
                            x[(row, offset + pos)] = 1.0;
                        }
                    }
                    offset += encoded.len();
                }
                FeatureKind::Numeric => {
                    let cast = col.cast(&DataType::Float64)?;
                    for (row, value) in cast.f64()?.into_iter().enumerate() {
                        x[(row, offset)] = value.unwrap_or(0.0);
                    }
                    offset += 1;
                }
            }
        }

        Ok(x)
    }

    /// Design matrix plus binarized labels
    pub fn encode(&self, df: &DataFrame, target: &str) -> Result<EncodedData> {
        Ok(EncodedData {
            x: self.transform(df)?,
            y: target_labels(df, target)?,
            columns: self.column_names(),
            groups: self.groups(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "ST01" => ["2", "10", "1", "2"],
            "AGE" => [15.0f64, 16.0, 15.5, 15.0],
            "fail" => [0u8, 1, 0, 1],
        }
        .unwrap()
    }

    #[test]
    fn test_levels_sorted_numerically() {
        let enc = CategoricalEncoder::fit(&frame(), &["ST01".to_string()], false).unwrap();
        assert_eq!(enc.column_names(), vec!["ST01=1", "ST01=2", "ST01=10"]);
    }

    #[test]
    fn test_drop_first_uses_reference_level() {
        let features = vec!["ST01".to_string(), "AGE".to_string()];
        let enc = CategoricalEncoder::fit(&frame(), &features, true).unwrap();
        assert_eq!(enc.column_names(), vec!["ST01=2", "ST01=10", "AGE"]);
        assert_eq!(enc.groups(), vec![0, 0, 1]);

        let data = enc.encode(&frame(), "fail").unwrap();
        assert_eq!(data.x.nrows(), 4);
        assert_eq!(data.x[(0, 0)], 1.0);
        assert_eq!(data.x[(1, 1)], 1.0);
        // reference level row is all zeros in its block
        assert_eq!(data.x[(2, 0)] + data.x[(2, 1)], 0.0);
        assert_eq!(data.x[(2, 2)], 15.5);
        assert_eq!(data.y, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_unseen_level_encodes_as_zeros() {
        let enc = CategoricalEncoder::fit(&frame(), &["ST01".to_string()], false).unwrap();
        let test = df! { "ST01" => ["7"] }.unwrap();
        let x = enc.transform(&test).unwrap();
        assert!((0..x.ncols()).all(|j| x[(0, j)] == 0.0));
    }
}
