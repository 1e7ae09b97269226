//! Missing value analysis and the column drop policy

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Which columns the missing-value step removes.
///
/// The survey analysis documents a 5% acceptability rule but only ever drops
/// columns that are entirely empty. Both readings are available; the default
/// reproduces what was actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Drop only columns with 100% missing values
    #[default]
    FullyMissing,
    /// Drop columns whose missing ratio is strictly above the threshold
    Threshold(f64),
}

impl MissingPolicy {
    /// Whether a column with this missing ratio is dropped
    pub fn drops(&self, ratio: f64) -> bool {
        match self {
            MissingPolicy::FullyMissing => ratio >= 1.0,
            MissingPolicy::Threshold(t) => ratio > *t,
        }
    }
}

impl std::fmt::Display for MissingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingPolicy::FullyMissing => write!(f, "drop 100% missing"),
            MissingPolicy::Threshold(t) => write!(f, "drop >{:.1}% missing", t * 100.0),
        }
    }
}

/// Analyze missing values in the dataset.
///
/// Returns `(column, missing_ratio)` pairs sorted by ratio descending.
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / rows))
        .collect();

    // Sort by missing ratio descending
    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(missing_ratios)
}

/// Get features to drop under the given policy. The target is never dropped.
pub fn get_features_to_drop(
    missing_ratios: &[(String, f64)],
    policy: MissingPolicy,
    target_column: &str,
) -> Vec<String> {
    missing_ratios
        .iter()
        .filter(|(name, ratio)| policy.drops(*ratio) && name != target_column)
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fully_missing_policy_boundary() {
        let policy = MissingPolicy::FullyMissing;
        assert!(policy.drops(1.0));
        assert!(!policy.drops(0.99));
    }

    #[test]
    fn test_default_policy_is_fully_missing() {
        assert_eq!(MissingPolicy::default(), MissingPolicy::FullyMissing);
    }

    #[test]
    fn test_threshold_policy_is_strict() {
        let policy = MissingPolicy::Threshold(0.05);
        assert!(!policy.drops(0.05));
        assert!(policy.drops(0.051));
    }

    #[test]
    fn test_policy_serde_round_trip_names() {
        let json = serde_json::to_string(&MissingPolicy::Threshold(0.05)).unwrap();
        assert_eq!(json, r#"{"threshold":0.05}"#);
        let parsed: MissingPolicy = serde_json::from_str(r#""fully_missing""#).unwrap();
        assert_eq!(parsed, MissingPolicy::FullyMissing);
    }
}
