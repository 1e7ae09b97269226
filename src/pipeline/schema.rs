//! Typed per-column cleaning schema
//!
//! Instead of blanket "fill with 0, cast everything" mutation, every column
//! gets an explicit role and the cleaner applies the transformation that
//! role prescribes.

use std::collections::HashSet;

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;
use tracing::warn;

use super::missing::{analyze_missing_values, get_features_to_drop, MissingPolicy};
use super::target::column_to_string_vec;

/// Why a column was removed before modelling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExclusionReason {
    /// Dropped by the missing-value policy
    Missing { ratio: f64 },
    /// Named in the manual exclusion list
    Manual,
}

/// Role of a column in the cleaned table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "role")]
pub enum ColumnRole {
    Target,
    /// Unordered category; nulls become the sentinel label
    Categorical,
    /// Continuous value; nulls become the column mean
    Numeric,
    Excluded { reason: ExclusionReason },
}

/// Column roles in input order
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleaningSchema {
    columns: Vec<(String, ColumnRole)>,
}

impl CleaningSchema {
    /// Build the schema from the missing-value analysis, the drop policy and
    /// the manual exclusion list. Columns named in `numeric` are treated as
    /// continuous; every other predictor is categorical.
    pub fn infer(
        df: &DataFrame,
        target: &str,
        policy: MissingPolicy,
        manual_exclusions: &[String],
        numeric: &[String],
    ) -> Result<Self> {
        let ratios = analyze_missing_values(df)?;
        let too_sparse = get_features_to_drop(&ratios, policy, target);

        let columns = df
            .get_column_names()
            .iter()
            .map(|name| {
                let name = name.to_string();
                let ratio = ratios
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|(_, r)| *r)
                    .unwrap_or(0.0);

                let role = if name == target {
                    ColumnRole::Target
                } else if manual_exclusions.contains(&name) {
                    ColumnRole::Excluded {
                        reason: ExclusionReason::Manual,
                    }
                } else if too_sparse.contains(&name) {
                    ColumnRole::Excluded {
                        reason: ExclusionReason::Missing { ratio },
                    }
                } else if numeric.contains(&name) {
                    ColumnRole::Numeric
                } else {
                    ColumnRole::Categorical
                };
                (name, role)
            })
            .collect();

        Ok(Self { columns })
    }

    pub fn role(&self, column: &str) -> Option<&ColumnRole> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, role)| role)
    }

    pub fn columns(&self) -> &[(String, ColumnRole)] {
        &self.columns
    }

    /// Categorical and numeric columns, in input order
    pub fn predictors(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, role)| matches!(role, ColumnRole::Categorical | ColumnRole::Numeric))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn excluded(&self) -> Vec<(String, ExclusionReason)> {
        self.columns
            .iter()
            .filter_map(|(name, role)| match role {
                ColumnRole::Excluded { reason } => Some((name.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Bookkeeping from [`apply_schema`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImputationStats {
    pub imputed_cells: usize,
    /// Columns where the configured sentinel was already an observed label,
    /// with the label used instead
    pub sentinel_overrides: Vec<(String, String)>,
}

/// Pick a sentinel label that no observed value uses
pub fn unique_sentinel(sentinel: &str, observed: &HashSet<&str>) -> String {
    if !observed.contains(sentinel) {
        return sentinel.to_string();
    }
    let mut candidate = format!("{}_missing", sentinel);
    while observed.contains(candidate.as_str()) {
        candidate.push('_');
    }
    candidate
}

/// Impute and cast every predictor according to its role.
///
/// Excluded columns must already be gone; the target column is passed
/// through unchanged.
pub fn apply_schema(
    df: &DataFrame,
    schema: &CleaningSchema,
    sentinel: &str,
) -> Result<(DataFrame, ImputationStats)> {
    let mut stats = ImputationStats::default();
    let mut columns: Vec<Column> = Vec::with_capacity(df.width());

    for col in df.get_columns() {
        let name = col.name().to_string();
        match schema.role(&name) {
            Some(ColumnRole::Categorical) => {
                let values = column_to_string_vec(col)?;
                let observed: HashSet<&str> = values.iter().flatten().map(|s| s.as_str()).collect();
                let label = unique_sentinel(sentinel, &observed);
                if label != sentinel {
                    warn!(
                        column = %name,
                        "sentinel '{}' is an observed category, using '{}'",
                        sentinel,
                        label
                    );
                    stats.sentinel_overrides.push((name.clone(), label.clone()));
                }

                stats.imputed_cells += col.null_count();
                let filled: Vec<String> = values
                    .into_iter()
                    .map(|v| v.unwrap_or_else(|| label.clone()))
                    .collect();
                columns.push(Column::new(name.as_str().into(), filled));
            }
            Some(ColumnRole::Numeric) => {
                let cast = col.cast(&DataType::Float64)?;
                let values: Vec<Option<f64>> = cast.f64()?.into_iter().collect();
                let present: Vec<f64> = values.iter().flatten().copied().collect();
                let mean = if present.is_empty() {
                    0.0
                } else {
                    present.iter().sum::<f64>() / present.len() as f64
                };

                stats.imputed_cells += col.null_count();
                let filled: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(mean)).collect();
                columns.push(Column::new(name.as_str().into(), filled));
            }
            Some(ColumnRole::Target) => columns.push(col.clone()),
            Some(ColumnRole::Excluded { .. }) | None => {}
        }
    }

    Ok((DataFrame::new(columns)?, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sentinel_avoids_collision() {
        let observed: HashSet<&str> = ["0", "1", "0_missing"].into_iter().collect();
        assert_eq!(unique_sentinel("0", &observed), "0_missing_");

        let observed: HashSet<&str> = ["1", "2"].into_iter().collect();
        assert_eq!(unique_sentinel("0", &observed), "0");
    }

    #[test]
    fn test_infer_assigns_roles() {
        let df = df! {
            "ST01" => [Some(1i32), None, Some(2), Some(1)],
            "ST02" => [None::<i32>, None, None, None],
            "ST03" => [1i32, 2, 3, 4],
            "AGE" => [15.2f64, 15.5, 16.0, 15.9],
            "fail" => [1i32, 2, 1, 2],
        }
        .unwrap();

        let schema = CleaningSchema::infer(
            &df,
            "fail",
            MissingPolicy::FullyMissing,
            &["ST03".to_string()],
            &["AGE".to_string()],
        )
        .unwrap();

        assert_eq!(schema.role("ST01"), Some(&ColumnRole::Categorical));
        assert!(matches!(
            schema.role("ST02"),
            Some(ColumnRole::Excluded {
                reason: ExclusionReason::Missing { .. }
            })
        ));
        assert_eq!(
            schema.role("ST03"),
            Some(&ColumnRole::Excluded {
                reason: ExclusionReason::Manual
            })
        );
        assert_eq!(schema.role("AGE"), Some(&ColumnRole::Numeric));
        assert_eq!(schema.role("fail"), Some(&ColumnRole::Target));
        assert_eq!(schema.predictors(), vec!["ST01", "AGE"]);
    }

    #[test]
    fn test_apply_schema_fills_nulls() {
        let df = df! {
            "ST01" => [Some(1i32), None, Some(2)],
            "AGE" => [Some(10.0f64), None, Some(20.0)],
            "fail" => [1i32, 2, 1],
        }
        .unwrap();
        let schema = CleaningSchema::infer(
            &df,
            "fail",
            MissingPolicy::FullyMissing,
            &[],
            &["AGE".to_string()],
        )
        .unwrap();

        let (out, stats) = apply_schema(&df, &schema, "0").unwrap();
        assert_eq!(stats.imputed_cells, 2);

        let st01: Vec<Option<&str>> = out.column("ST01").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(st01, vec![Some("1"), Some("0"), Some("2")]);

        let age: Vec<Option<f64>> = out.column("AGE").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(age, vec![Some(10.0), Some(15.0), Some(20.0)]);
    }
}
