//! Test-set evaluation: confusion matrix and derived metrics

use anyhow::Result;
use polars::prelude::*;
use serde::{Serialize, Serializer};

use super::cv::roc_auc;
use super::target::target_labels;
use super::trainer::TrainedModel;
use crate::error::PipelineError;

/// Binary confusion matrix with 1 as the positive label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(predicted: &[u8], actual: &[u8]) -> Result<Self, PipelineError> {
        if predicted.len() != actual.len() {
            return Err(PipelineError::LengthMismatch {
                predictions: predicted.len(),
                labels: actual.len(),
            });
        }

        let mut cm = ConfusionMatrix::default();
        for (&p, &a) in predicted.iter().zip(actual) {
            match (p == 1, a == 1) {
                (true, true) => cm.true_positive += 1,
                (true, false) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_negative += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// Ratio that is NaN when the denominator is zero
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// JSON has no NaN; undefined metrics serialize as null
fn nan_as_null<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_nan() {
        serializer.serialize_none()
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Classification metrics; undefined ratios are NaN
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    #[serde(serialize_with = "nan_as_null")]
    pub accuracy: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub sensitivity: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub specificity: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub precision: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub negative_predictive_value: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub balanced_accuracy: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub f1: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub kappa: f64,
    #[serde(serialize_with = "nan_as_null")]
    pub auc: f64,
}

impl Metrics {
    /// Metrics from a confusion matrix; `auc` comes from the scores
    pub fn from_confusion(cm: &ConfusionMatrix, auc: Option<f64>) -> Self {
        let tp = cm.true_positive as f64;
        let fp = cm.false_positive as f64;
        let tn = cm.true_negative as f64;
        let fn_ = cm.false_negative as f64;
        let n = cm.total() as f64;

        let accuracy = ratio(tp + tn, n);
        let sensitivity = ratio(tp, tp + fn_);
        let specificity = ratio(tn, tn + fp);
        let precision = ratio(tp, tp + fp);

        // chance agreement from the marginals
        let expected = ratio((tp + fp) * (tp + fn_) + (tn + fn_) * (tn + fp), n * n);

        Self {
            accuracy,
            sensitivity,
            specificity,
            precision,
            negative_predictive_value: ratio(tn, tn + fn_),
            balanced_accuracy: (sensitivity + specificity) / 2.0,
            f1: ratio(2.0 * tp, 2.0 * tp + fp + fn_),
            kappa: ratio(accuracy - expected, 1.0 - expected),
            auc: auc.unwrap_or(f64::NAN),
        }
    }
}

/// Render a metric, `NA` when undefined
pub fn format_metric(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.4}", value)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub model: String,
    pub confusion: ConfusionMatrix,
    pub metrics: Metrics,
    pub threshold: f64,
}

/// Score a trained model on the test table
pub fn evaluate(trained: &TrainedModel, test: &DataFrame, target: &str, threshold: f64) -> Result<Evaluation> {
    let actual = target_labels(test, target)?;
    let scores = trained.predict_proba(test)?;
    let predicted: Vec<u8> = scores.iter().map(|&p| u8::from(p >= threshold)).collect();

    let confusion = ConfusionMatrix::from_predictions(&predicted, &actual)?;
    let metrics = Metrics::from_confusion(&confusion, roc_auc(&scores, &actual));

    Ok(Evaluation {
        model: trained.name(),
        confusion,
        metrics,
        threshold,
    })
}
