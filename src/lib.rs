//! pisarisk: survey-based classifiers for students at risk of failing math
//!
//! The pipeline loads the student questionnaire, cleans it, splits it with a
//! fixed seed, selects features with Boruta and compares four model families
//! with and without SMOTE oversampling under stratified cross-validation.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod utils;
