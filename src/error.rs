//! Error types shared by the pipeline stages.
//!
//! Every fatal condition carries the [`Stage`] it was raised in so the CLI can
//! tell the user which step of the run stopped.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline stage identifiers used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Clean,
    Split,
    Select,
    Train,
    Evaluate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Clean => "clean",
            Stage::Split => "split",
            Stage::Select => "select",
            Stage::Train => "train",
            Stage::Evaluate => "evaluate",
        };
        write!(f, "{}", name)
    }
}

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input file could not be found, opened or parsed.
    #[error("[{stage}] failed to load {}: {message}", path.display())]
    Load {
        stage: Stage,
        path: PathBuf,
        message: String,
    },

    /// The data does not have the shape the stage requires
    /// (missing column, all-null target, empty partition, ...).
    #[error("[{stage}] {message}")]
    Shape { stage: Stage, message: String },

    /// A cross-validation fold failed and the fold policy is `fail`.
    #[error("[train] fold {fold} failed for {model}: {reason}")]
    FoldFailed {
        model: String,
        fold: usize,
        reason: String,
    },

    /// Every fold of every hyperparameter candidate failed.
    #[error("[train] all {folds} cross-validation folds failed for {model} ({candidates} candidate(s))")]
    AllFoldsFailed {
        model: String,
        folds: usize,
        candidates: usize,
    },

    /// Prediction and label vectors disagree in length.
    #[error("[evaluate] prediction/label length mismatch: {predictions} predictions vs {labels} labels")]
    LengthMismatch { predictions: usize, labels: usize },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn shape(stage: Stage, message: impl Into<String>) -> Self {
        PipelineError::Shape {
            stage,
            message: message.into(),
        }
    }

    /// Stage the error was raised in, when it belongs to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Load { stage, .. } | PipelineError::Shape { stage, .. } => Some(*stage),
            PipelineError::FoldFailed { .. } | PipelineError::AllFoldsFailed { .. } => {
                Some(Stage::Train)
            }
            PipelineError::LengthMismatch { .. } => Some(Stage::Evaluate),
            PipelineError::Config(_) => None,
        }
    }
}
