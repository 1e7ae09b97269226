//! Pipeline stages: load, clean, split, select, train, evaluate

pub mod cleaner;
pub mod config;
pub mod cv;
pub mod encode;
pub mod evaluate;
pub mod loader;
pub mod missing;
pub mod model;
pub mod resample;
pub mod schema;
pub mod selection;
pub mod split;
pub mod target;
pub mod trainer;

pub use cleaner::*;
pub use config::PipelineConfig;
pub use cv::{grid_search, roc_auc, Fold, FoldPolicy, GridSearchResult, StratifiedKFold};
pub use encode::{CategoricalEncoder, EncodedData};
pub use evaluate::*;
pub use loader::*;
pub use missing::*;
pub use model::{FitError, FittedModel, Hyperparameters, ModelFamily};
pub use resample::Smote;
pub use schema::*;
pub use selection::{select_features, BorutaConfig, Decision, FeatureDecision, SelectionResult};
pub use split::*;
pub use target::*;
pub use trainer::*;
