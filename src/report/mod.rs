//! Run report: console tables and the JSON document

pub mod models;
pub mod run_report;
pub mod summary;

pub use models::*;
pub use run_report::*;
pub use summary::*;
