//! Console helpers: spinners, progress bars and styled output

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
