//! CLI commands module.

mod config;
mod model;
mod predict;
mod segment;
mod util;

pub use config::ConfigCommand;
pub use model::ModelCommand;
pub use predict::PredictCommand;
pub use segment::SegmentCommand;

// Re-export utils for use in commands
pub(crate) use util::*;
