use thiserror::Error;

/// Errors returned by sleepspec operations.
///
/// An empty recording is not an error: it surfaces as an unsuccessful
/// [`Verdict`](crate::Verdict).
#[derive(Debug, Error)]
pub enum SleepSpecError {
    #[error("segment {index}: feature computation failed: {reason}")]
    FeatureComputation { index: usize, reason: String },

    #[error("feature mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("model error: {0}")]
    Model(String),

    #[error("record error: {0}")]
    Record(String),

    #[error("preprocess error: {0}")]
    Preprocess(String),

    #[error("worker pool: {0}")]
    Pool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SleepSpecError>;
