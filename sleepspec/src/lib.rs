//! Sleep-deprivation detection from voice recordings.
//!
//! # Architecture
//!
//! A recording is scored in four stages:
//!
//! 1. [`Preprocessor::preprocess`]: audio file -> fixed-length [`Segment`]s
//! 2. [`SegmentProcessor::process_all`]: segments -> time-averaged STRF
//!    [`FeatureTensor`]s, computed on a bounded worker pool
//! 3. [`SegmentClassifier::classify`]: feature -> [`SegmentClassification`]
//!    via a PCA projection and a linear SVM
//! 4. [`aggregate`]: per-segment votes -> one [`Verdict`]
//!
//! [`Pipeline`] wires the stages together.
//!
//! # Labels
//!
//! ```text
//! SD  (1)  sleep-deprived
//! NSD (0)  not sleep-deprived
//! ```
//!
//! # Fused Confidence
//!
//! The verdict's score is on a 0-100 scale. See [`aggregate`] for the
//! exact rule. Scores of 80 and above read as highly sleep-deprived, 50 and
//! above as moderately sleep-deprived.
//!
//! # External Collaborators
//!
//! The STRF transform itself is supplied through [`StrfTransform`]. Audio
//! decoding, resampling and noise reduction live behind [`Preprocessor`];
//! [`WavSegmenter`] covers WAV files and [`PcmSegmenter`] raw PCM16 input.

mod aggregator;
mod classifier;
mod error;
pub mod model;
mod pipeline;
pub mod preprocess;
mod processor;
pub mod record;
pub mod strf;
mod verdict;

pub use aggregator::{aggregate, fused_score};
pub use classifier::{SegmentClassifier, normalize_max_abs};
pub use error::{Result, SleepSpecError};
pub use model::{ClassifierModel, DecisionModel, LinearSvm, ModelSummary, Pca, Platt, Projector};
pub use pipeline::{Pipeline, PipelineConfig, classify_features};
pub use preprocess::{
    PcmSegmenter, PreprocessedAudio, Preprocessor, Segment, SegmenterConfig, WavSegmenter,
};
pub use processor::{ProcessorConfig, SegmentProcessor};
pub use record::FeatureRecord;
pub use strf::{FeatureTensor, FeatureWorker, StrfConfig, StrfTransform, TransformError};
pub use verdict::{Label, SegmentClassification, Severity, Verdict};
