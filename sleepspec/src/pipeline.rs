use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::aggregator::aggregate;
use crate::classifier::SegmentClassifier;
use crate::error::Result;
use crate::model::ClassifierModel;
use crate::preprocess::{Preprocessor, Segment};
use crate::processor::{ProcessorConfig, SegmentProcessor};
use crate::record::{FeatureRecord, clear_records, record_file_name};
use crate::strf::{FeatureTensor, FeatureWorker, StrfConfig, StrfTransform};
use crate::verdict::Verdict;

/// Configuration for [`Pipeline`].
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub processor: ProcessorConfig,
    pub strf: StrfConfig,
    /// When set, every extracted feature tensor is also written here as a
    /// [`FeatureRecord`]. Records from a previous recording are removed first.
    pub record_dir: Option<PathBuf>,
}

/// End-to-end recording classifier.
///
/// # Pipeline
///
/// 1. [`Preprocessor`]: audio file -> fixed-length segments
/// 2. [`SegmentProcessor`]: segments -> feature tensors, in parallel
/// 3. [`SegmentClassifier`]: feature tensor -> label, margin, probability
/// 4. [`aggregate`]: classifications -> [`Verdict`]
///
/// The model is shared read-only; a pipeline can serve many requests.
pub struct Pipeline {
    preprocessor: Box<dyn Preprocessor>,
    processor: SegmentProcessor,
    classifier: SegmentClassifier,
    record_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        preprocessor: Box<dyn Preprocessor>,
        transform: Arc<dyn StrfTransform>,
        model: Arc<ClassifierModel>,
        cfg: PipelineConfig,
    ) -> Result<Self> {
        let worker = FeatureWorker::with_config(transform, cfg.strf);
        Ok(Self {
            preprocessor,
            processor: SegmentProcessor::new(worker, cfg.processor)?,
            classifier: SegmentClassifier::new(model),
            record_dir: cfg.record_dir,
        })
    }

    /// Classifies the recording at `audio_path`.
    ///
    /// A recording too short to yield a single segment returns an
    /// unsuccessful verdict without running any extraction.
    pub fn classify(&self, audio_path: &Path) -> Result<Verdict> {
        let audio = self.preprocessor.preprocess(audio_path)?;
        info!(
            segments = audio.segments.len(),
            sample_rate = audio.sample_rate,
            "preprocessed {}",
            audio_path.display()
        );

        if audio.segments.is_empty() {
            info!("no segments: recording shorter than one segment window");
            return Ok(Verdict::empty());
        }

        let features = self.extract_features(&audio.segments, audio.sample_rate)?;
        info!("feature extraction complete");

        if let Some(dir) = &self.record_dir {
            save_records(dir, &features, audio.sample_rate)?;
        }

        self.classify_features(&features)
    }

    /// Extracts one feature tensor per segment, preserving order.
    pub fn extract_features(
        &self,
        segments: &[Segment],
        sample_rate: u32,
    ) -> Result<Vec<FeatureTensor>> {
        self.processor.process_all(segments, sample_rate)
    }

    /// Classifies already extracted features and fuses the result.
    pub fn classify_features(&self, features: &[FeatureTensor]) -> Result<Verdict> {
        classify_features(&self.classifier, features)
    }

    pub fn classifier(&self) -> &SegmentClassifier {
        &self.classifier
    }
}

/// Classifies `features` with `classifier` and aggregates the results.
/// No features means an unsuccessful verdict.
pub fn classify_features(
    classifier: &SegmentClassifier,
    features: &[FeatureTensor],
) -> Result<Verdict> {
    if features.is_empty() {
        return Ok(Verdict::empty());
    }
    let classifications = classifier.classify_all(features)?;
    Ok(aggregate(&classifications))
}

fn save_records(dir: &Path, features: &[FeatureTensor], sample_rate: u32) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    clear_records(dir)?;
    for (i, tensor) in features.iter().enumerate() {
        FeatureRecord::new(tensor.clone(), sample_rate).write(dir.join(record_file_name(i)))?;
    }
    info!(count = features.len(), "saved feature records to {}", dir.display());
    Ok(())
}
