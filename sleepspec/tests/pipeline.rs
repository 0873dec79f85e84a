use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array4;
use num_complex::Complex32;
use sleepspec::record::list_records;
use sleepspec::{
    ClassifierModel, FeatureRecord, Label, PcmSegmenter, Pipeline, PipelineConfig,
    ProcessorConfig, SegmenterConfig, SleepSpecError, StrfConfig, StrfTransform, TransformError,
    classify_features,
};

const SAMPLE_RATE: u32 = 100;
const FEATURES: usize = 8 * 22;

/// Half of the tensor is 1.0, the other half is the mean absolute sample
/// level of the segment. A level of exactly 1.0 fails.
struct LevelTransform {
    calls: AtomicUsize,
}

impl LevelTransform {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl StrfTransform for LevelTransform {
    fn transform(
        &self,
        samples: &[f32],
        _sample_rate: u32,
        cfg: &StrfConfig,
    ) -> Result<Array4<Complex32>, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let level = samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32;
        if level >= 0.99 {
            return Err("clipped input".into());
        }
        let rates = cfg.rates.len();
        Ok(Array4::from_shape_fn(
            (3, 1, cfg.scales.len(), rates),
            |(_, _, s, r)| {
                if (s * rates + r) < FEATURES / 2 {
                    Complex32::new(0.0, 1.0)
                } else {
                    Complex32::new(level, 0.0)
                }
            },
        ))
    }
}

/// One component averaging all features; SD when the average exceeds 0.75.
fn model() -> Arc<ClassifierModel> {
    let row = vec![1.0 / FEATURES as f32; FEATURES];
    let json = serde_json::json!({
        "pca": { "components": [row] },
        "svm": {
            "classes": [0, 1],
            "coef": [1.0],
            "intercept": -0.75,
            "platt": { "a": -8.0, "b": 0.0 }
        }
    });
    Arc::new(ClassifierModel::from_json(json.to_string().as_bytes()).unwrap())
}

fn pipeline(transform: Arc<LevelTransform>, record_dir: Option<&Path>) -> Pipeline {
    Pipeline::new(
        Box::new(PcmSegmenter::new(SegmenterConfig {
            sample_rate: SAMPLE_RATE,
            segment_seconds: 1,
        })),
        transform,
        model(),
        PipelineConfig {
            processor: ProcessorConfig { workers: 3 },
            record_dir: record_dir.map(Path::to_path_buf),
            ..PipelineConfig::default()
        },
    )
    .unwrap()
}

/// Writes PCM16 with one constant-amplitude window per level, plus a short tail.
fn write_recording(dir: &Path, levels: &[f32]) -> std::path::PathBuf {
    let window = SAMPLE_RATE as usize;
    let mut pcm = Vec::new();
    for &level in levels {
        let s = (level * 32767.0) as i16;
        for _ in 0..window {
            pcm.extend_from_slice(&s.to_le_bytes());
        }
    }
    for _ in 0..window / 2 {
        pcm.extend_from_slice(&1000i16.to_le_bytes());
    }
    let path = dir.join("recording.pcm");
    std::fs::write(&path, pcm).unwrap();
    path
}

#[test]
fn classifies_recording_in_segment_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_recording(dir.path(), &[0.9, 0.9, 0.1, 0.9, 0.2]);
    let transform = LevelTransform::new();

    let verdict = pipeline(transform.clone(), None).classify(&path).unwrap();

    assert!(verdict.success);
    assert_eq!(
        verdict.labels,
        vec![Label::Sd, Label::Sd, Label::Nsd, Label::Sd, Label::Nsd]
    );
    assert_eq!(verdict.confidences.len(), verdict.labels.len());
    assert_eq!(verdict.sd_count, 3);
    assert_eq!(verdict.nsd_count, 2);
    assert_eq!(verdict.label, Label::Sd);
    assert!(
        (verdict.score - (50.0 + verdict.avg_sd_probability * 50.0)).abs() < 1e-9,
        "SD majority score uses the SD average only"
    );
    assert!(verdict.confidences.iter().all(|&p| p > 0.5));
    // The short tail is dropped, not padded.
    assert_eq!(transform.calls.load(Ordering::SeqCst), 5);
}

#[test]
fn recording_shorter_than_one_window() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_recording(dir.path(), &[]);
    let transform = LevelTransform::new();

    let verdict = pipeline(transform.clone(), None).classify(&path).unwrap();

    assert!(!verdict.success);
    assert_eq!(verdict.score, 0.0);
    assert!(verdict.labels.is_empty());
    assert!(verdict.confidences.is_empty());
    assert_eq!(transform.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn transform_failure_is_an_error_not_a_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_recording(dir.path(), &[0.1, 1.0, 0.1]);

    let err = pipeline(LevelTransform::new(), None)
        .classify(&path)
        .unwrap_err();

    match err {
        SleepSpecError::FeatureComputation { index, .. } => assert_eq!(index, 1),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn cached_records_reproduce_the_verdict() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("features");
    let path = write_recording(dir.path(), &[0.1, 0.9, 0.1, 0.9]);
    let pipeline = pipeline(LevelTransform::new(), Some(&records));

    let first = pipeline.classify(&path).unwrap();
    // Tie: 2 SD vs 2 NSD resolves to NSD.
    assert_eq!(first.label, Label::Nsd);

    let paths = list_records(&records).unwrap();
    assert_eq!(paths.len(), 4);
    let features: Vec<_> = paths
        .iter()
        .map(|p| {
            let rec = FeatureRecord::read(p).unwrap();
            assert_eq!(rec.fs, SAMPLE_RATE);
            rec.strf
        })
        .collect();

    let second = classify_features(pipeline.classifier(), &features).unwrap();
    assert_eq!(first, second);
}

#[test]
fn record_cache_holds_only_the_latest_recording() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("features");
    let pipeline = pipeline(LevelTransform::new(), Some(&records));

    let long = write_recording(dir.path(), &[0.9, 0.9, 0.9, 0.9]);
    assert_eq!(pipeline.classify(&long).unwrap().labels.len(), 4);

    let short = write_recording(dir.path(), &[0.1, 0.1]);
    let fresh = pipeline.classify(&short).unwrap();
    assert_eq!(fresh.labels, vec![Label::Nsd, Label::Nsd]);

    let paths = list_records(&records).unwrap();
    assert_eq!(paths.len(), 2);
    let features: Vec<_> = paths
        .iter()
        .map(|p| FeatureRecord::read(p).unwrap().strf)
        .collect();
    let cached = classify_features(pipeline.classifier(), &features).unwrap();
    assert_eq!(cached, fresh);
}

#[test]
fn classification_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_recording(dir.path(), &[0.9, 0.1, 0.2]);
    let pipeline = pipeline(LevelTransform::new(), None);

    let a = pipeline.classify(&path).unwrap();
    let b = pipeline.classify(&path).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.label, Label::Nsd);
    assert!((a.score - a.avg_nsd_probability * 50.0).abs() < 1e-9);
}

#[test]
fn extract_features_matches_segment_count() {
    let pipeline = pipeline(LevelTransform::new(), None);
    let segments: Vec<_> = (0..7)
        .map(|i| sleepspec::Segment::new(i, vec![i as f32 / 10.0; 10]))
        .collect();

    let features = pipeline.extract_features(&segments, SAMPLE_RATE).unwrap();
    assert_eq!(features.len(), 7);
    for (i, f) in features.iter().enumerate() {
        let level = f.as_array()[[0, 7, 21]];
        assert!((level - i as f32 / 10.0).abs() < 1e-6);
    }
    assert!(pipeline.extract_features(&[], SAMPLE_RATE).unwrap().is_empty());
}
