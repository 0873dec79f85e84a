//! Fan-out/fan-in of feature extraction over a bounded worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel;
use tracing::{debug, warn};

use crate::error::{Result, SleepSpecError};
use crate::preprocess::Segment;
use crate::strf::{FeatureTensor, FeatureWorker};

/// Configuration for [`SegmentProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Number of pool threads (default: 6). Zero is treated as 1.
    pub workers: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self { workers: 6 }
    }
}

/// Runs a [`FeatureWorker`] over many segments in parallel.
///
/// # Ordering
///
/// Every task is tagged with its position in the input slice when it is
/// spawned. Results arrive over a channel in completion order and are
/// written back into slots keyed by that tag, so `output[i]` always belongs
/// to `segments[i]`.
///
/// # Failure
///
/// The first failing segment fails the whole batch. Tasks that have not
/// started yet when a failure is observed are skipped.
pub struct SegmentProcessor {
    worker: Arc<FeatureWorker>,
    pool: rayon::ThreadPool,
    workers: usize,
}

impl SegmentProcessor {
    pub fn new(worker: FeatureWorker, cfg: ProcessorConfig) -> Result<Self> {
        let workers = cfg.workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("strf-worker-{i}"))
            .build()
            .map_err(|e| SleepSpecError::Pool(e.to_string()))?;
        Ok(Self {
            worker: Arc::new(worker),
            pool,
            workers,
        })
    }

    /// Number of pool threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn worker(&self) -> &FeatureWorker {
        &self.worker
    }

    /// Extracts one feature tensor per segment, in input order.
    /// Blocks until every task has finished or been skipped.
    pub fn process_all(&self, segments: &[Segment], sample_rate: u32) -> Result<Vec<FeatureTensor>> {
        let n = segments.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        debug!(segments = n, workers = self.workers, "dispatching feature extraction");

        let (tx, rx) = channel::bounded::<(usize, Result<FeatureTensor>)>(n);
        let abort = AtomicBool::new(false);

        self.pool.scope(|s| {
            for (tag, segment) in segments.iter().enumerate() {
                let tx = tx.clone();
                let abort = &abort;
                let worker = &self.worker;
                s.spawn(move |_| {
                    if abort.load(Ordering::Relaxed) {
                        return;
                    }
                    let result = worker.extract(segment, sample_rate);
                    if result.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }
                    // Capacity is n, so this never blocks.
                    let _ = tx.send((tag, result));
                });
            }
        });
        drop(tx);

        let mut slots: Vec<Option<FeatureTensor>> = vec![None; n];
        let mut failure: Option<SleepSpecError> = None;
        for (tag, result) in rx.iter() {
            match result {
                Ok(tensor) => slots[tag] = Some(tensor),
                Err(e) => {
                    warn!("feature extraction failed: {e}");
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(tag, slot)| {
                slot.ok_or_else(|| {
                    SleepSpecError::Pool(format!("no result for segment {}", segments[tag].index))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use ndarray::Array4;
    use num_complex::Complex32;

    use super::*;
    use crate::strf::{StrfConfig, StrfTransform, TransformError};

    /// Encodes the first sample of each segment into every output element and
    /// sleeps longer for earlier segments so they finish last.
    struct TaggingTransform {
        total: usize,
        calls: AtomicUsize,
    }

    impl StrfTransform for TaggingTransform {
        fn transform(
            &self,
            samples: &[f32],
            _sample_rate: u32,
            cfg: &StrfConfig,
        ) -> std::result::Result<Array4<Complex32>, TransformError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let id = samples[0];
            let delay = (self.total as u64 - id as u64) * 5;
            std::thread::sleep(Duration::from_millis(delay));
            Ok(Array4::from_elem(
                (1, 2, cfg.scales.len(), cfg.rates.len()),
                Complex32::new(id, 0.0),
            ))
        }
    }

    struct FailAt(f32);

    impl StrfTransform for FailAt {
        fn transform(
            &self,
            samples: &[f32],
            _sample_rate: u32,
            cfg: &StrfConfig,
        ) -> std::result::Result<Array4<Complex32>, TransformError> {
            if samples[0] == self.0 {
                return Err("bad segment".into());
            }
            Ok(Array4::zeros((1, 1, cfg.scales.len(), cfg.rates.len())))
        }
    }

    /// Fails on its first call, succeeds afterwards.
    struct FailFirst {
        calls: AtomicUsize,
    }

    impl StrfTransform for FailFirst {
        fn transform(
            &self,
            _samples: &[f32],
            _sample_rate: u32,
            cfg: &StrfConfig,
        ) -> std::result::Result<Array4<Complex32>, TransformError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("first call fails".into());
            }
            Ok(Array4::zeros((1, 1, cfg.scales.len(), cfg.rates.len())))
        }
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n).map(|i| Segment::new(i, vec![i as f32; 4])).collect()
    }

    #[test]
    fn preserves_order_under_reverse_completion() {
        let n = 8;
        let transform = Arc::new(TaggingTransform {
            total: n,
            calls: AtomicUsize::new(0),
        });
        let proc = SegmentProcessor::new(
            FeatureWorker::new(transform.clone()),
            ProcessorConfig { workers: 4 },
        )
        .unwrap();

        let out = proc.process_all(&segments(n), 16000).unwrap();
        assert_eq!(out.len(), n);
        for (i, tensor) in out.iter().enumerate() {
            assert_eq!(tensor.as_array()[[0, 0, 0]], i as f32, "slot {i} holds wrong segment");
        }
        assert_eq!(transform.calls.load(Ordering::SeqCst), n);
    }

    #[test]
    fn empty_input_returns_empty() {
        let proc = SegmentProcessor::new(
            FeatureWorker::new(Arc::new(FailAt(0.0))),
            ProcessorConfig::default(),
        )
        .unwrap();
        assert!(proc.process_all(&[], 16000).unwrap().is_empty());
    }

    #[test]
    fn single_failure_fails_batch() {
        let proc = SegmentProcessor::new(
            FeatureWorker::new(Arc::new(FailAt(3.0))),
            ProcessorConfig { workers: 2 },
        )
        .unwrap();
        let err = proc.process_all(&segments(6), 16000).unwrap_err();
        match err {
            SleepSpecError::FeatureComputation { index, .. } => assert_eq!(index, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failure_skips_unstarted_segments() {
        let n = 20;
        let transform = Arc::new(FailFirst {
            calls: AtomicUsize::new(0),
        });
        let proc = SegmentProcessor::new(
            FeatureWorker::new(transform.clone()),
            ProcessorConfig { workers: 1 },
        )
        .unwrap();

        let err = proc.process_all(&segments(n), 16000).unwrap_err();
        assert!(matches!(err, SleepSpecError::FeatureComputation { .. }));
        let calls = transform.calls.load(Ordering::SeqCst);
        assert!(calls < n, "all {n} segments ran after the first failure");
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_workers_clamped() {
        let proc = SegmentProcessor::new(
            FeatureWorker::new(Arc::new(FailAt(-1.0))),
            ProcessorConfig { workers: 0 },
        )
        .unwrap();
        assert_eq!(proc.workers(), 1);
        assert_eq!(proc.process_all(&segments(3), 16000).unwrap().len(), 3);
    }
}
