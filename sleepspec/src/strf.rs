use std::sync::Arc;

use ndarray::{Array3, Array4, Axis};
use num_complex::Complex32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SleepSpecError};
use crate::preprocess::Segment;

/// Temporal modulation rates (Hz) analysed by the STRF transform.
pub const RATES: [f32; 22] = [
    -32.0, -22.6, -16.0, -11.3, -8.0, -5.70, -4.0, -2.0, -1.0, -0.5, -0.25, 0.25, 0.5, 1.0, 2.0,
    4.0, 5.70, 8.0, 11.3, 16.0, 22.6, 32.0,
];

/// Spectral modulation scales (cycles/octave) analysed by the STRF transform.
pub const SCALES: [f32; 8] = [0.71, 1.0, 1.41, 2.00, 2.83, 4.00, 5.66, 8.00];

/// Fixed analysis configuration handed to the STRF transform.
#[derive(Debug, Clone, PartialEq)]
pub struct StrfConfig {
    /// Temporal-rate filter set.
    pub rates: Vec<f32>,
    /// Spectral-scale filter set.
    pub scales: Vec<f32>,
    /// Maximum duration of audio analysed, in seconds (default: 15).
    pub max_duration_secs: f32,
}

impl Default for StrfConfig {
    fn default() -> Self {
        Self {
            rates: RATES.to_vec(),
            scales: SCALES.to_vec(),
            max_duration_secs: 15.0,
        }
    }
}

/// Error type returned by external transform implementations.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// Computes the spectro-temporal receptive field of one audio segment.
///
/// The output is a complex tensor shaped `(time, frequency, scale, rate)`,
/// where the scale and rate axes follow the order of
/// [`StrfConfig::scales`] and [`StrfConfig::rates`].
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use; the segment processor
/// calls `transform` from several worker threads at once.
pub trait StrfTransform: Send + Sync {
    fn transform(
        &self,
        samples: &[f32],
        sample_rate: u32,
        cfg: &StrfConfig,
    ) -> std::result::Result<Array4<Complex32>, TransformError>;
}

/// Time-averaged STRF magnitude, shaped `(frequency, scale, rate)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureTensor(Array3<f32>);

impl FeatureTensor {
    pub fn new(data: Array3<f32>) -> Self {
        Self(data)
    }

    /// Returns `(frequency, scale, rate)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.0.dim()
    }

    /// Number of elements once flattened.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens in row-major (frequency, scale, rate) order.
    pub fn flatten(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }

    pub fn as_array(&self) -> &Array3<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array3<f32> {
        self.0
    }
}

impl From<Array3<f32>> for FeatureTensor {
    fn from(data: Array3<f32>) -> Self {
        Self(data)
    }
}

/// Collapses a `(time, frequency, scale, rate)` STRF into its mean
/// magnitude over time. Returns `None` when the time axis is empty.
pub fn time_averaged_magnitude(strf: &Array4<Complex32>) -> Option<Array3<f32>> {
    let frames = strf.len_of(Axis(0));
    if frames == 0 {
        return None;
    }
    let n = frames as f32;
    Some(strf.map_axis(Axis(0), |lane| {
        lane.iter().map(|c| c.norm()).sum::<f32>() / n
    }))
}

/// Turns one segment into a [`FeatureTensor`] using an external transform.
///
/// Holds no mutable state; a single worker is shared by every pool thread.
pub struct FeatureWorker {
    transform: Arc<dyn StrfTransform>,
    config: StrfConfig,
}

impl FeatureWorker {
    /// Creates a worker with the default analysis configuration.
    pub fn new(transform: Arc<dyn StrfTransform>) -> Self {
        Self::with_config(transform, StrfConfig::default())
    }

    pub fn with_config(transform: Arc<dyn StrfTransform>, config: StrfConfig) -> Self {
        Self { transform, config }
    }

    pub fn config(&self) -> &StrfConfig {
        &self.config
    }

    /// Computes the feature tensor for `segment`.
    ///
    /// Any transform failure is reported as
    /// [`SleepSpecError::FeatureComputation`] carrying the segment index.
    pub fn extract(&self, segment: &Segment, sample_rate: u32) -> Result<FeatureTensor> {
        debug!(index = segment.index, "processing segment {}", segment.index + 1);

        let failed = |reason: String| SleepSpecError::FeatureComputation {
            index: segment.index,
            reason,
        };

        let strf = self
            .transform
            .transform(&segment.samples, sample_rate, &self.config)
            .map_err(|e| failed(e.to_string()))?;

        let (_, _, scales, rates) = strf.dim();
        if scales != self.config.scales.len() || rates != self.config.rates.len() {
            return Err(failed(format!(
                "transform produced {scales} scales x {rates} rates, expected {} x {}",
                self.config.scales.len(),
                self.config.rates.len()
            )));
        }

        let avg = time_averaged_magnitude(&strf)
            .ok_or_else(|| failed("transform produced no time frames".into()))?;
        Ok(FeatureTensor::new(avg))
    }
}
