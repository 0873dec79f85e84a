//! Pretrained classifier model: a linear projector followed by a binary
//! decision model, loaded once and shared read-only.

use std::fmt;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SleepSpecError};

/// Dimensionality-reduction step applied to a flattened feature vector.
///
/// Implementations must be safe for concurrent use.
pub trait Projector: Send + Sync {
    /// Length of the vectors accepted by [`Projector::transform`].
    fn input_dim(&self) -> usize;

    /// Length of the projected vectors.
    fn output_dim(&self) -> usize;

    /// Projects `x`, whose length equals [`Projector::input_dim`].
    fn transform(&self, x: &[f32]) -> Vec<f32>;
}

/// Binary classifier applied to projected vectors.
///
/// Implementations must be safe for concurrent use.
pub trait DecisionModel: Send + Sync {
    /// Class codes in the order used by [`DecisionModel::predict_proba`].
    fn classes(&self) -> &[i32];

    /// Length of the vectors accepted by the model.
    fn input_dim(&self) -> usize;

    /// Signed distance from the separating hyperplane.
    fn decision_function(&self, z: &[f32]) -> f64;

    /// Predicted class code.
    fn predict(&self, z: &[f32]) -> i32;

    /// Per-class probabilities ordered like [`DecisionModel::classes`],
    /// or `None` when the model has no probability estimator.
    fn predict_proba(&self, z: &[f32]) -> Option<Vec<f64>>;

    /// Whether [`DecisionModel::predict_proba`] returns estimates.
    fn has_probability(&self) -> bool;
}

/// Principal component projection: `(x - mean) . components^T`,
/// optionally whitened by the component standard deviations.
pub struct Pca {
    components: Array2<f32>, // n_components x n_features
    mean: Array1<f32>,
    scale: Option<Array1<f32>>,
}

impl Pca {
    /// Creates a projection from a `n_components x n_features` matrix.
    /// A missing mean is treated as zero.
    pub fn new(components: Array2<f32>, mean: Option<Array1<f32>>) -> Result<Self> {
        let (n_components, n_features) = components.dim();
        if n_components == 0 || n_features == 0 {
            return Err(SleepSpecError::Model("pca: empty components".into()));
        }
        let mean = mean.unwrap_or_else(|| Array1::zeros(n_features));
        if mean.len() != n_features {
            return Err(SleepSpecError::Model(format!(
                "pca: mean has {} entries, expected {n_features}",
                mean.len()
            )));
        }
        Ok(Self {
            components,
            mean,
            scale: None,
        })
    }

    /// Divides each projected component by `sqrt(explained_variance)`.
    pub fn with_whitening(mut self, explained_variance: Array1<f32>) -> Result<Self> {
        if explained_variance.len() != self.n_components() {
            return Err(SleepSpecError::Model(format!(
                "pca: explained_variance has {} entries, expected {}",
                explained_variance.len(),
                self.n_components()
            )));
        }
        if explained_variance.iter().any(|&v| v.is_nan() || v <= 0.0) {
            return Err(SleepSpecError::Model(
                "pca: explained_variance must be positive".into(),
            ));
        }
        self.scale = Some(explained_variance.mapv(f32::sqrt));
        Ok(self)
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }
}

impl Projector for Pca {
    fn input_dim(&self) -> usize {
        self.n_features()
    }

    fn output_dim(&self) -> usize {
        self.n_components()
    }

    fn transform(&self, x: &[f32]) -> Vec<f32> {
        let centered = &ArrayView1::from(x) - &self.mean;
        let mut z = self.components.dot(&centered);
        if let Some(scale) = &self.scale {
            z /= scale;
        }
        z.to_vec()
    }
}

/// Platt sigmoid parameters: `p(classes[1]) = 1 / (1 + exp(a * f + b))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platt {
    pub a: f64,
    pub b: f64,
}

/// Linear support vector classifier over two classes.
///
/// `f = coef . z + intercept`; `f > 0` predicts `classes[1]`.
pub struct LinearSvm {
    classes: [i32; 2],
    coef: Array1<f32>,
    intercept: f32,
    platt: Option<Platt>,
}

impl LinearSvm {
    pub fn new(classes: [i32; 2], coef: Array1<f32>, intercept: f32) -> Result<Self> {
        if classes[0] == classes[1] {
            return Err(SleepSpecError::Model(format!(
                "svm: classes must be distinct, got {classes:?}"
            )));
        }
        if coef.is_empty() {
            return Err(SleepSpecError::Model("svm: empty coef".into()));
        }
        Ok(Self {
            classes,
            coef,
            intercept,
            platt: None,
        })
    }

    /// Enables probability estimates.
    pub fn with_platt(mut self, platt: Platt) -> Self {
        self.platt = Some(platt);
        self
    }
}

impl DecisionModel for LinearSvm {
    fn classes(&self) -> &[i32] {
        &self.classes
    }

    fn input_dim(&self) -> usize {
        self.coef.len()
    }

    fn decision_function(&self, z: &[f32]) -> f64 {
        self.coef.dot(&ArrayView1::from(z)) as f64 + self.intercept as f64
    }

    fn predict(&self, z: &[f32]) -> i32 {
        if self.decision_function(z) > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        }
    }

    fn has_probability(&self) -> bool {
        self.platt.is_some()
    }

    fn predict_proba(&self, z: &[f32]) -> Option<Vec<f64>> {
        let platt = self.platt?;
        let f = self.decision_function(z);
        let p1 = 1.0 / (1.0 + (platt.a * f + platt.b).exp());
        Some(vec![1.0 - p1, p1])
    }
}

/// On-disk bundle: exactly one projector (`pca`) and one decision model (`svm`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelBundle {
    pub pca: PcaParams,
    pub svm: SvmParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PcaParams {
    pub components: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mean: Vec<f32>,
    #[serde(default)]
    pub whiten: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub explained_variance: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvmParams {
    pub classes: Vec<i32>,
    pub coef: Vec<f32>,
    pub intercept: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platt: Option<Platt>,
}

impl PcaParams {
    fn build(self) -> Result<Pca> {
        let n_components = self.components.len();
        let n_features = self.components.first().map_or(0, Vec::len);
        if let Some((i, _)) = self
            .components
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != n_features)
        {
            return Err(SleepSpecError::Model(format!(
                "pca: component {i} has wrong dimension, expected {n_features}"
            )));
        }
        let flat: Vec<f32> = self.components.into_iter().flatten().collect();
        let components = Array2::from_shape_vec((n_components, n_features), flat)
            .map_err(|e| SleepSpecError::Model(format!("pca: {e}")))?;
        let mean = (!self.mean.is_empty()).then(|| Array1::from(self.mean));
        let pca = Pca::new(components, mean)?;
        if self.whiten {
            pca.with_whitening(Array1::from(self.explained_variance))
        } else {
            Ok(pca)
        }
    }
}

impl SvmParams {
    fn build(self) -> Result<LinearSvm> {
        let classes: [i32; 2] = self.classes.as_slice().try_into().map_err(|_| {
            SleepSpecError::Model(format!(
                "svm: expected 2 classes, got {}",
                self.classes.len()
            ))
        })?;
        let svm = LinearSvm::new(classes, Array1::from(self.coef), self.intercept)?;
        Ok(match self.platt {
            Some(p) => svm.with_platt(p),
            None => svm,
        })
    }
}

/// Immutable (projector, decision model) pair shared across requests.
pub struct ClassifierModel {
    projector: Box<dyn Projector>,
    decision: Box<dyn DecisionModel>,
}

/// Summary of a loaded model, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub input_dim: usize,
    pub components: usize,
    pub classes: Vec<i32>,
    pub probability: bool,
}

impl ClassifierModel {
    /// Pairs a projector with a decision model. Their dimensions must agree.
    pub fn new(
        projector: impl Projector + 'static,
        decision: impl DecisionModel + 'static,
    ) -> Result<Self> {
        if projector.output_dim() != decision.input_dim() {
            return Err(SleepSpecError::Model(format!(
                "projector outputs {} components, decision model expects {}",
                projector.output_dim(),
                decision.input_dim()
            )));
        }
        Ok(Self {
            projector: Box::new(projector),
            decision: Box::new(decision),
        })
    }

    /// Builds the model from a parsed bundle.
    pub fn from_bundle(bundle: ModelBundle) -> Result<Self> {
        Self::new(bundle.pca.build()?, bundle.svm.build()?)
    }

    /// Parses a JSON-encoded bundle.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let bundle: ModelBundle = serde_json::from_slice(data)
            .map_err(|e| SleepSpecError::Model(format!("parse bundle JSON: {e}")))?;
        Self::from_bundle(bundle)
    }

    /// Reads and parses a JSON bundle from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let model = Self::from_json(&data)?;
        info!(
            path = %path.display(),
            input_dim = model.input_dim(),
            "loaded classifier model"
        );
        Ok(model)
    }

    /// Expected length of a flattened feature vector.
    pub fn input_dim(&self) -> usize {
        self.projector.input_dim()
    }

    pub fn projector(&self) -> &dyn Projector {
        self.projector.as_ref()
    }

    pub fn decision(&self) -> &dyn DecisionModel {
        self.decision.as_ref()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            input_dim: self.projector.input_dim(),
            components: self.projector.output_dim(),
            classes: self.decision.classes().to_vec(),
            probability: self.decision.has_probability(),
        }
    }
}

impl fmt::Debug for ClassifierModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierModel")
            .field("input_dim", &self.projector.input_dim())
            .field("components", &self.projector.output_dim())
            .field("classes", &self.decision.classes())
            .finish()
    }
}
