use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SleepSpecError};
use crate::model::ClassifierModel;
use crate::strf::FeatureTensor;
use crate::verdict::{Label, SegmentClassification};

/// Scores feature tensors against a shared, read-only [`ClassifierModel`].
///
/// # Algorithm
///
/// 1. Flatten the tensor and divide by its maximum absolute value.
///    An all-zero vector is passed through unchanged.
/// 2. Reject vectors whose length differs from the projector input.
/// 3. Project, predict, and take `|decision_function|` as the margin.
/// 4. Read the SD and NSD probabilities from the model's probability
///    vector at the positions the model's own class ordering gives them.
#[derive(Clone)]
pub struct SegmentClassifier {
    model: Arc<ClassifierModel>,
}

impl SegmentClassifier {
    pub fn new(model: Arc<ClassifierModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ClassifierModel {
        &self.model
    }

    /// Classifies one feature tensor.
    pub fn classify(&self, feature: &FeatureTensor) -> Result<SegmentClassification> {
        let mut x = feature.flatten();
        normalize_max_abs(&mut x);

        let expected = self.model.input_dim();
        if x.len() != expected {
            return Err(SleepSpecError::DimensionMismatch {
                expected,
                got: x.len(),
            });
        }

        let z = self.model.projector().transform(&x);
        let decision = self.model.decision();

        let label = Label::from_code(decision.predict(&z));
        let margin = decision.decision_function(&z).abs();

        let (sd_prob, nsd_prob) = match decision.predict_proba(&z) {
            Some(probs) => {
                let classes = decision.classes();
                let sd = class_position(classes, Label::Sd)?;
                let nsd = class_position(classes, Label::Nsd)?;
                (probability_at(&probs, sd)?, probability_at(&probs, nsd)?)
            }
            None => (0.0, 0.0),
        };

        debug!(%label, margin, sd_prob, nsd_prob, "classified segment");

        let class_probability = match label {
            Label::Sd => sd_prob,
            Label::Nsd => nsd_prob,
        };
        Ok(SegmentClassification::new(label, margin, class_probability))
    }

    /// Classifies features in order, stopping at the first error.
    pub fn classify_all(&self, features: &[FeatureTensor]) -> Result<Vec<SegmentClassification>> {
        features.iter().map(|f| self.classify(f)).collect()
    }
}

/// Divides `x` by its largest absolute value unless that value is zero.
pub fn normalize_max_abs(x: &mut [f32]) {
    let max = x.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    if max != 0.0 {
        for v in x.iter_mut() {
            *v /= max;
        }
    }
}

fn class_position(classes: &[i32], label: Label) -> Result<usize> {
    classes
        .iter()
        .position(|&c| c == label.code())
        .ok_or_else(|| {
            SleepSpecError::Model(format!(
                "class {label} (code {}) not in model classes {classes:?}",
                label.code()
            ))
        })
}

fn probability_at(probs: &[f64], position: usize) -> Result<f64> {
    probs.get(position).copied().ok_or_else(|| {
        SleepSpecError::Model(format!(
            "probability vector has {} entries, class position {position} is out of range",
            probs.len()
        ))
    })
}
