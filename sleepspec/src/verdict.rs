use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification label of a segment or of a whole recording.
///
/// The discriminants are the class codes the classifier was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum Label {
    /// Not sleep-deprived.
    Nsd = 0,
    /// Sleep-deprived.
    Sd = 1,
}

impl Label {
    /// Returns the class code used by the decision model.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Maps a predicted class code back to a label.
    /// Any code other than the SD code is treated as NSD.
    pub fn from_code(code: i32) -> Self {
        if code == Label::Sd.code() {
            Label::Sd
        } else {
            Label::Nsd
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nsd => write!(f, "NSD"),
            Self::Sd => write!(f, "SD"),
        }
    }
}

impl From<Label> for i32 {
    fn from(label: Label) -> Self {
        label.code()
    }
}

impl TryFrom<i32> for Label {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Label::Nsd),
            1 => Ok(Label::Sd),
            other => Err(format!("unknown class code {other}")),
        }
    }
}

/// Result of classifying one segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentClassification {
    /// Predicted label.
    pub label: Label,
    /// Absolute distance from the separating hyperplane.
    pub decision_margin: f64,
    /// Probability of the predicted label, 0.0 when the model has no
    /// probability estimator.
    pub class_probability: f64,
}

impl SegmentClassification {
    pub fn new(label: Label, decision_margin: f64, class_probability: f64) -> Self {
        Self {
            label,
            decision_margin,
            class_probability,
        }
    }
}

/// Coarse reading of the fused confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Score below 50.
    None,
    /// Score in [50, 80).
    Moderate,
    /// Score of 80 or more.
    Highly,
}

impl Severity {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Severity::Highly
        } else if score >= 50.0 {
            Severity::Moderate
        } else {
            Severity::None
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "Non-sleep-deprived"),
            Self::Moderate => write!(f, "Moderate Sleep-deprived"),
            Self::Highly => write!(f, "Highly Sleep-deprived"),
        }
    }
}

/// Overall decision for one recording.
///
/// Serializes with the field names API clients consume
/// (`class`, `classes`, `scores`, `confidence_score`, `result`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Majority label; ties resolve to NSD.
    #[serde(rename = "class")]
    pub label: Label,

    /// Per-segment labels in input order.
    #[serde(rename = "classes")]
    pub labels: Vec<Label>,

    /// Per-segment probability of each segment's own label, parallel to `labels`.
    #[serde(rename = "scores")]
    pub confidences: Vec<f64>,

    /// Fused confidence in [0, 100].
    #[serde(rename = "confidence_score")]
    pub score: f64,

    /// Human-readable outcome.
    pub result: String,

    /// False only when there were no segments to classify.
    pub success: bool,

    pub sd_count: usize,
    pub nsd_count: usize,
    pub avg_sd_probability: f64,
    pub avg_nsd_probability: f64,
    /// Mean absolute decision margin over all segments.
    pub avg_decision_margin: f64,
}

impl Verdict {
    /// The verdict for a recording that produced no segments.
    pub fn empty() -> Self {
        Self {
            label: Label::Nsd,
            labels: Vec::new(),
            confidences: Vec::new(),
            score: 0.0,
            result: result_text(Label::Nsd).to_string(),
            success: false,
            sd_count: 0,
            nsd_count: 0,
            avg_sd_probability: 0.0,
            avg_nsd_probability: 0.0,
            avg_decision_margin: 0.0,
        }
    }

    /// Severity bucket of the fused score.
    pub fn severity(&self) -> Severity {
        Severity::from_score(self.score)
    }
}

pub(crate) fn result_text(label: Label) -> &'static str {
    match label {
        Label::Sd => "You are sleep deprived.",
        Label::Nsd => "You are not sleep deprived.",
    }
}
