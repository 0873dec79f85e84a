use tracing::info;

use crate::verdict::{Label, SegmentClassification, Verdict, result_text};

/// Fuses per-segment classifications into one [`Verdict`].
///
/// # Algorithm
///
/// Segments are split into an SD and an NSD group. Each group's average is
/// the mean probability its members assigned to their own label. The fused
/// score depends on which group is larger:
///
/// ```text
/// sd == nsd : 50 + (avg_sd - avg_nsd) * 50
/// sd >  nsd : 50 + avg_sd * 50
/// sd <  nsd : avg_nsd * 50
/// ```
///
/// The majority branches only look at the majority group's average. The
/// overall label is SD only on a strict SD majority.
///
/// Empty input yields [`Verdict::empty`].
pub fn aggregate(classifications: &[SegmentClassification]) -> Verdict {
    if classifications.is_empty() {
        return Verdict::empty();
    }

    let mut sd_count = 0usize;
    let mut nsd_count = 0usize;
    let mut sum_sd = 0.0f64;
    let mut sum_nsd = 0.0f64;
    let mut sum_margin = 0.0f64;
    let mut labels = Vec::with_capacity(classifications.len());
    let mut confidences = Vec::with_capacity(classifications.len());

    for c in classifications {
        match c.label {
            Label::Sd => {
                sd_count += 1;
                sum_sd += c.class_probability;
            }
            Label::Nsd => {
                nsd_count += 1;
                sum_nsd += c.class_probability;
            }
        }
        sum_margin += c.decision_margin;
        labels.push(c.label);
        confidences.push(c.class_probability);
    }

    let avg_sd = if sd_count > 0 {
        sum_sd / sd_count as f64
    } else {
        0.0
    };
    let avg_nsd = if nsd_count > 0 {
        sum_nsd / nsd_count as f64
    } else {
        0.0
    };

    let score = fused_score(sd_count, nsd_count, avg_sd, avg_nsd);
    let label = if sd_count > nsd_count {
        Label::Sd
    } else {
        Label::Nsd
    };

    let verdict = Verdict {
        label,
        labels,
        confidences,
        score,
        result: result_text(label).to_string(),
        success: true,
        sd_count,
        nsd_count,
        avg_sd_probability: avg_sd,
        avg_nsd_probability: avg_nsd,
        avg_decision_margin: sum_margin / classifications.len() as f64,
    };

    info!(
        sd = sd_count,
        nsd = nsd_count,
        avg_sd,
        avg_nsd,
        avg_margin = verdict.avg_decision_margin,
        "adjusted confidence score {score:.2}: {}",
        verdict.severity()
    );

    verdict
}

/// The three-way fused confidence rule on a 0-100 scale.
pub fn fused_score(sd_count: usize, nsd_count: usize, avg_sd: f64, avg_nsd: f64) -> f64 {
    if sd_count == nsd_count {
        50.0 + (avg_sd - avg_nsd) * 50.0
    } else if sd_count > nsd_count {
        50.0 + avg_sd * 50.0
    } else {
        avg_nsd * 50.0
    }
}
