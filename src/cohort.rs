use crate::models::{CohortThresholds, StudentFeatureVector};

const LOWER_QUARTILE: f64 = 0.25;

impl CohortThresholds {
    /// Lower-quartile cut-offs for the students scored in one request.
    ///
    /// A single-student cohort gets that student's own values, so nobody is
    /// ever flagged below threshold in that case.
    pub fn from_features(features: &[StudentFeatureVector]) -> Self {
        let column = |pick: fn(&StudentFeatureVector) -> f64| -> f64 {
            let values: Vec<f64> = features.iter().map(pick).collect();
            quantile(&values, LOWER_QUARTILE)
        };

        CohortThresholds {
            attendance_q25: column(|f| f.attendance_pct),
            participation_q25: column(|f| f.participation_score),
            evaluation_q25: column(|f| f.evaluation_avg),
        }
    }
}

/// Quantile with linear interpolation between closest ranks.
///
/// Returns 0.0 for an empty slice.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}
