use crate::models::{CohortThresholds, StudentFeatureVector};

pub const LOW_ATTENDANCE: &str =
    "Tu asistencia es baja. Intenta asistir con más frecuencia para mejorar tu aprendizaje.";
pub const LOW_PARTICIPATION: &str = "Tu nivel de participación es bajo. Considera hablar más en clases, hacer preguntas o involucrarte en debates para fortalecer tu aprendizaje.";
pub const LOW_EVALUATION: &str = "Tus evaluaciones muestran oportunidades de mejora. Puedes probar técnicas de estudio como la repetición activa.";
pub const KEEP_GOING: &str =
    "¡Excelente trabajo! Tu rendimiento es sólido. Sigue así para mantener tu éxito académico.";

/// Advice for one student relative to the cohort's lower quartiles.
///
/// Conditions are checked independently in a fixed order (attendance,
/// participation, evaluation); the positive message only appears when none
/// of them fire. The result is never empty.
pub fn recommend(features: &StudentFeatureVector, thresholds: &CohortThresholds) -> Vec<String> {
    let checks = [
        (
            features.attendance_pct < thresholds.attendance_q25,
            LOW_ATTENDANCE,
        ),
        (
            features.participation_score < thresholds.participation_q25,
            LOW_PARTICIPATION,
        ),
        (
            features.evaluation_avg < thresholds.evaluation_q25,
            LOW_EVALUATION,
        ),
    ];

    let mut recommendations: Vec<String> = checks
        .iter()
        .filter(|(below, _)| *below)
        .map(|(_, message)| message.to_string())
        .collect();

    if recommendations.is_empty() {
        recommendations.push(KEEP_GOING.to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> CohortThresholds {
        CohortThresholds {
            attendance_q25: 50.0,
            participation_q25: 40.0,
            evaluation_q25: 45.0,
        }
    }

    fn student(a: f64, p: f64, e: f64) -> StudentFeatureVector {
        StudentFeatureVector {
            student_id: 1,
            attendance_pct: a,
            participation_score: p,
            evaluation_avg: e,
        }
    }

    #[test]
    fn at_or_above_every_threshold_gets_single_positive_message() {
        let recs = recommend(&student(50.0, 40.0, 45.0), &thresholds());
        assert_eq!(recs, vec![KEEP_GOING.to_string()]);
    }

    #[test]
    fn all_below_yields_three_messages_in_order() {
        let recs = recommend(&student(10.0, 5.0, 20.0), &thresholds());
        assert_eq!(
            recs,
            vec![
                LOW_ATTENDANCE.to_string(),
                LOW_PARTICIPATION.to_string(),
                LOW_EVALUATION.to_string(),
            ]
        );
    }

    #[test]
    fn only_failing_conditions_fire() {
        let recs = recommend(&student(40.0, 50.0, 55.0), &thresholds());
        assert_eq!(recs, vec![LOW_ATTENDANCE.to_string()]);

        let recs = recommend(&student(90.0, 30.0, 44.9), &thresholds());
        assert_eq!(
            recs,
            vec![LOW_PARTICIPATION.to_string(), LOW_EVALUATION.to_string()]
        );
    }
}
