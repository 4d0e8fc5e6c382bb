use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{round2, PerformanceTier, PredictionResult};
use crate::scoring::CohortScores;

/// One entry of the scoring response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRow {
    pub alumno_id: i64,
    pub alumno: String,
    pub asistencia: i64,
    pub participaciones: f64,
    pub evaluaciones: f64,
    pub nota_final_predicha: f64,
    pub rendimiento_predicho: PerformanceTier,
    pub recomendaciones: Vec<String>,
}

impl From<&PredictionResult> for PredictionRow {
    fn from(result: &PredictionResult) -> Self {
        Self {
            alumno_id: result.student.id,
            alumno: result.student.display_name.clone(),
            asistencia: result.features.attendance_pct as i64,
            participaciones: round2(result.features.participation_score),
            evaluaciones: round2(result.features.evaluation_avg),
            nota_final_predicha: round2(result.predicted_final_grade),
            rendimiento_predicho: result.predicted_tier,
            recomendaciones: result.recommendations.clone(),
        }
    }
}

pub fn to_rows(results: &[PredictionResult]) -> Vec<PredictionRow> {
    results.iter().map(PredictionRow::from).collect()
}

pub fn to_json(results: &[PredictionResult]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&to_rows(results))?)
}

const CSV_HEADER: [&str; 8] = [
    "alumno_id",
    "alumno",
    "asistencia",
    "participaciones",
    "evaluaciones",
    "nota_final_predicha",
    "rendimiento_predicho",
    "recomendaciones",
];

#[derive(Serialize)]
struct CsvRow<'a> {
    alumno_id: i64,
    alumno: &'a str,
    asistencia: i64,
    participaciones: f64,
    evaluaciones: f64,
    nota_final_predicha: f64,
    rendimiento_predicho: &'static str,
    recomendaciones: String,
}

pub fn to_csv(results: &[PredictionResult]) -> anyhow::Result<String> {
    let rows = to_rows(results);
    // Header written up front so an empty cohort still yields a valid file.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for row in &rows {
        writer.serialize(CsvRow {
            alumno_id: row.alumno_id,
            alumno: &row.alumno,
            asistencia: row.asistencia,
            participaciones: row.participaciones,
            evaluaciones: row.evaluaciones,
            nota_final_predicha: row.nota_final_predicha,
            rendimiento_predicho: row.rendimiento_predicho.label(),
            recomendaciones: row.recomendaciones.join(" | "),
        })?;
    }
    let bytes = writer.into_inner().map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn to_table(results: &[PredictionResult]) -> String {
    let mut output = String::new();
    for row in to_rows(results) {
        let _ = writeln!(
            output,
            "- {} (#{}) asistencia {}%, participación {:.2}, evaluaciones {:.2} -> nota {:.2} ({})",
            row.alumno,
            row.alumno_id,
            row.asistencia,
            row.participaciones,
            row.evaluaciones,
            row.nota_final_predicha,
            row.rendimiento_predicho
        );
        for recommendation in &row.recomendaciones {
            let _ = writeln!(output, "    * {recommendation}");
        }
    }
    output
}

pub fn summarize_by_tier(results: &[PredictionResult]) -> Vec<(PerformanceTier, usize)> {
    [
        PerformanceTier::High,
        PerformanceTier::Average,
        PerformanceTier::Low,
    ]
    .into_iter()
    .map(|tier| {
        let count = results
            .iter()
            .filter(|result| result.predicted_tier == tier)
            .count();
        (tier, count)
    })
    .collect()
}

pub fn build_report(scores: &CohortScores, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Performance Report");
    let _ = writeln!(
        output,
        "Generated for {} on {}",
        scores.scope,
        generated_at.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Baseline (25th percentile)");

    match &scores.thresholds {
        None => {
            let _ = writeln!(output, "No students found for this scope.");
            return output;
        }
        Some(thresholds) => {
            let _ = writeln!(output, "- Asistencia: {:.2}", thresholds.attendance_q25);
            let _ = writeln!(output, "- Participaciones: {:.2}", thresholds.participation_q25);
            let _ = writeln!(output, "- Evaluaciones: {:.2}", thresholds.evaluation_q25);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Predicted Performance Mix");
    for (tier, count) in summarize_by_tier(&scores.results) {
        let _ = writeln!(output, "- {tier}: {count} students");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students");
    output.push_str(&to_table(&scores.results));

    output
}
