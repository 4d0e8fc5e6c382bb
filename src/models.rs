use std::fmt;

use serde::{Deserialize, Serialize};

/// Attendance status that counts towards the attendance percentage.
pub const PRESENT_STATUS: &str = "Presente";

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub status: String,
}

/// Participation score on the 0-10 scale.
#[derive(Debug, Clone, Copy)]
pub struct ParticipationRecord {
    pub score: f64,
}

/// Grade on the 0-100 scale.
#[derive(Debug, Clone, Copy)]
pub struct GradeRecord {
    pub score: f64,
}

/// A student resolved as part of a scoring request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRef {
    pub id: i64,
    pub display_name: String,
}

/// Which group of students a request scores together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CohortScope {
    Course(i64),
    Students(Vec<i64>),
}

impl fmt::Display for CohortScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CohortScope::Course(id) => write!(f, "course {id}"),
            CohortScope::Students(ids) => write!(f, "{} selected students", ids.len()),
        }
    }
}

/// Per-student summary row returned by one batched read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentAggregate {
    pub student_id: i64,
    pub mean_grade: Option<f64>,
    pub mean_participation: Option<f64>,
    pub attendance_total: i64,
    pub attendance_present: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StudentFeatureVector {
    pub student_id: i64,
    pub attendance_pct: f64,
    pub participation_score: f64,
    pub evaluation_avg: f64,
}

impl StudentFeatureVector {
    /// Features in model input order: attendance, participation, evaluation.
    pub fn as_array(&self) -> [f64; 3] {
        [
            self.attendance_pct,
            self.participation_score,
            self.evaluation_avg,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CohortThresholds {
    pub attendance_q25: f64,
    pub participation_q25: f64,
    pub evaluation_q25: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformanceTier {
    #[serde(rename = "Alto rendimiento")]
    High,
    #[serde(rename = "Promedio")]
    Average,
    #[serde(rename = "Bajo rendimiento")]
    Low,
}

impl PerformanceTier {
    pub const HIGH_CUTOFF: f64 = 80.0;
    pub const LOW_CUTOFF: f64 = 50.0;

    /// Grade-to-tier rule shared by training labels and prediction.
    ///
    /// Grades are compared at two decimals, the precision the training labels
    /// and the reported grade use.
    pub fn from_grade(grade: f64) -> Self {
        let grade = round2(grade);
        if grade > Self::HIGH_CUTOFF {
            PerformanceTier::High
        } else if grade >= Self::LOW_CUTOFF {
            PerformanceTier::Average
        } else {
            PerformanceTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PerformanceTier::High => "Alto rendimiento",
            PerformanceTier::Average => "Promedio",
            PerformanceTier::Low => "Bajo rendimiento",
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub student: StudentRef,
    pub features: StudentFeatureVector,
    pub predicted_final_grade: f64,
    pub predicted_tier: PerformanceTier,
    pub recommendations: Vec<String>,
}
