use crate::models::{
    AttendanceRecord, GradeRecord, ParticipationRecord, StudentAggregate, StudentFeatureVector,
    PRESENT_STATUS,
};

/// Participation scores arrive on 0-10 and are rescaled to 0-100.
const PARTICIPATION_SCALE: f64 = 10.0;

pub fn from_aggregate(aggregate: &StudentAggregate) -> StudentFeatureVector {
    StudentFeatureVector {
        student_id: aggregate.student_id,
        attendance_pct: attendance_pct(aggregate.attendance_present, aggregate.attendance_total),
        participation_score: aggregate
            .mean_participation
            .map(|mean| mean * PARTICIPATION_SCALE)
            .unwrap_or(0.0),
        evaluation_avg: aggregate.mean_grade.unwrap_or(0.0),
    }
}

/// Builds the feature vector straight from a student's raw history.
pub fn from_records(
    student_id: i64,
    attendance: &[AttendanceRecord],
    participation: &[ParticipationRecord],
    grades: &[GradeRecord],
) -> StudentFeatureVector {
    from_aggregate(&summarize_records(student_id, attendance, participation, grades))
}

pub fn summarize_records(
    student_id: i64,
    attendance: &[AttendanceRecord],
    participation: &[ParticipationRecord],
    grades: &[GradeRecord],
) -> StudentAggregate {
    let present = attendance
        .iter()
        .filter(|record| record.status == PRESENT_STATUS)
        .count();

    StudentAggregate {
        student_id,
        mean_grade: mean(grades.iter().map(|record| record.score)),
        mean_participation: mean(participation.iter().map(|record| record.score)),
        attendance_total: attendance.len() as i64,
        attendance_present: present as i64,
    }
}

/// Whole-number percentage, truncated toward zero.
pub fn attendance_pct(present: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((present as f64 / total as f64) * 100.0).trunc()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
