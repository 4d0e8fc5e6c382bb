use std::collections::HashMap;

use async_trait::async_trait;

use crate::features;
use crate::models::{
    AttendanceRecord, CohortScope, GradeRecord, ParticipationRecord, StudentAggregate, StudentRef,
};

/// Read access to the school records the scoring pipeline needs.
#[async_trait]
pub trait StudentDataProvider: Send + Sync {
    /// Students in the requested scope, in the order they should be reported.
    async fn resolve_students(&self, scope: &CohortScope) -> anyhow::Result<Vec<StudentRef>>;

    /// One summary row per requested id, fetched in a single batched read.
    /// Ids without any records may be omitted.
    async fn fetch_aggregates(&self, student_ids: &[i64]) -> anyhow::Result<Vec<StudentAggregate>>;
}

#[derive(Debug, Clone, Default)]
struct StudentHistory {
    display_name: String,
    courses: Vec<i64>,
    attendance: Vec<AttendanceRecord>,
    participation: Vec<ParticipationRecord>,
    grades: Vec<GradeRecord>,
}

/// Provider backed by records held in memory, keyed by student id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStudents {
    students: Vec<(i64, StudentHistory)>,
}

impl InMemoryStudents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_student(&mut self, id: i64, display_name: &str) -> &mut Self {
        if let Some(history) = self.history_mut(id) {
            history.display_name = display_name.to_string();
        } else {
            self.students.push((
                id,
                StudentHistory {
                    display_name: display_name.to_string(),
                    ..StudentHistory::default()
                },
            ));
        }
        self
    }

    pub fn enroll(&mut self, id: i64, course_id: i64) -> &mut Self {
        if let Some(history) = self.history_mut(id) {
            history.courses.push(course_id);
        }
        self
    }

    pub fn attendance(&mut self, id: i64, status: &str) -> &mut Self {
        if let Some(history) = self.history_mut(id) {
            history.attendance.push(AttendanceRecord {
                status: status.to_string(),
            });
        }
        self
    }

    pub fn participation(&mut self, id: i64, score: f64) -> &mut Self {
        if let Some(history) = self.history_mut(id) {
            history.participation.push(ParticipationRecord { score });
        }
        self
    }

    pub fn grade(&mut self, id: i64, score: f64) -> &mut Self {
        if let Some(history) = self.history_mut(id) {
            history.grades.push(GradeRecord { score });
        }
        self
    }

    fn history_mut(&mut self, id: i64) -> Option<&mut StudentHistory> {
        self.students
            .iter_mut()
            .find(|(student_id, _)| *student_id == id)
            .map(|(_, history)| history)
    }
}

#[async_trait]
impl StudentDataProvider for InMemoryStudents {
    async fn resolve_students(&self, scope: &CohortScope) -> anyhow::Result<Vec<StudentRef>> {
        let mut resolved: Vec<StudentRef> = self
            .students
            .iter()
            .filter(|(id, history)| match scope {
                CohortScope::Course(course_id) => history.courses.contains(course_id),
                CohortScope::Students(ids) => ids.contains(id),
            })
            .map(|(id, history)| StudentRef {
                id: *id,
                display_name: history.display_name.clone(),
            })
            .collect();
        resolved.sort_by_key(|student| student.id);
        Ok(resolved)
    }

    async fn fetch_aggregates(&self, student_ids: &[i64]) -> anyhow::Result<Vec<StudentAggregate>> {
        let by_id: HashMap<i64, &StudentHistory> = self
            .students
            .iter()
            .map(|(id, history)| (*id, history))
            .collect();

        Ok(student_ids
            .iter()
            .filter_map(|id| by_id.get(id).map(|history| (*id, *history)))
            .map(|(id, history)| {
                features::summarize_records(
                    id,
                    &history.attendance,
                    &history.participation,
                    &history.grades,
                )
            })
            .collect())
    }
}
