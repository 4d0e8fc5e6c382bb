use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::error::ScoringError;
use crate::features;
use crate::models::{
    CohortScope, CohortThresholds, PredictionResult, StudentAggregate, StudentFeatureVector,
};
use crate::predictor::{ModelProvider, ModelSlot};
use crate::provider::StudentDataProvider;
use crate::recommend;

/// Body of a scoring request. An id list takes precedence over a course.
/// Ids are positive; a `curso_id` of 0 or below counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub curso_id: Option<i64>,
    #[serde(default)]
    pub alumnos_ids: Option<Vec<i64>>,
}

impl ScoreRequest {
    pub fn for_course(course_id: i64) -> Self {
        Self {
            curso_id: Some(course_id),
            alumnos_ids: None,
        }
    }

    pub fn for_students(ids: Vec<i64>) -> Self {
        Self {
            curso_id: None,
            alumnos_ids: Some(ids),
        }
    }

    pub fn scope(&self) -> Result<CohortScope, ScoringError> {
        match (&self.alumnos_ids, self.curso_id) {
            (Some(ids), _) if !ids.is_empty() => Ok(CohortScope::Students(ids.clone())),
            (_, Some(course_id)) if course_id > 0 => Ok(CohortScope::Course(course_id)),
            _ => Err(ScoringError::missing_scope()),
        }
    }
}

/// Scored students plus the cohort baseline they were compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortScores {
    pub scope: CohortScope,
    pub thresholds: Option<CohortThresholds>,
    pub results: Vec<PredictionResult>,
}

pub struct Scorer<'a> {
    data: &'a dyn StudentDataProvider,
    models: &'a ModelSlot,
}

impl<'a> Scorer<'a> {
    pub fn new(data: &'a dyn StudentDataProvider, models: &'a ModelSlot) -> Self {
        Self { data, models }
    }

    pub async fn score(
        &self,
        request: &ScoreRequest,
    ) -> Result<Vec<PredictionResult>, ScoringError> {
        Ok(self.score_cohort(request).await?.results)
    }

    pub async fn score_cohort(
        &self,
        request: &ScoreRequest,
    ) -> Result<CohortScores, ScoringError> {
        let scope = request.scope()?;
        let models = self.models.provider()?;

        let span = info_span!("score_cohort", request_id = %Uuid::new_v4(), scope = %scope);
        self.run(scope, models).instrument(span).await
    }

    async fn run(
        &self,
        scope: CohortScope,
        models: &dyn ModelProvider,
    ) -> Result<CohortScores, ScoringError> {
        let students = self.data.resolve_students(&scope).await?;
        if students.is_empty() {
            info!("no students in scope");
            return Ok(CohortScores {
                scope,
                thresholds: None,
                results: Vec::new(),
            });
        }

        let ids: Vec<i64> = students.iter().map(|student| student.id).collect();
        let mut aggregates: HashMap<i64, StudentAggregate> = self
            .data
            .fetch_aggregates(&ids)
            .await?
            .into_iter()
            .map(|aggregate| (aggregate.student_id, aggregate))
            .collect();

        let vectors: Vec<StudentFeatureVector> = ids
            .iter()
            .map(|id| {
                let aggregate = aggregates.remove(id).unwrap_or_else(|| StudentAggregate {
                    student_id: *id,
                    ..StudentAggregate::default()
                });
                features::from_aggregate(&aggregate)
            })
            .collect();

        let thresholds = CohortThresholds::from_features(&vectors);
        debug!(?thresholds, "cohort thresholds");

        let results: Vec<PredictionResult> = students
            .into_iter()
            .zip(vectors)
            .map(|(student, features)| PredictionResult {
                predicted_final_grade: models.predict_grade(&features),
                predicted_tier: models.predict_tier(&features),
                recommendations: recommend::recommend(&features, &thresholds),
                student,
                features,
            })
            .collect();

        info!(students = results.len(), "cohort scored");
        Ok(CohortScores {
            scope,
            thresholds: Some(thresholds),
            results,
        })
    }
}
