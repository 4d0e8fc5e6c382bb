use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use performance_scoring::error::ScoringError;
use performance_scoring::models::{CohortScope, PerformanceTier, StudentAggregate, StudentRef};
use performance_scoring::predictor::{LinearRegression, ModelSlot, PersistedModels, TierClassifier};
use performance_scoring::provider::{InMemoryStudents, StudentDataProvider};
use performance_scoring::recommend::{KEEP_GOING, LOW_ATTENDANCE, LOW_EVALUATION, LOW_PARTICIPATION};
use performance_scoring::scoring::{ScoreRequest, Scorer};

const COURSE: i64 = 10;

fn mean_models() -> ModelSlot {
    let third = 1.0 / 3.0;
    let models = PersistedModels::new(
        LinearRegression {
            intercept: 0.0,
            coefficients: [third; 3],
        },
        TierClassifier::LinearRule {
            intercept: 0.0,
            coefficients: [third; 3],
        },
    )
    .unwrap();
    ModelSlot::ready(models)
}

fn add_student(
    store: &mut InMemoryStudents,
    id: i64,
    name: &str,
    present: usize,
    participation: f64,
    grade: f64,
) {
    store.add_student(id, name).enroll(id, COURSE);
    for slot in 0..5 {
        let status = if slot < present { "Presente" } else { "Ausente" };
        store.attendance(id, status);
    }
    store.participation(id, participation).grade(id, grade);
}

/// Attendance {100, 80, 40, 20}, participation {90, 70, 50, 10},
/// evaluation {95, 75, 55, 15}.
fn four_student_course() -> InMemoryStudents {
    let mut store = InMemoryStudents::new();
    add_student(&mut store, 1, "Lucía Rojas", 5, 9.0, 95.0);
    add_student(&mut store, 2, "Mateo Vargas", 4, 7.0, 75.0);
    add_student(&mut store, 3, "Sofía Peña", 2, 5.0, 55.0);
    add_student(&mut store, 4, "Diego Flores", 1, 1.0, 15.0);
    store
}

#[tokio::test]
async fn scores_course_cohort_against_its_own_quartiles() {
    let store = four_student_course();
    let models = mean_models();
    let scores = Scorer::new(&store, &models)
        .score_cohort(&ScoreRequest::for_course(COURSE))
        .await
        .unwrap();

    let thresholds = scores.thresholds.unwrap();
    assert_eq!(thresholds.attendance_q25, 35.0);
    assert_eq!(thresholds.participation_q25, 40.0);
    assert_eq!(thresholds.evaluation_q25, 45.0);

    let ids: Vec<i64> = scores.results.iter().map(|r| r.student.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let sofia = &scores.results[2];
    assert_eq!(sofia.features.attendance_pct, 40.0);
    assert_eq!(sofia.features.participation_score, 50.0);
    assert_eq!(sofia.features.evaluation_avg, 55.0);
    assert_eq!(sofia.recommendations, vec![KEEP_GOING.to_string()]);
    assert_eq!(sofia.predicted_tier, PerformanceTier::Low);

    let diego = &scores.results[3];
    assert_eq!(
        diego.recommendations,
        vec![
            LOW_ATTENDANCE.to_string(),
            LOW_PARTICIPATION.to_string(),
            LOW_EVALUATION.to_string(),
        ]
    );

    let lucia = &scores.results[0];
    assert!((lucia.predicted_final_grade - 95.0).abs() < 1e-9);
    assert_eq!(lucia.predicted_tier, PerformanceTier::High);
    assert_eq!(lucia.recommendations, vec![KEEP_GOING.to_string()]);
}

#[tokio::test]
async fn thresholds_follow_the_requested_students() {
    let mut store = four_student_course();
    add_student(&mut store, 5, "Valentina Cruz", 3, 6.0, 60.0);
    add_student(&mut store, 6, "Tomás Ruiz", 5, 8.0, 80.0);
    let models = mean_models();

    // Among the first four, Sofía clears every quartile.
    let results = Scorer::new(&store, &models)
        .score(&ScoreRequest::for_students(vec![1, 2, 3, 4]))
        .await
        .unwrap();
    let sofia = results.iter().find(|r| r.student.id == 3).unwrap();
    assert_eq!(sofia.recommendations, vec![KEEP_GOING.to_string()]);

    // Against {40, 60, 100}, {50, 60, 80}, {55, 60, 80} the quartiles are
    // 50, 55 and 57.5, so she is below on all three.
    let results = Scorer::new(&store, &models)
        .score(&ScoreRequest::for_students(vec![3, 5, 6]))
        .await
        .unwrap();
    assert_eq!(results[0].student.id, 3);
    assert_eq!(
        results[0].recommendations,
        vec![
            LOW_ATTENDANCE.to_string(),
            LOW_PARTICIPATION.to_string(),
            LOW_EVALUATION.to_string(),
        ]
    );
}

#[tokio::test]
async fn attendance_only_deficiency_yields_single_message() {
    let mut store = InMemoryStudents::new();
    add_student(&mut store, 1, "Ana Paredes", 5, 5.0, 50.0);
    add_student(&mut store, 2, "Bruno Medina", 2, 5.0, 50.0);
    let models = mean_models();

    // Attendance {100, 40} gives a quartile of 55; the other features tie.
    let results = Scorer::new(&store, &models)
        .score(&ScoreRequest::for_course(COURSE))
        .await
        .unwrap();
    assert_eq!(results[0].recommendations, vec![KEEP_GOING.to_string()]);
    assert_eq!(results[1].recommendations, vec![LOW_ATTENDANCE.to_string()]);
}

#[tokio::test]
async fn student_without_records_scores_zero_features() {
    let mut store = four_student_course();
    store.add_student(7, "Nicolás Soto").enroll(7, COURSE);
    let models = mean_models();

    let results = Scorer::new(&store, &models)
        .score(&ScoreRequest::for_course(COURSE))
        .await
        .unwrap();
    let newcomer = results.iter().find(|r| r.student.id == 7).unwrap();
    assert_eq!(newcomer.features.attendance_pct, 0.0);
    assert_eq!(newcomer.features.participation_score, 0.0);
    assert_eq!(newcomer.features.evaluation_avg, 0.0);
    assert_eq!(newcomer.predicted_tier, PerformanceTier::Low);
}

#[tokio::test]
async fn empty_cohort_is_not_an_error() {
    let store = four_student_course();
    let models = mean_models();
    let scores = Scorer::new(&store, &models)
        .score_cohort(&ScoreRequest::for_course(999))
        .await
        .unwrap();
    assert!(scores.results.is_empty());
    assert!(scores.thresholds.is_none());
}

#[tokio::test]
async fn single_student_is_never_flagged() {
    let store = four_student_course();
    let models = mean_models();
    let results = Scorer::new(&store, &models)
        .score(&ScoreRequest::for_students(vec![4]))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].recommendations, vec![KEEP_GOING.to_string()]);
}

#[tokio::test]
async fn missing_scope_fails_validation() {
    let store = four_student_course();
    let models = mean_models();
    let err = Scorer::new(&store, &models)
        .score(&ScoreRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::Validation(_)));
}

#[tokio::test]
async fn unavailable_models_fail_the_whole_request() {
    let store = four_student_course();
    let models = ModelSlot::Unavailable("regression.json missing".to_string());
    let err = Scorer::new(&store, &models)
        .score(&ScoreRequest::for_course(COURSE))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::ModelUnavailable(_)));
}

#[tokio::test]
async fn repeated_scoring_is_identical() {
    let store = four_student_course();
    let models = mean_models();
    let scorer = Scorer::new(&store, &models);
    let first = scorer.score(&ScoreRequest::for_course(COURSE)).await.unwrap();
    let second = scorer.score(&ScoreRequest::for_course(COURSE)).await.unwrap();
    assert_eq!(first, second);
}

struct CountingProvider {
    inner: InMemoryStudents,
    aggregate_calls: AtomicUsize,
}

#[async_trait]
impl StudentDataProvider for CountingProvider {
    async fn resolve_students(&self, scope: &CohortScope) -> anyhow::Result<Vec<StudentRef>> {
        self.inner.resolve_students(scope).await
    }

    async fn fetch_aggregates(&self, student_ids: &[i64]) -> anyhow::Result<Vec<StudentAggregate>> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_aggregates(student_ids).await
    }
}

#[tokio::test]
async fn aggregates_are_fetched_in_one_batch() {
    let provider = CountingProvider {
        inner: four_student_course(),
        aggregate_calls: AtomicUsize::new(0),
    };
    let models = mean_models();
    let results = Scorer::new(&provider, &models)
        .score(&ScoreRequest::for_course(COURSE))
        .await
        .unwrap();
    assert_eq!(results.len(), 4);
    assert_eq!(provider.aggregate_calls.load(Ordering::SeqCst), 1);
}

struct FailingProvider;

#[async_trait]
impl StudentDataProvider for FailingProvider {
    async fn resolve_students(&self, _scope: &CohortScope) -> anyhow::Result<Vec<StudentRef>> {
        anyhow::bail!("connection refused")
    }

    async fn fetch_aggregates(&self, _ids: &[i64]) -> anyhow::Result<Vec<StudentAggregate>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn provider_failures_surface_as_data_errors() {
    let models = mean_models();
    let err = Scorer::new(&FailingProvider, &models)
        .score(&ScoreRequest::for_course(COURSE))
        .await
        .unwrap_err();
    assert!(matches!(err, ScoringError::DataProvider(_)));
    assert!(err.to_string().contains("connection refused"));
}
