use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::models::{CohortScope, StudentAggregate, StudentRef};
use crate::provider::StudentDataProvider;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed student records.
#[derive(Debug, Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const AGGREGATE_QUERY: &str = r#"
    WITH requested AS (
        SELECT UNNEST($1::BIGINT[]) AS alumno_id
    ),
    grades AS (
        SELECT i.alumno_id, AVG(n.calificacion)::FLOAT8 AS mean_grade
        FROM gestion_escolar.nota n
        JOIN gestion_escolar.inscripcion i ON i.id = n.inscripcion_id
        WHERE i.alumno_id = ANY($1)
        GROUP BY i.alumno_id
    ),
    participation AS (
        SELECT i.alumno_id, AVG(p.puntuacion)::FLOAT8 AS mean_participation
        FROM gestion_escolar.participacion p
        JOIN gestion_escolar.inscripcion i ON i.id = p.inscripcion_id
        WHERE i.alumno_id = ANY($1)
        GROUP BY i.alumno_id
    ),
    attendance AS (
        SELECT i.alumno_id,
               COUNT(*) AS attendance_total,
               COUNT(*) FILTER (WHERE a.estado = 'Presente') AS attendance_present
        FROM gestion_escolar.asistencia a
        JOIN gestion_escolar.inscripcion i ON i.id = a.inscripcion_id
        WHERE i.alumno_id = ANY($1)
        GROUP BY i.alumno_id
    )
    SELECT r.alumno_id,
           g.mean_grade,
           p.mean_participation,
           COALESCE(att.attendance_total, 0)::BIGINT AS attendance_total,
           COALESCE(att.attendance_present, 0)::BIGINT AS attendance_present
    FROM requested r
    LEFT JOIN grades g ON g.alumno_id = r.alumno_id
    LEFT JOIN participation p ON p.alumno_id = r.alumno_id
    LEFT JOIN attendance att ON att.alumno_id = r.alumno_id
"#;

#[async_trait]
impl StudentDataProvider for PgStudentStore {
    async fn resolve_students(&self, scope: &CohortScope) -> anyhow::Result<Vec<StudentRef>> {
        let rows = match scope {
            CohortScope::Students(ids) => {
                sqlx::query(
                    "SELECT id, nombre, apellido FROM gestion_escolar.alumno \
                     WHERE id = ANY($1) ORDER BY id",
                )
                .bind(ids)
                .fetch_all(&self.pool)
                .await
            }
            CohortScope::Course(course_id) => {
                sqlx::query(
                    "SELECT DISTINCT a.id, a.nombre, a.apellido \
                     FROM gestion_escolar.alumno a \
                     JOIN gestion_escolar.inscripcion i ON i.alumno_id = a.id \
                     WHERE i.curso_id = $1 ORDER BY a.id",
                )
                .bind(course_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .with_context(|| format!("failed to resolve students for {scope}"))?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            let nombre: String = row.try_get("nombre")?;
            let apellido: String = row.try_get("apellido")?;
            students.push(StudentRef {
                id: row.try_get("id")?,
                display_name: format!("{nombre} {apellido}"),
            });
        }

        Ok(students)
    }

    async fn fetch_aggregates(&self, student_ids: &[i64]) -> anyhow::Result<Vec<StudentAggregate>> {
        let rows = sqlx::query(AGGREGATE_QUERY)
            .bind(student_ids)
            .fetch_all(&self.pool)
            .await
            .context("failed to aggregate student records")?;

        let mut aggregates = Vec::with_capacity(rows.len());
        for row in rows {
            aggregates.push(StudentAggregate {
                student_id: row.try_get("alumno_id")?,
                mean_grade: row.try_get("mean_grade")?,
                mean_participation: row.try_get("mean_participation")?,
                attendance_total: row.try_get("attendance_total")?,
                attendance_present: row.try_get("attendance_present")?,
            });
        }

        Ok(aggregates)
    }
}
