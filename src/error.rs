//! Error types for the scoring pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by a scoring request.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// The request did not name a course or any students.
    #[error("{0}")]
    Validation(String),

    /// Predictive models were not loaded at startup.
    #[error("prediction models unavailable: {0}")]
    ModelUnavailable(String),

    /// The student data source failed.
    #[error("failed to read student records: {0:#}")]
    DataProvider(anyhow::Error),
}

impl From<anyhow::Error> for ScoringError {
    fn from(err: anyhow::Error) -> Self {
        ScoringError::DataProvider(err)
    }
}

impl ScoringError {
    pub fn missing_scope() -> Self {
        ScoringError::Validation("Debes enviar curso_id o alumnos_ids.".to_string())
    }
}

/// Failures while loading model artifacts from disk.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("cannot read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model artifact {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed model artifact {}: {reason}", path.display())]
    Shape { path: PathBuf, reason: String },

    #[error("invalid model: {0}")]
    Invalid(String),
}
