use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::ScoringError;
use crate::predictor::ModelSlot;
use crate::provider::StudentDataProvider;
use crate::report::{to_rows, PredictionRow};
use crate::scoring::{ScoreRequest, Scorer};

pub struct AppState {
    pub data: Arc<dyn StudentDataProvider>,
    pub models: ModelSlot,
}

impl ScoringError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScoringError::Validation(_) => StatusCode::BAD_REQUEST,
            ScoringError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ScoringError::DataProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScoringError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "scoring request failed");
        } else {
            warn!(error = %self, "scoring request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/mlmodel/", post(predict))
        .with_state(state)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let models = match &state.models {
        ModelSlot::Ready(_) => "ready",
        ModelSlot::Unavailable(_) => "unavailable",
    };
    Json(json!({ "status": "ok", "models": models }))
}

/// Scores the requested cohort. A request without a JSON body is treated as
/// empty and fails scope validation like `{}` does.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Result<Json<Vec<PredictionRow>>, ScoringError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => ScoreRequest::default(),
        Err(rejection) => return Err(ScoringError::Validation(rejection.body_text())),
    };
    let scorer = Scorer::new(state.data.as_ref(), &state.models);
    let results = scorer.score(&request).await?;
    Ok(Json(to_rows(&results)))
}

pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("scoring service listening on {addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
