use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::job::JobState;
use crate::models::request::{JobSummary, SubmitRequest, SubmitResponse};
use crate::services::orchestrator::{OrchestratorError, MAX_HISTORY};

/// POST /api/v1/explain — Start an explainability analysis.
pub async fn submit_explanation(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError(OrchestratorError::InvalidRequest(e.to_string())))?;

    let job_id = state
        .orchestrator
        .submit(&request.owner_id, &request.image_url)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: "processing".to_string(),
            message: "Explainability analysis submitted".to_string(),
        }),
    ))
}

/// GET /api/v1/explain/{owner_id}/{job_id} — Reconcile and report job status.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path((owner_id, job_id)): Path<(String, Uuid)>,
) -> Result<Json<JobState>, ApiError> {
    let record = state.orchestrator.reconcile(job_id, &owner_id).await?;
    Ok(Json(record.state))
}

/// GET /api/v1/explain/{owner_id} — Most recent jobs of an owner.
pub async fn list_jobs(
    State(state): State<AppState>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let records = state.orchestrator.history(&owner_id, MAX_HISTORY).await?;
    Ok(Json(records.into_iter().map(JobSummary::from).collect()))
}

/// Maps orchestrator failures to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OrchestratorError::SubmissionFailure(_) => StatusCode::BAD_GATEWAY,
            OrchestratorError::StorageFault(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = status.as_u16(), "Request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
