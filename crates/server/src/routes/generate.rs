// crates/server/src/routes/generate.rs
//! Video generation endpoints: submit, status polling, cancellation.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use reelforge_core::{CancelOutcome, JobId, JobSnapshot, Language};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of a generation request.
#[derive(Debug, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Serialize))]
pub struct GenerateRequest {
    pub topic: String,
    pub language: String,
}

/// Response to an accepted generation request.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: String,
}

/// Response to a cancellation request.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// POST /api/generate - Submit a generation request.
///
/// Validates synchronously (empty topic, unsupported language) and returns
/// 202 Accepted with the job id; the subprocess runs in the background.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<GenerateResponse>)> {
    let language: Language = request
        .language
        .parse()
        .map_err(|e: reelforge_core::UnknownLanguage| ApiError::BadRequest(e.to_string()))?;

    let job_id = state.tracker.submit(&request.topic, language)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

/// GET /api/generate/status/{job_id} - Poll a job's current snapshot.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&job_id)?;
    state
        .tracker
        .get(id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(job_id))
}

/// POST /api/generate/cancel/{job_id} - Cancel a running job.
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    let id = parse_job_id(&job_id)?;
    match state.tracker.cancel(id) {
        CancelOutcome::Cancelled => Ok(Json(CancelResponse { cancelled: true })),
        CancelOutcome::NotFound => Err(ApiError::JobNotFound(job_id)),
        CancelOutcome::AlreadyFinished => Err(ApiError::Conflict(format!(
            "Job {job_id} already finished"
        ))),
    }
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid job id: {raw}")))
}

/// Build the generation router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(submit))
        .route("/generate/status/{job_id}", get(status))
        .route("/generate/cancel/{job_id}", post(cancel))
}
