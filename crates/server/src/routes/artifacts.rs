// crates/server/src/routes/artifacts.rs
//! Artifact management endpoints.
//!
//! Deletion is idempotent: callers migrate finished videos to remote storage
//! and then clean up the local copy, so a second delete of the same name
//! must succeed even though nothing is removed.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Serialize;
use ts_rs::TS;

use reelforge_core::ArtifactInfo;

use crate::error::ApiResult;
use crate::state::AppState;

/// Response to an artifact deletion request.
#[derive(Debug, Serialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct DeleteArtifactResponse {
    /// Whether a file was actually removed; false means it was already gone.
    pub deleted: bool,
}

/// GET /api/artifacts - List generated videos, newest first.
pub async fn list_artifacts(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ArtifactInfo>>> {
    Ok(Json(state.artifacts.list()?))
}

/// DELETE /api/artifacts/{filename} - Delete a generated video.
///
/// Succeeds whether or not the file exists; rejects names that would escape
/// the output directory.
pub async fn delete_artifact(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult<Json<DeleteArtifactResponse>> {
    let deleted = state.artifacts.delete(&filename)?;
    Ok(Json(DeleteArtifactResponse { deleted }))
}

/// Build the artifacts router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/artifacts", get(list_artifacts))
        .route("/artifacts/{filename}", delete(delete_artifact))
}
