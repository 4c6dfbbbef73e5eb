//! API route handlers for the reelforge server.

pub mod artifacts;
pub mod generate;
pub mod health;
pub mod jobs;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - POST /api/generate - Submit a (topic, language) generation request
/// - GET /api/generate/status/{job_id} - Poll a job's status snapshot
/// - POST /api/generate/cancel/{job_id} - Cancel a running job
/// - GET /api/jobs - List active (non-terminal) jobs
/// - GET /api/jobs/stream - SSE stream of job progress updates
/// - GET /api/artifacts - List generated videos in the output directory
/// - DELETE /api/artifacts/{filename} - Delete a generated video (idempotent)
/// - GET /api/health - Health check
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", generate::router())
        .nest("/api", jobs::router())
        .nest("/api", artifacts::router())
        .with_state(state)
}
