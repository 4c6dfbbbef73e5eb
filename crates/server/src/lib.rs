// crates/server/src/lib.rs
//! Reelforge server library.
//!
//! Axum-based HTTP layer over the core job tracker: submit generation
//! requests, poll or stream job progress, and manage the artifact directory,
//! which is also served statically under `/videos`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use reelforge_core::PUBLIC_VIDEO_PREFIX;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (generate, jobs, artifacts, health)
/// - Static serving of the artifact directory under `/videos`
/// - CORS for the mobile dev client (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let videos = ServeDir::new(state.artifacts.root());

    Router::new()
        .merge(api_routes(state))
        .nest_service(PUBLIC_VIDEO_PREFIX, videos)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
