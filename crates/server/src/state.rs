// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use reelforge_core::{ArtifactStore, Config, JobTracker};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// The in-memory job tracker; the only shared mutable state.
    pub tracker: Arc<JobTracker>,
    /// Artifact output directory handle (listing, deletion).
    pub artifacts: ArtifactStore,
}

impl AppState {
    /// Create application state from resolved configuration, wrapped in an
    /// `Arc` for sharing across handlers.
    pub fn new(config: &Config) -> Arc<Self> {
        let artifacts = ArtifactStore::new(&config.output_dir);
        Arc::new(Self {
            start_time: Instant::now(),
            tracker: Arc::new(JobTracker::new(
                config.generator.clone(),
                artifacts.clone(),
                config.timeout,
            )),
            artifacts,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
