// crates/server/src/main.rs
//! Reelforge server binary.
//!
//! Resolves configuration from the environment, starts the Axum HTTP server,
//! and runs the periodic eviction sweep that drops terminal jobs after the
//! retention window.

use std::net::SocketAddr;

use anyhow::Result;
use reelforge_server::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reelforge=info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = reelforge_core::Config::from_env();

    let state = AppState::new(&config);
    state.artifacts.ensure_dir()?;

    let app = reelforge_server::create_app(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    eprintln!("\n\u{1f3ac} reelforge v{}\n", env!("CARGO_PKG_VERSION"));
    eprintln!("  \u{2192} http://localhost:{}", config.port);
    eprintln!(
        "  \u{2192} artifacts in {}\n",
        config.output_dir.display()
    );

    tracing::info!(
        port = config.port,
        output_dir = %config.output_dir.display(),
        generator = %config.generator.program,
        "server starting"
    );

    // Periodic eviction sweep. The tracker never self-schedules; retention
    // lives here so tests can drive evict_stale directly.
    let sweep_state = state.clone();
    let retention = config.retention;
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            sweep_state.tracker.evict_stale(retention);
        }
    });

    axum::serve(listener, app).await?;

    Ok(())
}
