// crates/core/src/config.rs
//! Service configuration, resolved from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::generator::GeneratorCommand;

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 47618;

/// URL prefix under which the artifact directory is served; `resultUrl`
/// values are formed against this.
pub const PUBLIC_VIDEO_PREFIX: &str = "/videos";

/// Runtime configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port.
    pub port: u16,
    /// Directory the generator writes artifacts into.
    pub output_dir: PathBuf,
    /// External generator executable.
    pub generator: GeneratorCommand,
    /// Hard deadline for one generator run.
    pub timeout: Duration,
    /// How long terminal jobs stay queryable before eviction.
    pub retention: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
}

impl Config {
    /// Resolve configuration from environment variables, with defaults for
    /// local development.
    ///
    /// - `REELFORGE_PORT` (or `PORT`) — listen port
    /// - `REELFORGE_OUTPUT_DIR` — artifact directory (default `generated_videos`)
    /// - `REELFORGE_GENERATOR` — generator program (default `python3`)
    /// - `REELFORGE_GENERATOR_ARGS` — whitespace-separated fixed arguments
    ///   (default `generator/main.py`)
    /// - `REELFORGE_TIMEOUT_SECS` — per-run deadline (default 900)
    /// - `REELFORGE_RETENTION_SECS` — terminal-job retention (default 3600)
    /// - `REELFORGE_SWEEP_SECS` — eviction sweep interval (default 60)
    pub fn from_env() -> Self {
        let port = std::env::var("REELFORGE_PORT")
            .ok()
            .or_else(|| std::env::var("PORT").ok())
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let output_dir = std::env::var("REELFORGE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("generated_videos"));

        let program =
            std::env::var("REELFORGE_GENERATOR").unwrap_or_else(|_| "python3".to_string());
        let args: Vec<String> = match std::env::var("REELFORGE_GENERATOR_ARGS") {
            Ok(raw) => raw.split_whitespace().map(str::to_string).collect(),
            Err(_) => vec!["generator/main.py".to_string()],
        };

        Self {
            port,
            output_dir,
            generator: GeneratorCommand::new(program).with_args(args),
            timeout: Duration::from_secs(env_u64("REELFORGE_TIMEOUT_SECS", 900)),
            retention: Duration::from_secs(env_u64("REELFORGE_RETENTION_SECS", 3600)),
            sweep_interval: Duration::from_secs(env_u64("REELFORGE_SWEEP_SECS", 60)),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
