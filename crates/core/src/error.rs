// crates/core/src/error.rs
//! Error types shared across the core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from a single generator subprocess run.
///
/// Every variant is terminal for the job that owns the run: the tracker
/// captures the message into the job's `error` field and never retries.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Failed to spawn generator `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write generator input: {0}")]
    InputFailed(std::io::Error),

    #[error("Failed to read generator output: {0}")]
    OutputFailed(std::io::Error),

    #[error("Generator exited with status {code}")]
    ExitStatus { code: i32 },

    #[error("Generator killed by signal")]
    Killed,

    #[error("Generator timed out after {0} seconds")]
    Timeout(u64),

    #[error("Cancelled by caller")]
    Cancelled,
}

/// Errors from artifact-store operations.
///
/// A missing file on delete is NOT an error (idempotent delete); only
/// malformed names and real IO failures surface here.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact filename: {0}")]
    InvalidFilename(String),

    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rejection of a `submit` request before any job is created.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Topic must not be empty")]
    EmptyTopic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_error_display() {
        let err = GenerateError::ExitStatus { code: 3 };
        assert_eq!(err.to_string(), "Generator exited with status 3");

        let err = GenerateError::Timeout(600);
        assert_eq!(err.to_string(), "Generator timed out after 600 seconds");

        let err = GenerateError::Cancelled;
        assert_eq!(err.to_string(), "Cancelled by caller");
    }

    #[test]
    fn test_artifact_error_display() {
        let err = ArtifactError::InvalidFilename("../etc/passwd".to_string());
        assert!(err.to_string().contains("../etc/passwd"));
    }

    #[test]
    fn test_spawn_failed_preserves_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = GenerateError::SpawnFailed {
            program: "python3".to_string(),
            source: io,
        };
        assert!(err.to_string().contains("python3"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
