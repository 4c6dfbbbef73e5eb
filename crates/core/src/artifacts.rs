// crates/core/src/artifacts.rs
//! Artifact store for generated videos.
//!
//! The generator writes finished videos into a single output directory. Each
//! job gets its own `<job_id>.mp4` filename, so association is exact; the
//! newest-file scan remains only as a fallback for generators that ignore
//! the output hint. Deletes are idempotent: callers clean up local copies
//! after migrating artifacts elsewhere, and a second delete must not fail.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;
use ts_rs::TS;

use crate::error::ArtifactError;
use crate::job::JobId;

/// File extension the store recognizes as a video artifact.
const ARTIFACT_EXT: &str = "mp4";

/// A generated video in the output directory.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified: String,
}

/// Handle on the generator output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the output directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.root).map_err(|e| ArtifactError::Io {
            path: self.root.clone(),
            source: e,
        })
    }

    /// The artifact filename owned by `job_id`.
    pub fn artifact_name(&self, job_id: JobId) -> String {
        format!("{job_id}.{ARTIFACT_EXT}")
    }

    /// Absolute path for an artifact filename.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Return `name` if that artifact exists on disk.
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.path_for(name).is_file().then(|| name.to_string())
    }

    /// Newest `.mp4` in the output directory by modification time.
    ///
    /// This is a heuristic with no job association; under concurrent jobs it
    /// can pick a foreign file. Used only when the job-specific artifact is
    /// absent.
    pub fn latest(&self) -> Result<Option<String>, ArtifactError> {
        let mut newest: Option<(SystemTime, String)> = None;
        for entry in self.read_dir()? {
            let entry = entry.map_err(|e| ArtifactError::Io {
                path: self.root.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| ArtifactError::Io {
                    path: path.clone(),
                    source: e,
                })?;
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, name.to_string()));
            }
        }
        Ok(newest.map(|(_, name)| name))
    }

    /// Delete an artifact by filename.
    ///
    /// Returns whether a file was actually removed; a missing file is a
    /// logged no-op, not an error. Names containing path separators are
    /// rejected before touching the filesystem.
    pub fn delete(&self, name: &str) -> Result<bool, ArtifactError> {
        validate_filename(name)?;
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(artifact = %name, "artifact deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(artifact = %name, "artifact already absent, nothing to delete");
                Ok(false)
            }
            Err(e) => Err(ArtifactError::Io { path, source: e }),
        }
    }

    /// List artifacts with sizes and modification times, newest first.
    pub fn list(&self) -> Result<Vec<ArtifactInfo>, ArtifactError> {
        let mut artifacts = Vec::new();
        for entry in self.read_dir()? {
            let entry = entry.map_err(|e| ArtifactError::Io {
                path: self.root.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXT) {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let meta = entry.metadata().map_err(|e| ArtifactError::Io {
                path: path.clone(),
                source: e,
            })?;
            let modified = meta.modified().map_err(|e| ArtifactError::Io {
                path: path.clone(),
                source: e,
            })?;
            artifacts.push(ArtifactInfo {
                name: name.to_string(),
                size_bytes: meta.len(),
                modified: DateTime::<Utc>::from(modified).to_rfc3339(),
            });
        }
        artifacts.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.name.cmp(&b.name)));
        Ok(artifacts)
    }

    fn read_dir(&self) -> Result<fs::ReadDir, ArtifactError> {
        fs::read_dir(&self.root).map_err(|e| ArtifactError::Io {
            path: self.root.clone(),
            source: e,
        })
    }
}

/// Reject names that could escape the output directory.
fn validate_filename(name: &str) -> Result<(), ArtifactError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(ArtifactError::InvalidFilename(name.to_string()));
    }
    Ok(())
}
