// crates/core/src/job.rs
//! Job model for tracked video generations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use ts_rs::TS;
use uuid::Uuid;

use crate::language::Language;
use crate::stage::{stage_message, FINAL_STAGE};

/// Unique identifier for a job. Generated at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Status of a tracked job.
///
/// `Completed` and `Error` are terminal: no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// A tracked unit of asynchronous work wrapping one generator invocation.
///
/// Owned by the `JobTracker`; mutated only under its lock. `topic` and
/// `language` are immutable after creation.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub topic: String,
    pub language: Language,
    status: JobStatus,
    stage: u8,
    message: String,
    result_path: Option<String>,
    error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Instant,
}

impl Job {
    pub fn new(id: JobId, topic: String, language: Language) -> Self {
        Self {
            id,
            topic,
            language,
            status: JobStatus::Pending,
            stage: 0,
            message: stage_message(0).to_string(),
            result_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: Instant::now(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn stage(&self) -> u8 {
        self.stage
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition `Pending -> Processing` when the background task starts.
    pub fn set_processing(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Processing;
            self.message = "Starting generator".to_string();
        }
    }

    /// Advance to `stage` and update the message.
    ///
    /// Progress is monotonic: a stage at or below the current one is
    /// rejected, as is any update once the job is terminal. Returns whether
    /// the stage was applied.
    pub fn advance_stage(&mut self, stage: u8) -> bool {
        if self.is_terminal() || stage <= self.stage || stage > FINAL_STAGE {
            return false;
        }
        self.stage = stage;
        self.message = stage_message(stage).to_string();
        true
    }

    /// Mark the job completed, pinning the stage to the terminal value.
    ///
    /// `result_path` stays `None` when no artifact could be located; that is
    /// still a successful completion and callers must handle the absence.
    /// No-op on an already-terminal job.
    pub fn complete(&mut self, result_path: Option<String>) {
        if self.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.stage = FINAL_STAGE;
        self.message = stage_message(FINAL_STAGE).to_string();
        self.result_path = result_path;
    }

    /// Mark the job failed. No-op on an already-terminal job.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let error = error.into();
        self.status = JobStatus::Error;
        self.message = error.clone();
        self.error = Some(error);
    }

    /// Wire-format snapshot of the current state.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.to_string(),
            topic: self.topic.clone(),
            language: self.language,
            status: self.status,
            stage: self.stage,
            message: self.message.clone(),
            result_url: self.result_path.clone(),
            error: self.error.clone(),
            started_at: self.created_at.to_rfc3339(),
        }
    }

    /// Wire-format progress event for the SSE stream.
    pub fn progress(&self) -> JobProgress {
        JobProgress {
            job_id: self.id.to_string(),
            status: self.status,
            stage: self.stage,
            message: self.message.clone(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Snapshot of a job returned by the status endpoint.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[cfg_attr(test, derive(serde::Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub job_id: String,
    pub topic: String,
    pub language: Language,
    pub status: JobStatus,
    pub stage: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
}

/// Progress update sent via SSE.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = "../../frontend/src/types/generated/")]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: u8,
    pub message: String,
    pub timestamp: String,
}
