// crates/core/src/tracker.rs
//! In-memory job tracker.
//!
//! The tracker owns the only shared mutable state in the service: the
//! `JobId -> Job` map. `submit` inserts a `Pending` job and spawns the
//! background run, which drives the generator subprocess and mutates the job
//! through the tracker's lock. Jobs are never persisted: a process restart
//! loses all of them, which is acceptable for this single-process deployment.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};

use crate::artifacts::ArtifactStore;
use crate::config::PUBLIC_VIDEO_PREFIX;
use crate::error::SubmitError;
use crate::generator::{run_generator, GeneratorCommand};
use crate::job::{Job, JobId, JobProgress, JobSnapshot};
use crate::language::Language;

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The running subprocess was signalled to stop.
    Cancelled,
    /// No job with that id exists.
    NotFound,
    /// The job already reached a terminal state (or is finishing right now).
    AlreadyFinished,
}

struct JobEntry {
    job: Job,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// Central tracker for video-generation jobs.
///
/// Thread-safe via `Arc` wrapping; all lock acquisitions are short and never
/// held across await points.
pub struct JobTracker {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    progress_tx: broadcast::Sender<JobProgress>,
    generator: GeneratorCommand,
    artifacts: ArtifactStore,
    timeout: Duration,
}

impl JobTracker {
    pub fn new(generator: GeneratorCommand, artifacts: ArtifactStore, timeout: Duration) -> Self {
        let (progress_tx, _) = broadcast::channel(256);
        Self {
            jobs: RwLock::new(HashMap::new()),
            progress_tx,
            generator,
            artifacts,
            timeout,
        }
    }

    /// Accept a `(topic, language)` request and start the background run.
    ///
    /// Returns the fresh job id immediately; never waits on the subprocess.
    /// An empty topic is rejected before any job is created.
    pub fn submit(self: &Arc<Self>, topic: &str, language: Language) -> Result<JobId, SubmitError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SubmitError::EmptyTopic);
        }

        let id = JobId::new();
        let job = Job::new(id, topic.to_string(), language);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(
                    id,
                    JobEntry {
                        job,
                        cancel_tx: Some(cancel_tx),
                    },
                );
            }
            Err(e) => tracing::error!("RwLock poisoned inserting job: {e}"),
        }

        tracing::info!(job_id = %id, topic = %topic, language = %language, "job submitted");

        let tracker = Arc::clone(self);
        let topic = topic.to_string();
        tokio::spawn(async move {
            tracker.run_job(id, topic, language, cancel_rx).await;
        });

        Ok(id)
    }

    /// Current snapshot of a job, or `None` for an unknown id.
    pub fn get(&self, id: JobId) -> Option<JobSnapshot> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(&id).map(|e| e.job.snapshot()),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                None
            }
        }
    }

    /// Snapshots of all non-terminal jobs.
    pub fn active(&self) -> Vec<JobSnapshot> {
        match self.jobs.read() {
            Ok(jobs) => jobs
                .values()
                .filter(|e| !e.job.is_terminal())
                .map(|e| e.job.snapshot())
                .collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading jobs map: {e}");
                Vec::new()
            }
        }
    }

    /// Signal a running job's subprocess to stop.
    ///
    /// The job itself terminates as `Error` once the background run observes
    /// the cancellation.
    pub fn cancel(&self, id: JobId) -> CancelOutcome {
        match self.jobs.write() {
            Ok(mut jobs) => {
                let Some(entry) = jobs.get_mut(&id) else {
                    return CancelOutcome::NotFound;
                };
                if entry.job.is_terminal() {
                    return CancelOutcome::AlreadyFinished;
                }
                match entry.cancel_tx.take() {
                    Some(tx) => {
                        if tx.send(()).is_ok() {
                            tracing::info!(job_id = %id, "job cancellation requested");
                            CancelOutcome::Cancelled
                        } else {
                            CancelOutcome::AlreadyFinished
                        }
                    }
                    None => CancelOutcome::AlreadyFinished,
                }
            }
            Err(e) => {
                tracing::error!("RwLock poisoned cancelling job: {e}");
                CancelOutcome::NotFound
            }
        }
    }

    /// Remove terminal jobs older than `max_age`. Returns how many were
    /// evicted. `Pending`/`Processing` jobs are retained regardless of age;
    /// in-flight work must never be lost track of.
    pub fn evict_stale(&self, max_age: Duration) -> usize {
        match self.jobs.write() {
            Ok(mut jobs) => {
                let before = jobs.len();
                jobs.retain(|id, e| {
                    let stale = e.job.is_terminal() && e.job.started_at.elapsed() > max_age;
                    if stale {
                        tracing::debug!(job_id = %id, "evicting stale job");
                    }
                    !stale
                });
                let evicted = before - jobs.len();
                if evicted > 0 {
                    tracing::info!(evicted, "evicted stale jobs");
                }
                evicted
            }
            Err(e) => {
                tracing::error!("RwLock poisoned evicting jobs: {e}");
                0
            }
        }
    }

    /// Subscribe to progress updates for all jobs (SSE streaming).
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgress> {
        self.progress_tx.subscribe()
    }

    async fn run_job(
        self: Arc<Self>,
        id: JobId,
        topic: String,
        language: Language,
        cancel_rx: oneshot::Receiver<()>,
    ) {
        self.with_job(id, |job| {
            job.set_processing();
            true
        });

        let output_name = self.artifacts.artifact_name(id);
        let output_path = self.artifacts.path_for(&output_name);

        let result = run_generator(
            &self.generator,
            language,
            &topic,
            &output_path,
            self.timeout,
            cancel_rx,
            |stage| self.advance_stage(id, stage),
        )
        .await;

        match result {
            Ok(()) => {
                let result_url = self.locate_artifact(id, &output_name);
                self.with_job(id, |job| {
                    job.complete(result_url.clone());
                    true
                });
                tracing::info!(job_id = %id, result = ?result_url, "job completed");
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "job failed");
                self.with_job(id, |job| {
                    job.fail(e.to_string());
                    true
                });
            }
        }
    }

    /// Apply a stage marker observed on generator stdout.
    ///
    /// Regressions (markers arriving out of pipeline order) are dropped and
    /// logged instead of moving the stage backward.
    fn advance_stage(&self, id: JobId, stage: u8) {
        let applied = self.with_job(id, |job| {
            let applied = job.advance_stage(stage);
            if !applied {
                tracing::warn!(
                    job_id = %id,
                    marker_stage = stage,
                    current_stage = job.stage(),
                    "dropping out-of-order stage marker"
                );
            }
            applied
        });
        if applied {
            tracing::debug!(job_id = %id, stage, "stage advanced");
        }
    }

    /// Locate the artifact a completed run produced.
    ///
    /// The job-specific filename is authoritative; the newest-file scan only
    /// covers generators that ignore the output hint. `None` means the run
    /// completed without a locatable artifact.
    fn locate_artifact(&self, id: JobId, output_name: &str) -> Option<String> {
        let found = self.artifacts.resolve(output_name).or_else(|| {
            match self.artifacts.latest() {
                Ok(latest) => {
                    if latest.is_some() {
                        tracing::warn!(
                            job_id = %id,
                            "generator ignored output hint, falling back to newest artifact"
                        );
                    }
                    latest
                }
                Err(e) => {
                    tracing::error!(job_id = %id, error = %e, "artifact scan failed");
                    None
                }
            }
        });
        match found {
            Some(name) => Some(format!("{PUBLIC_VIDEO_PREFIX}/{name}")),
            None => {
                tracing::warn!(job_id = %id, "job completed but no artifact was found");
                None
            }
        }
    }

    /// Run `f` against the job under the write lock, then broadcast the
    /// job's progress if `f` reported a change.
    fn with_job<F>(&self, id: JobId, f: F) -> bool
    where
        F: FnOnce(&mut Job) -> bool,
    {
        let progress = match self.jobs.write() {
            Ok(mut jobs) => match jobs.get_mut(&id) {
                Some(entry) => {
                    let changed = f(&mut entry.job);
                    if changed && entry.job.is_terminal() {
                        // Terminal jobs can no longer be cancelled.
                        entry.cancel_tx = None;
                    }
                    changed.then(|| entry.job.progress())
                }
                None => None,
            },
            Err(e) => {
                tracing::error!("RwLock poisoned updating job: {e}");
                None
            }
        };
        match progress {
            Some(p) => {
                // No subscribers is fine.
                let _ = self.progress_tx.send(p);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    fn sh(script: &str) -> GeneratorCommand {
        GeneratorCommand::new("/bin/sh").with_args(["-c", script])
    }

    fn tracker_with(script: &str) -> (tempfile::TempDir, Arc<JobTracker>) {
        tracker_with_timeout(script, Duration::from_secs(10))
    }

    fn tracker_with_timeout(script: &str, timeout: Duration) -> (tempfile::TempDir, Arc<JobTracker>) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new(
            sh(script),
            ArtifactStore::new(dir.path()),
            timeout,
        ));
        (dir, tracker)
    }

    /// Poll until the job reaches a terminal state.
    async fn wait_terminal(tracker: &JobTracker, id: JobId) -> JobSnapshot {
        for _ in 0..250 {
            if let Some(snap) = tracker.get(id) {
                if snap.status.is_terminal() {
                    return snap;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {id} did not reach a terminal state");
    }

    #[tokio::test]
    async fn test_submit_returns_promptly_with_unique_ids() {
        let (_dir, tracker) = tracker_with("sleep 5");

        let a = tracker.submit("Blasting Safety", Language::En).unwrap();
        let b = tracker.submit("Gas Detection", Language::Hi).unwrap();

        assert_ne!(a, b);
        // Neither job has had time to finish; submit did not block on them.
        assert!(!tracker.get(a).unwrap().status.is_terminal());
        assert!(!tracker.get(b).unwrap().status.is_terminal());
    }

    #[tokio::test]
    async fn test_empty_topic_rejected_without_creating_a_job() {
        let (_dir, tracker) = tracker_with("true");

        assert!(matches!(
            tracker.submit("   ", Language::En),
            Err(SubmitError::EmptyTopic)
        ));
        assert!(tracker.active().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (_dir, tracker) = tracker_with("true");
        assert!(tracker.get(JobId::new()).is_none());
    }

    #[tokio::test]
    async fn test_successful_run_completes_with_artifact() {
        let (_dir, tracker) = tracker_with(
            r#"read l; read t; echo "Generating script"; echo "Video generation complete"; : > "$REELFORGE_OUTPUT""#,
        );

        let id = tracker.submit("Blasting Safety", Language::En).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.stage, 5);
        assert_eq!(snap.result_url.as_deref(), Some(&*format!("/videos/{id}.mp4")));
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_successful_run_without_artifact_completes_unset() {
        let (_dir, tracker) = tracker_with("read l; read t; exit 0");

        let id = tracker.submit("Ventilation", Language::Ta).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Completed);
        assert!(snap.result_url.is_none());
        assert!(snap.error.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_with_code_in_message() {
        let (_dir, tracker) = tracker_with("exit 2");

        let id = tracker.submit("Haulage", Language::En).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.error.as_deref().unwrap().contains('2'));
        assert!(snap.result_url.is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Arc::new(JobTracker::new(
            GeneratorCommand::new("/nonexistent/generator-bin"),
            ArtifactStore::new(dir.path()),
            Duration::from_secs(10),
        ));

        let id = tracker.submit("Winching", Language::En).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.error.as_deref().unwrap().contains("spawn"));
    }

    #[tokio::test]
    async fn test_out_of_order_markers_never_regress_the_stage() {
        // Markers arrive out of pipeline order, then the run fails so the
        // stage is not pinned by completion.
        let (_dir, tracker) = tracker_with(
            r#"echo "Encoding video"; echo "Generating script"; exit 1"#,
        );

        let id = tracker.submit("Drilling", Language::En).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.stage, 4);
    }

    #[tokio::test]
    async fn test_terminal_status_is_stable() {
        let (_dir, tracker) = tracker_with("exit 1");

        let id = tracker.submit("Rock Bolting", Language::En).unwrap();
        let first = wait_terminal(&tracker, id).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = tracker.get(id).unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.error, second.error);
    }

    #[tokio::test]
    async fn test_evict_stale_removes_only_old_terminal_jobs() {
        let (_dir, tracker) = tracker_with("true");

        let done = tracker.submit("Finished", Language::En).unwrap();
        wait_terminal(&tracker, done).await;

        let (_dir2, slow) = tracker_with("sleep 10");
        let running = slow.submit("Still Running", Language::En).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Terminal job older than zero age is evicted.
        assert_eq!(tracker.evict_stale(Duration::ZERO), 1);
        assert!(tracker.get(done).is_none());

        // An in-flight job is never evicted regardless of age.
        assert_eq!(slow.evict_stale(Duration::ZERO), 0);
        assert!(slow.get(running).is_some());
    }

    #[tokio::test]
    async fn test_evict_stale_retains_recent_terminal_jobs() {
        let (_dir, tracker) = tracker_with("true");
        let id = tracker.submit("Recent", Language::En).unwrap();
        wait_terminal(&tracker, id).await;

        assert_eq!(tracker.evict_stale(Duration::from_secs(3600)), 0);
        assert!(tracker.get(id).is_some());
    }

    #[tokio::test]
    async fn test_cancel_kills_a_running_job() {
        let (_dir, tracker) = tracker_with("sleep 30");

        let id = tracker.submit("Long Haul", Language::En).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(tracker.cancel(id), CancelOutcome::Cancelled);
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.error.as_deref().unwrap().contains("Cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_or_terminal_job_is_rejected() {
        let (_dir, tracker) = tracker_with("true");

        assert_eq!(tracker.cancel(JobId::new()), CancelOutcome::NotFound);

        let id = tracker.submit("Quick", Language::En).unwrap();
        wait_terminal(&tracker, id).await;
        assert_eq!(tracker.cancel(id), CancelOutcome::AlreadyFinished);
    }

    #[tokio::test]
    async fn test_timeout_fails_a_hung_job() {
        let (_dir, tracker) = tracker_with_timeout("sleep 30", Duration::from_millis(100));

        let id = tracker.submit("Hung", Language::En).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Error);
        assert!(snap.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_active_lists_only_non_terminal_jobs() {
        let (_dir, tracker) = tracker_with("sleep 5");
        let running = tracker.submit("Running", Language::En).unwrap();

        let (_dir2, quick) = tracker_with("true");
        let done = quick.submit("Done", Language::En).unwrap();
        wait_terminal(&quick, done).await;

        let active = tracker.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].job_id, running.to_string());
        assert!(quick.active().is_empty());
    }

    #[tokio::test]
    async fn test_progress_events_are_broadcast() {
        let (_dir, tracker) = tracker_with(
            r#"echo "Generating script"; echo "Video generation complete""#,
        );
        let mut rx = tracker.subscribe();

        let id = tracker.submit("Broadcast", Language::En).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for progress")
            .expect("channel closed");
        assert_eq!(event.job_id, id.to_string());
    }

    #[tokio::test]
    async fn test_spec_scenario_stage_one_then_five_then_exit_zero() {
        let (_dir, tracker) = tracker_with(
            r#"read l; read t; echo "Generating script"; echo "Video generation complete"; exit 0"#,
        );

        let id = tracker.submit("Blasting Safety", Language::En).unwrap();
        let snap = wait_terminal(&tracker, id).await;

        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.stage, 5);
    }
}
