// crates/core/src/generator.rs
//! Generator subprocess runner.
//!
//! Spawns the external video-generation executable, feeds it the language
//! menu code and topic as two stdin lines, then watches stdout for stage
//! markers until the process exits. The job-specific artifact path is handed
//! to the child via `REELFORGE_OUTPUT` so the tracker never has to guess
//! which file a run produced.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;

use crate::error::GenerateError;
use crate::language::Language;
use crate::stage::match_marker;

/// Environment variable carrying the job-specific artifact path to the child.
pub const OUTPUT_ENV: &str = "REELFORGE_OUTPUT";

/// The external generator executable and its fixed arguments.
#[derive(Debug, Clone)]
pub struct GeneratorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl GeneratorCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Run one generator invocation to completion.
///
/// `on_stage` is called with each stage marker observed on stdout; ordering
/// discipline (monotonic application) is the caller's responsibility. stderr
/// lines are logged at warn level. The child is killed when the run is
/// cancelled or exceeds `timeout`; `kill_on_drop` covers both select arms.
pub async fn run_generator<F>(
    command: &GeneratorCommand,
    language: Language,
    topic: &str,
    output_path: &Path,
    timeout: Duration,
    cancel_rx: oneshot::Receiver<()>,
    mut on_stage: F,
) -> Result<(), GenerateError>
where
    F: FnMut(u8),
{
    tracing::info!(
        program = %command.program,
        language = %language,
        output = %output_path.display(),
        "generator: spawning"
    );

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .env(OUTPUT_ENV, output_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| {
        tracing::error!(program = %command.program, error = %e, "generator: failed to spawn");
        GenerateError::SpawnFailed {
            program: command.program.clone(),
            source: e,
        }
    })?;

    // Two lines of input, then close the pipe: the generator runs to
    // completion with no further interaction.
    let mut stdin = child.stdin.take().ok_or_else(|| {
        GenerateError::InputFailed(std::io::Error::other("failed to capture stdin"))
    })?;
    let input = format!("{}\n{}\n", language.menu_code(), topic);
    if let Err(e) = stdin.write_all(input.as_bytes()).await {
        // A generator that exits without consuming its input closes the pipe;
        // its exit status is the meaningful signal, not the broken write.
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            return Err(GenerateError::InputFailed(e));
        }
        tracing::debug!("generator closed stdin before reading input");
    }
    drop(stdin);

    let stdout = child.stdout.take().ok_or_else(|| {
        GenerateError::OutputFailed(std::io::Error::other("failed to capture stdout"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        GenerateError::OutputFailed(std::io::Error::other("failed to capture stderr"))
    })?;

    // stderr is diagnostic only; drain it so the child never blocks on a
    // full pipe.
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(line = %line, "generator: stderr");
        }
    });

    let drive = async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(GenerateError::OutputFailed)?
        {
            tracing::debug!(line = %line, "generator: stdout");
            if let Some(stage) = match_marker(&line) {
                on_stage(stage);
            }
        }

        let status = child.wait().await.map_err(GenerateError::OutputFailed)?;
        if status.success() {
            Ok(())
        } else {
            match status.code() {
                Some(code) => Err(GenerateError::ExitStatus { code }),
                None => Err(GenerateError::Killed),
            }
        }
    };
    tokio::pin!(drive);

    tokio::select! {
        res = &mut drive => res,
        _ = tokio::time::sleep(timeout) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "generator: timed out");
            Err(GenerateError::Timeout(timeout.as_secs()))
        }
        _ = cancel_rx => {
            tracing::info!("generator: cancelled");
            Err(GenerateError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Shell stub standing in for the generator binary.
    fn sh(script: &str) -> GeneratorCommand {
        GeneratorCommand::new("/bin/sh").with_args(["-c", script])
    }

    fn never_cancelled() -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        std::mem::forget(tx);
        rx
    }

    #[tokio::test]
    async fn test_stages_reported_in_stdout_order() {
        let cmd = sh(r#"read lang; read topic; echo "Generating script"; echo "Encoding video"; echo "Video generation complete""#);
        let mut stages = Vec::new();

        let result = run_generator(
            &cmd,
            Language::En,
            "Blasting Safety",
            Path::new("/tmp/unused.mp4"),
            Duration::from_secs(10),
            never_cancelled(),
            |s| stages.push(s),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(stages, vec![1, 4, 5]);
    }

    #[tokio::test]
    async fn test_stdin_contract_and_output_env() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("artifact.mp4");
        let cmd = sh(r#"read lang; read topic; printf '%s:%s' "$lang" "$topic" > "$REELFORGE_OUTPUT""#);

        let result = run_generator(
            &cmd,
            Language::Hi,
            "Gas Detection",
            &out,
            Duration::from_secs(10),
            never_cancelled(),
            |_| {},
        )
        .await;

        assert!(result.is_ok());
        let written = std::fs::read_to_string(&out).unwrap();
        assert_eq!(written, "2:Gas Detection");
    }

    #[tokio::test]
    async fn test_nonzero_exit_carries_the_code() {
        let cmd = sh("exit 3");
        let result = run_generator(
            &cmd,
            Language::En,
            "t",
            Path::new("/tmp/unused.mp4"),
            Duration::from_secs(10),
            never_cancelled(),
            |_| {},
        )
        .await;

        match result {
            Err(GenerateError::ExitStatus { code }) => assert_eq!(code, 3),
            other => panic!("expected ExitStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let cmd = GeneratorCommand::new("/nonexistent/generator-bin");
        let result = run_generator(
            &cmd,
            Language::En,
            "t",
            Path::new("/tmp/unused.mp4"),
            Duration::from_secs(10),
            never_cancelled(),
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(GenerateError::SpawnFailed { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_a_hung_generator() {
        let cmd = sh("sleep 30");
        let result = run_generator(
            &cmd,
            Language::En,
            "t",
            Path::new("/tmp/unused.mp4"),
            Duration::from_millis(100),
            never_cancelled(),
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(GenerateError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_a_running_generator() {
        let cmd = sh("sleep 30");
        let (cancel_tx, cancel_rx) = oneshot::channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = cancel_tx.send(());
        });

        let result = run_generator(
            &cmd,
            Language::En,
            "t",
            Path::new("/tmp/unused.mp4"),
            Duration::from_secs(10),
            cancel_rx,
            |_| {},
        )
        .await;

        assert!(matches!(result, Err(GenerateError::Cancelled)));
    }
}
