use super::command::EngineInvocation;
use camino::Utf8Path;
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::timeout;

/// How an engine run ended, when it ran at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineExit {
    /// Exit code, or `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub duration: Duration,
}

impl EngineExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("Failed to wait for engine: {0}")]
    Wait(std::io::Error),

    #[error("Engine did not finish within {0:?}")]
    TimedOut(Duration),

    /// The engine reported success without taking the whole document.
    #[error("Engine exited without reading the whole document: {0}")]
    Stdin(std::io::Error),
}

/// Runs one engine invocation to completion.
///
/// Implementations must write the whole payload to stdin and close it before
/// the exit status is observed.
pub trait EngineRunner: Send + Sync {
    fn run(
        &self,
        program: &Utf8Path,
        invocation: &EngineInvocation,
    ) -> impl Future<Output = Result<EngineExit, RunError>> + Send;
}

/// Spawns the engine with tokio, streaming stdin and draining stdout/stderr
/// into the log.
#[derive(Debug, Clone, Default)]
pub struct TokioEngineRunner {
    timeout: Option<Duration>,
}

impl TokioEngineRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl EngineRunner for TokioEngineRunner {
    async fn run(
        &self,
        program: &Utf8Path,
        invocation: &EngineInvocation,
    ) -> Result<EngineExit, RunError> {
        tracing::info!("Executing: {} {}", program, invocation.args.join(" "));
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Drain both pipes before feeding stdin so a chatty engine cannot stall on a full pipe
        let stdout_task = child
            .stdout
            .take()
            .map(|stdout| tokio::spawn(drain_lines(stdout, false)));
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_lines(stderr, true)));

        let stdin = child.stdin.take();
        let waited = match self.timeout {
            Some(limit) => {
                match timeout(limit, feed_and_wait(&mut child, stdin, &invocation.stdin_payload))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!("Engine timed out after {:?}, killing it", limit);
                        if let Err(err) = child.kill().await {
                            tracing::warn!("Failed to kill engine: {}", err);
                        }
                        return Err(RunError::TimedOut(limit));
                    }
                }
            }
            None => feed_and_wait(&mut child, stdin, &invocation.stdin_payload).await,
        };
        let (status, stdin_error) = waited.map_err(RunError::Wait)?;

        for task in [stdout_task, stderr_task].into_iter().flatten() {
            let _ = task.await;
        }

        let exit = EngineExit {
            code: status.code(),
            duration: start.elapsed(),
        };

        // A nonzero code already explains a broken pipe; a zero code over a truncated document does not
        if let Some(err) = stdin_error {
            if exit.success() {
                tracing::warn!("Engine exited 0 before reading all input: {}", err);
                return Err(RunError::Stdin(err));
            }
            tracing::debug!("Ignoring stdin error after failed exit: {}", err);
        }

        tracing::info!(
            "Engine completed in {:.2}s with exit code {:?}",
            exit.duration.as_secs_f32(),
            exit.code
        );

        Ok(exit)
    }
}

/// Write the payload, close stdin, then wait for the process.
///
/// A failed write or close does not stop the wait; it is handed back next to
/// the exit status so the caller can judge it against the exit code.
async fn feed_and_wait(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    payload: &[u8],
) -> std::io::Result<(ExitStatus, Option<std::io::Error>)> {
    let mut stdin_error = None;

    if let Some(mut stdin) = stdin {
        let written = match stdin.write_all(payload).await {
            Ok(()) => stdin.shutdown().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            tracing::debug!("Failed to deliver document to engine: {}", err);
            stdin_error = Some(err);
        }
        drop(stdin);
    }

    let status = child.wait().await?;
    Ok((status, stdin_error))
}

async fn drain_lines<R: AsyncRead + Unpin>(reader: R, is_stderr: bool) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => tracing::warn!("pandoc: {}", line),
            Ok(Some(line)) => tracing::debug!("pandoc: {}", line),
            Ok(None) => break,
            Err(err) => {
                tracing::debug!("Stopped reading engine output: {}", err);
                break;
            }
        }
    }
}
