use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time;

/// Captured output kept per stream; later lines are still logged but not kept.
const MAX_CAPTURE: usize = 64 * 1024;

/// Result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// How the process ended.
    pub status: ExitStatus,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Handle to a running external process.
///
/// The child is killed if the handle is dropped, so an owner that wants to
/// leave no stale process behind must call [`terminate`](Self::terminate)
/// or [`wait`](Self::wait) to completion.
pub struct ProcessHandle {
    task: Arc<str>,
    program: String,
    child: Child,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
}

impl ProcessHandle {
    pub(super) fn new(task: Arc<str>, program: String, mut child: Child) -> Self {
        let stdout = child
            .stdout
            .take()
            .map(|out| capture(out, Arc::clone(&task), "stdout"));
        let stderr = child
            .stderr
            .take()
            .map(|err| capture(err, Arc::clone(&task), "stderr"));
        Self {
            task,
            program,
            child,
            stdout,
            stderr,
        }
    }

    /// OS process id, while the process has not been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Program name this handle was launched from.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Non-blocking liveness poll.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Waits for the process to exit. Cancel-safe.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Asks the process to stop with `SIGTERM`, escalating to `SIGKILL` after `grace`.
    ///
    /// Returns only once the process has been reaped.
    pub async fn terminate(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        if let Ok(Some(status)) = self.child.try_wait() {
            return Ok(status);
        }
        if let Some(pid) = self.child.id().and_then(|p| i32::try_from(p).ok()) {
            if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                tracing::debug!(task = %self.task, program = %self.program, error = %e, "SIGTERM failed");
            }
            if let Ok(res) = time::timeout(grace, self.child.wait()).await {
                return res;
            }
            tracing::warn!(
                task = %self.task,
                program = %self.program,
                ?grace,
                "process ignored SIGTERM; killing"
            );
        }
        self.child.kill().await?;
        self.child.wait().await
    }

    /// Waits for the process to exit and returns its captured output.
    pub async fn output(mut self) -> io::Result<ProcessOutput> {
        let status = self.child.wait().await?;
        Ok(self.collect(status).await)
    }

    /// Joins the output readers of an already exited process.
    pub async fn collect(mut self, status: ExitStatus) -> ProcessOutput {
        let stdout = join_capture(self.stdout.take()).await;
        let stderr = join_capture(self.stderr.take()).await;
        ProcessOutput {
            status,
            stdout,
            stderr,
        }
    }
}

fn capture<R>(reader: R, task: Arc<str>, stream: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        // The pipe stays open until EOF: a child writing to a closed pipe dies of SIGPIPE.
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        let mut captured = String::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    tracing::info!(task = %task, stream, "{line}");
                    if captured.len() + line.len() < MAX_CAPTURE {
                        captured.push_str(line);
                        captured.push('\n');
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(task = %task, stream, error = %e, "output unreadable; discarding the rest");
                    if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                        tracing::debug!(task = %task, stream, error = %e, "output drain ended");
                    }
                    break;
                }
            }
        }
        captured
    })
}

async fn join_capture(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(h) => h.await.unwrap_or_default(),
        None => String::new(),
    }
}
