//! Process isolation: each run happens in a disposable worker subprocess.
//!
//! This backend:
//! - Spawns the worker program (by default the current executable with the `worker` argument)
//! - Feeds the submission through stdin and parses frames from stdout
//! - Keeps the tail of stderr to explain crashed workers
//! - Kills the process as soon as the unit is terminated
//!
//! Killing the worker is the only way to stop CPU-bound submissions at once, which makes this
//! the backend used by the CLI and the portal.

use std::{path::Path, process::Stdio, sync::Arc};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::mpsc::{self, Sender},
};
use uuid::Uuid;

use super::{ExecutionRequest, Isolate, Terminator, UnitEvent, UnitHandle, WorkerFrame};
use crate::{
    config::{EngineConfig, IsolationMode, LOOP_LIMIT_ENV_VAR, RECURSION_LIMIT_ENV_VAR},
    CauldronError, CauldronResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// How much of the worker's stderr is kept for fault reports
const STDERR_TAIL_BYTES: usize = 4096;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runs each submission in a fresh worker process.
#[derive(Debug, Clone)]
pub struct ProcessIsolate {
    config: Arc<EngineConfig>,
}

/// Pipes of a freshly spawned worker
struct WorkerPipes {
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProcessIsolate {
    /// Creates a new process isolate
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    fn command(&self, program: &Path) -> Command {
        let mut command = Command::new(program);
        command
            .args(self.config.get_worker_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limits = self.config.script_limits();
        if let Some(limit) = limits.loop_iteration_limit {
            command.env(LOOP_LIMIT_ENV_VAR, limit.to_string());
        }
        if let Some(limit) = limits.recursion_limit {
            command.env(RECURSION_LIMIT_ENV_VAR, limit.to_string());
        }

        command
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Isolate for ProcessIsolate {
    fn spawn(&self, request: ExecutionRequest) -> CauldronResult<UnitHandle> {
        let program = self.config.resolve_worker_program()?;

        let mut child = self
            .command(&program)
            .spawn()
            .map_err(|e| CauldronError::WorkerUnavailable {
                path: program.clone(),
                reason: e.to_string(),
            })?;

        let pipes = take_pipes(&mut child).ok_or_else(|| CauldronError::WorkerUnavailable {
            path: program.clone(),
            reason: "failed to open worker pipes".to_string(),
        })?;

        let (events_tx, events_rx) = mpsc::channel::<UnitEvent>(*self.config.get_channel_capacity());
        let terminator = Terminator::default();

        tracing::debug!(id = %request.id, program = %program.display(), "spawned worker unit");

        tokio::spawn(supervise(
            request.id,
            child,
            pipes,
            request.source_code,
            events_tx,
            terminator.clone(),
        ));

        Ok(UnitHandle::new(request.id, events_rx, terminator))
    }

    fn mode(&self) -> IsolationMode {
        IsolationMode::Process
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn take_pipes(child: &mut Child) -> Option<WorkerPipes> {
    Some(WorkerPipes {
        stdin: child.stdin.take()?,
        stdout: child.stdout.take()?,
        stderr: child.stderr.take()?,
    })
}

/// Relays worker frames into the unit channel until `done`, failure or termination.
async fn supervise(
    id: Uuid,
    mut child: Child,
    pipes: WorkerPipes,
    source: String,
    events_tx: Sender<UnitEvent>,
    terminator: Terminator,
) {
    let WorkerPipes {
        mut stdin,
        stdout,
        stderr,
    } = pipes;

    // The worker reads all of stdin before running, so the write never waits on our reads.
    tokio::spawn(async move {
        if let Err(e) = stdin.write_all(source.as_bytes()).await {
            tracing::debug!("failed to send source to worker: {}", e);
        }
        let _ = stdin.shutdown().await;
    });

    let stderr_task = tokio::spawn(read_tail(stderr));
    let mut lines = BufReader::new(stdout).lines();
    let mut finished = false;

    loop {
        tokio::select! {
            biased;

            _ = terminator.terminated() => {
                tracing::debug!(%id, "killing terminated worker");
                let _ = child.start_kill();
                let _ = child.wait().await;
                return;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        let _ = child.start_kill();
                        let _ = events_tx
                            .send(UnitEvent::Fault(format!("failed to read worker output: {}", e)))
                            .await;
                        return;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                match WorkerFrame::parse(&line) {
                    Ok(WorkerFrame::Output { message }) => {
                        if events_tx.send(UnitEvent::Output(message)).await.is_err() {
                            let _ = child.start_kill();
                            return;
                        }
                    }
                    Ok(WorkerFrame::Done) => {
                        finished = true;
                        let _ = events_tx.send(UnitEvent::Done).await;
                        break;
                    }
                    Err(e) => {
                        let _ = child.start_kill();
                        let _ = events_tx
                            .send(UnitEvent::Fault(format!("malformed worker frame: {}", e)))
                            .await;
                        return;
                    }
                }
            }
        }
    }

    let status = child.wait().await;

    if !finished {
        let stderr_tail = stderr_task.await.unwrap_or_default();
        let status = match status {
            Ok(status) => status.to_string(),
            Err(e) => e.to_string(),
        };

        let mut reason = format!("worker exited before completing ({})", status);
        if !stderr_tail.trim().is_empty() {
            reason.push_str(": ");
            reason.push_str(stderr_tail.trim());
        }

        tracing::warn!(%id, "{}", reason);
        let _ = events_tx.send(UnitEvent::Fault(reason)).await;
    }
}

/// Reads stderr to the end, keeping only the last bytes.
async fn read_tail(mut stderr: ChildStderr) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        match stderr.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > STDERR_TAIL_BYTES {
                    let excess = buffer.len() - STDERR_TAIL_BYTES;
                    buffer.drain(..excess);
                }
            }
        }
    }

    String::from_utf8_lossy(&buffer).into_owned()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[tokio::test]
    async fn test_missing_worker_program_is_reported() {
        let config = EngineConfig::builder()
            .isolation(IsolationMode::Process)
            .worker_program(PathBuf::from("/nonexistent/cauldron-worker"))
            .build();
        let isolate = ProcessIsolate::new(Arc::new(config));

        let result = isolate.spawn(ExecutionRequest::new("console.log(1)"));
        assert!(matches!(result, Err(CauldronError::WorkerUnavailable { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_worker_without_done_frame_is_a_fault() {
        // `true` reads nothing and exits cleanly without speaking the protocol.
        let config = EngineConfig::builder()
            .isolation(IsolationMode::Process)
            .worker_program(PathBuf::from("true"))
            .worker_args(vec![])
            .build();
        let isolate = ProcessIsolate::new(Arc::new(config));

        let mut handle = isolate.spawn(ExecutionRequest::new("return 1")).unwrap();
        let event = handle.recv().await;
        assert!(matches!(event, Some(UnitEvent::Fault(reason)) if reason.contains("before completing")));
        assert!(handle.recv().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_garbage_output_is_a_fault() {
        let config = EngineConfig::builder()
            .isolation(IsolationMode::Process)
            .worker_program(PathBuf::from("echo"))
            .worker_args(vec!["not a frame".to_string()])
            .build();
        let isolate = ProcessIsolate::new(Arc::new(config));

        let mut handle = isolate.spawn(ExecutionRequest::new("")).unwrap();
        let event = handle.recv().await;
        assert!(matches!(event, Some(UnitEvent::Fault(reason)) if reason.contains("malformed")));
    }
}
