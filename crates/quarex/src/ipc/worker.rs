//! Worker process lifecycle: spawn, request/response traffic, hard kill.
//!
//! A `WorkerHandle` is exclusively owned by one calling thread and carries
//! the duplex channel (the worker's piped stdin/stdout) plus the process
//! id. Cancellation is always a hard kill: the worker may be
//! mid-backtrack in an unbounded loop and must not get a chance to ignore
//! or delay termination.

use std::io::{BufReader, BufWriter};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

use super::protocol::{ExecutionRequest, ExecutionResponse, read_message, write_message};
use super::readiness;

/// Handle to a worker process.
///
/// Never shared across threads; the owning thread sends one request at a
/// time and waits for its response (or the deadline) before the next.
pub struct WorkerHandle {
    /// The child process.
    child: Child,
    /// Buffered stdin writer (parent → worker).
    stdin: BufWriter<std::process::ChildStdin>,
    /// Buffered stdout reader (worker → parent).
    stdout: BufReader<std::process::ChildStdout>,
    /// Raw fd of the read side, polled by [`WorkerHandle::await_response`].
    stdout_fd: RawFd,
    /// When the worker was spawned.
    spawned_at: Instant,
    /// Whether the worker has been killed or discarded.
    killed: bool,
}

impl WorkerHandle {
    /// Spawn a new worker process.
    ///
    /// Returns as soon as the process is started: no liveness ping and no
    /// synchronous wait. Probing would race with death anyway, and the
    /// first request follows immediately.
    ///
    /// Looks for the `quarex-worker` binary in the following order:
    /// 1. `QUAREX_WORKER_PATH` environment variable
    /// 2. Same directory as the current executable (and its parent, for
    ///    test binaries under `target/debug/deps`)
    /// 3. System PATH
    pub fn spawn() -> Result<Self> {
        let worker_path = Self::find_worker_binary()?;

        let mut child = Command::new(&worker_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // Let worker stderr pass through for debugging
            .spawn()
            .map_err(|e| {
                Error::Ipc(format!(
                    "failed to spawn worker process '{}': {}",
                    worker_path.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("failed to get worker stdout".to_string()))?;
        let stdout_fd = stdout.as_raw_fd();

        tracing::debug!(pid = child.id(), "spawned worker");

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            stdout_fd,
            spawned_at: Instant::now(),
            killed: false,
        })
    }

    /// Find the quarex-worker binary path.
    fn find_worker_binary() -> Result<PathBuf> {
        // 1. Check environment variable
        if let Ok(path) = std::env::var("QUAREX_WORKER_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Ok(path);
            }
        }

        // 2. Look next to current executable. Test binaries live one level
        // down in target/<profile>/deps, so check the parent directory too.
        if let Ok(exe_path) = std::env::current_exe() {
            for dir in exe_path.ancestors().skip(1).take(2) {
                let worker_path = dir.join("quarex-worker");
                if worker_path.exists() {
                    return Ok(worker_path);
                }
            }
        }

        // 3. Try system PATH via which
        if let Ok(path) = which::which("quarex-worker") {
            return Ok(path);
        }

        // 4. For development: try target/debug or target/release
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            for profile in &["debug", "release"] {
                let path = PathBuf::from(&manifest_dir)
                    .join("..")
                    .join("..")
                    .join("target")
                    .join(profile)
                    .join("quarex-worker");
                if path.exists() {
                    return Ok(path.canonicalize().unwrap_or(path));
                }
            }
        }

        Err(Error::Ipc(
            "could not find quarex-worker binary; set QUAREX_WORKER_PATH or ensure it's in PATH"
                .to_string(),
        ))
    }

    /// Send a request to the worker.
    ///
    /// A broken pipe here means the worker is gone (idle self-eviction or
    /// an external kill) and surfaces as a death-class error.
    pub fn send_request(&mut self, request: &ExecutionRequest) -> Result<()> {
        if self.killed {
            return Err(Error::Ipc("worker has been killed".to_string()));
        }
        write_message(&mut self.stdin, request)
    }

    /// Wait for a response with a hard wall-clock deadline.
    ///
    /// Returns `Ok(None)` when the deadline elapses with no data; the
    /// caller is expected to kill the worker, since whatever it is doing
    /// is no longer wanted. End-of-stream mid-read is a death-class error.
    pub fn await_response(&mut self, timeout: Duration) -> Result<Option<ExecutionResponse>> {
        if self.killed {
            return Err(Error::Ipc("worker has been killed".to_string()));
        }
        if !readiness::wait_readable(self.stdout_fd, timeout)? {
            return Ok(None);
        }
        read_message(&mut self.stdout).map(Some)
    }

    /// Kill the worker process immediately.
    ///
    /// Unconditional SIGKILL, then reap. Both "already dead" and "already
    /// reaped" are normal outcomes: detecting death and killing an
    /// already-dead process are two valid paths to the same end state.
    pub fn kill(&mut self) {
        if self.killed {
            return;
        }
        self.killed = true;

        tracing::debug!(
            pid = self.child.id(),
            uptime_ms = self.spawned_at.elapsed().as_millis() as u64,
            "killing worker"
        );

        if let Err(e) = self.child.kill() {
            // InvalidInput means the child was already reaped
            if e.kind() != std::io::ErrorKind::InvalidInput {
                tracing::warn!("failed to kill worker: {}", e);
            }
        }

        // Wait to reap zombie
        let _ = self.child.wait();
    }

    /// Drop a worker already known dead without signalling it.
    ///
    /// Cheaper than [`WorkerHandle::kill`] on the detected-death path; the
    /// process is still reaped so it does not linger as a zombie.
    pub fn discard(mut self) {
        self.killed = true;
        match self.child.try_wait() {
            Ok(Some(_)) => {}
            // Not actually exited yet (or state unknown): fall back to the
            // unconditional kill rather than block in wait().
            _ => {
                let _ = self.child.kill();
                let _ = self.child.wait();
            }
        }
    }

    /// Whether the worker process has already exited.
    ///
    /// Non-blocking, and reaps the process as a side effect when it has.
    /// Used to sweep cache entries left behind by exited threads; never
    /// called on the handle a transaction is about to use.
    pub fn has_exited(&mut self) -> bool {
        self.killed || matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Get the process ID of the worker.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// When the worker was spawned.
    pub fn spawned_at(&self) -> Instant {
        self.spawned_at
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Ensure worker is killed when handle is dropped
        self.kill();
    }
}
