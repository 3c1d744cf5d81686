//! Error types for quarex.

use thiserror::Error;

use crate::ipc::protocol::FailureKind;

/// Result type for quarex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when executing a match in an isolated worker.
#[derive(Debug, Error)]
pub enum Error {
    /// The worker did not respond within the deadline. The worker has
    /// already been killed and reaped when this is returned.
    #[error("match timed out")]
    Timeout,

    /// Transport-level worker death: the channel broke because the worker
    /// process no longer exists (broken pipe on write, end-of-stream on
    /// read). The only error class eligible for the single silent retry.
    #[error("worker process gone: {0}")]
    WorkerGone(String),

    /// IPC communication error with the worker process.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The matching operation itself failed (invalid pattern, engine
    /// runtime error). Re-raised faithfully from the worker, never retried.
    #[error("application error ({kind:?}): {message}")]
    Application {
        kind: FailureKind,
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures attributable to a dead worker.
    pub fn is_worker_death(&self) -> bool {
        matches!(self, Error::WorkerGone(_))
    }

    /// Classify a channel IO failure: a vanished peer maps to
    /// `WorkerGone`, anything else to `Ipc`.
    pub(crate) fn transport(context: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => Error::WorkerGone(format!("{context}: {err}")),
            _ => Error::Ipc(format!("{context}: {err}")),
        }
    }
}
