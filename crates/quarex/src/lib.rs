//! Process-isolated regex execution with hard deadlines.
//!
//! Runs potentially adversarial pattern matching in a killable worker
//! process, so catastrophic backtracking on attacker-influenced input
//! cannot hang the calling process. Callers get the match result, the
//! operation's own error re-raised, or [`Error::Timeout`] — never an
//! unbounded stall.
//!
//! Each calling thread owns at most one worker process, reused across
//! calls and self-terminating after an idle budget. Unix only: the
//! mechanism is pipes, poll(2) and SIGKILL.
//!
//! ```no_run
//! use quarex::{execute, MatchOutcome, Operation};
//!
//! let outcome = execute(r"(\w+)@(\w+)", Operation::Captures, "mail: a@b")?;
//! assert!(matches!(outcome, MatchOutcome::Groups(Some(_))));
//! # Ok::<(), quarex::Error>(())
//! ```

pub mod error;
pub mod execute;
pub mod ipc;
pub mod matcher;
mod registry;

pub use error::{Error, Result};
pub use execute::{DEFAULT_IDLE_BUDGET, DEFAULT_TIMEOUT, execute, execute_with, shutdown};
pub use ipc::{FailureKind, MatchOutcome, Operation};
pub use registry::current_worker_pid;
