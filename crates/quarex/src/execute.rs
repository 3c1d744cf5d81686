//! The orchestrating entry point: run one match operation in this
//! thread's isolated worker, under a hard deadline, with a single bounded
//! retry when the worker turns out to be dead.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::ipc::protocol::{ExecutionRequest, ExecutionResponse, WIRE_VERSION};
use crate::ipc::{MatchOutcome, Operation};
use crate::registry;

/// Default hard deadline for one operation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default duration a worker stays alive waiting for its next request.
pub const DEFAULT_IDLE_BUDGET: Duration = Duration::from_secs(10);

/// Execute `operation` for `pattern` against `subject` in this thread's
/// worker process, with the default timeout and idle budget.
///
/// See [`execute_with`].
pub fn execute(pattern: &str, operation: Operation, subject: &str) -> Result<MatchOutcome> {
    execute_with(pattern, operation, subject, DEFAULT_TIMEOUT, DEFAULT_IDLE_BUDGET)
}

/// Execute one match operation in an isolated worker process.
///
/// Blocks for at most `timeout` plus bounded retry overhead and returns:
/// - `Ok(outcome)` — the operation's normalized result;
/// - `Err(Error::Application { .. })` — the operation itself failed
///   (bad pattern, engine error), re-raised faithfully and never retried;
/// - `Err(Error::Timeout)` — no response within `timeout`; the worker has
///   been killed and the in-progress match discarded.
///
/// `idle_budget` is how long the worker lingers after this call waiting
/// for the next one; it is renewed on every request, so a worker stays
/// warm only while its thread keeps calling.
///
/// If the cached worker turns out to be dead when the request is written
/// or the response read (idle self-eviction and external kills are only
/// discovered this way), the whole call is transparently replayed exactly
/// once against a freshly spawned worker.
pub fn execute_with(
    pattern: &str,
    operation: Operation,
    subject: &str,
    timeout: Duration,
    idle_budget: Duration,
) -> Result<MatchOutcome> {
    let mut retried = false;

    loop {
        let mut handle = registry::checkout()?;

        let request = ExecutionRequest {
            version: WIRE_VERSION,
            pattern: pattern.to_string(),
            operation,
            subject: subject.to_string(),
            idle_budget_ms: idle_budget.as_millis() as u64,
        };

        if let Err(err) = handle.send_request(&request) {
            if err.is_worker_death() {
                // The idle budget already reaped this worker; we don't
                // probe before sending because that would race with death
                // and slow down the 99.9% live-worker case.
                let pid = handle.pid();
                handle.discard();
                if !retried {
                    retried = true;
                    tracing::debug!(pid, "worker dead at request write, replaying on a fresh one");
                    continue;
                }
            } else {
                handle.kill();
            }
            return Err(err);
        }

        match handle.await_response(timeout) {
            Ok(Some(ExecutionResponse::Success(outcome))) => {
                registry::checkin(handle);
                return Ok(outcome);
            }
            Ok(Some(ExecutionResponse::Failure(descriptor))) => {
                // The operation failed but the worker is intact; keep it.
                registry::checkin(handle);
                return Err(Error::Application {
                    kind: descriptor.kind,
                    message: descriptor.message,
                });
            }
            Ok(None) => {
                handle.kill();
                return Err(Error::Timeout);
            }
            Err(err) => {
                if err.is_worker_death() {
                    let pid = handle.pid();
                    handle.discard();
                    if !retried {
                        retried = true;
                        tracing::debug!(pid, "worker dead at response read, replaying on a fresh one");
                        continue;
                    }
                } else {
                    // Decode/protocol failure with the worker possibly
                    // still alive; the stream state is unknown, so the
                    // worker cannot be reused.
                    handle.kill();
                }
                return Err(err);
            }
        }
    }
}

/// Destroy the calling thread's worker if one exists.
///
/// Idempotent: with no active worker this is a no-op, and repeated calls
/// are harmless. The next [`execute`] from this thread spawns anew.
pub fn shutdown() {
    registry::destroy();
}
