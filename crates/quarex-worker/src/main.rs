//! The quarex worker process.
//!
//! Spawned by the quarex library, never meant to be run by hand. Reads
//! one match request at a time from stdin, evaluates it, writes one
//! response to stdout, and exits on its own once no request arrives
//! within the idle budget — the parent does not have to track idle
//! workers, and a crashed parent's closed pipes tear the worker down the
//! same way.

use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use quarex::ipc::{
    ErrorDescriptor, ExecutionRequest, ExecutionResponse, FailureKind, WIRE_VERSION, read_message,
    readiness, write_message,
};
use quarex::matcher;

/// Budget for the first request; the parent writes it right after spawn.
const INITIAL_IDLE_BUDGET: Duration = Duration::from_secs(1);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let stdin = std::io::stdin();
    let stdin_fd = stdin.as_raw_fd();
    let mut reader = stdin.lock();
    let mut writer = std::io::stdout().lock();

    serve(stdin_fd, &mut reader, &mut writer);

    // Exit without unwinding: a worker must never run any teardown beyond
    // its own, and by this point there is nothing left to flush.
    std::process::exit(0);
}

fn serve<R: Read, W: Write>(stdin_fd: RawFd, reader: &mut R, writer: &mut W) {
    let mut idle_budget = INITIAL_IDLE_BUDGET;

    loop {
        match readiness::wait_readable(stdin_fd, idle_budget) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("idle budget elapsed, self-terminating");
                return;
            }
            Err(err) => {
                tracing::warn!("poll on stdin failed: {}", err);
                return;
            }
        }

        // Read failure here means the parent closed the pipe or killed us
        // mid-frame; either way there is nobody left to answer.
        let request: ExecutionRequest = match read_message(reader) {
            Ok(request) => request,
            Err(_) => return,
        };

        let response = if request.version == WIRE_VERSION {
            matcher::evaluate(&request.pattern, request.operation, &request.subject)
        } else {
            ExecutionResponse::Failure(ErrorDescriptor {
                kind: FailureKind::Unsupported,
                message: format!("unsupported wire version {}", request.version),
            })
        };

        if write_message(writer, &response).is_err() {
            return;
        }

        // The lease is renewed with every request, not fixed at spawn:
        // the worker stays warm only while its parent keeps calling.
        idle_budget = Duration::from_millis(request.idle_budget_ms);
    }
}
