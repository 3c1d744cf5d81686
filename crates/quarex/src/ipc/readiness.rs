//! Bounded readiness wait on a single file descriptor.
//!
//! Both deadline enforcement (parent waiting for a response) and idle
//! self-eviction (worker waiting for the next request) are poll(2) with a
//! millisecond timeout. No timer threads, no async runtime: the common
//! case is a fast successful match on a serving hot path, and a
//! multiplexed wait keeps its per-call overhead at one syscall.

use std::io;
use std::os::unix::io::RawFd;
use std::time::{Duration, Instant};

/// Wait until `fd` is readable (or at end-of-stream) or `timeout` elapses.
///
/// Returns `Ok(true)` when the descriptor is ready, `Ok(false)` on
/// timeout. EINTR is retried with the remaining budget.
pub fn wait_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        // Round up so a sub-millisecond remainder doesn't busy-spin.
        let millis = remaining.as_micros().div_ceil(1000).min(i32::MAX as u128) as i32;

        let mut pollfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        // POLLHUP counts as ready: the subsequent read observes
        // end-of-stream and that is how a dead peer is detected.
        return Ok(rc > 0);
    }
}
