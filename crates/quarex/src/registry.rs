//! Context-keyed worker handle cache.
//!
//! One worker per calling thread, keyed by `ThreadId` in a process-global
//! table. A handle is checked *out* of the table for the duration of a
//! transaction and checked back in afterwards, so the table lock is held
//! only for the map operation itself, never across IPC traffic, and a
//! handle is never visible to two threads at once.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, ThreadId};

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::ipc::WorkerHandle;

static WORKERS: OnceLock<Mutex<FxHashMap<ThreadId, WorkerHandle>>> = OnceLock::new();

fn table() -> MutexGuard<'static, FxHashMap<ThreadId, WorkerHandle>> {
    WORKERS
        .get_or_init(|| Mutex::new(FxHashMap::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Take this thread's worker handle, spawning a fresh worker if none is
/// cached. No liveness probe on the cached handle: probing races with
/// death and costs the common, live-worker path.
///
/// Also sweeps entries whose worker has already exited. `ThreadId`s are
/// never reused, so a thread that went quiet or exited would otherwise
/// pin its cache slot, two pipe fds, and an unreaped child forever;
/// dropping the swept handle reaps the process.
pub fn checkout() -> Result<WorkerHandle> {
    let cached = {
        let mut table = table();
        let cached = table.remove(&thread::current().id());
        table.retain(|_, handle| !handle.has_exited());
        cached
    };
    match cached {
        Some(handle) => Ok(handle),
        None => WorkerHandle::spawn(),
    }
}

/// Return a healthy handle to the cache after a completed transaction.
///
/// Handles that errored or timed out are never checked back in; their
/// cache slot simply stays empty until the next checkout spawns anew.
pub fn checkin(handle: WorkerHandle) {
    table().insert(thread::current().id(), handle);
}

/// Kill and reap this thread's worker, if any. Idempotent.
pub fn destroy() {
    let removed = table().remove(&thread::current().id());
    if let Some(mut handle) = removed {
        handle.kill();
    }
}

/// Process id of this thread's cached worker, if one is currently live
/// in the cache.
pub fn current_worker_pid() -> Option<u32> {
    table().get(&thread::current().id()).map(|handle| handle.pid())
}
