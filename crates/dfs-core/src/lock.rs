//! Per-node reader/writer locks with writer preference
//!
//! Once an exclusive request has registered itself as pending, no new shared
//! request is granted until that writer has been served. Requests inside the
//! same class are not ordered relative to each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::warn;

use crate::path::NodePath;
use crate::types::LockMode;

#[derive(Debug, Default)]
struct LockState {
    readers: u32,
    pending_writers: u32,
    writing: bool,
}

/// Point-in-time view of a lock's counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LockSnapshot {
    pub readers: u32,
    pub pending_writers: u32,
    pub writing: bool,
}

/// Fair reader/writer lock guarding a single namespace node.
///
/// Acquisition and release are decoupled (no guard object) because a client
/// may take a lock in one request and drop it in a later one.
#[derive(Debug, Default)]
pub struct PerNodeLock {
    state: Mutex<LockState>,
    changed: Condvar,
}

impl PerNodeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_shared(&self) {
        self.acquire_shared_timeout(None);
    }

    pub fn acquire_exclusive(&self) {
        self.acquire_exclusive_timeout(None);
    }

    /// Returns false if `timeout` elapsed before the lock was granted.
    pub fn acquire_shared_timeout(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        let mut timed_out = false;
        while state.pending_writers > 0 || state.writing {
            if timed_out {
                return false;
            }
            timed_out = self.wait(&mut state, deadline);
        }
        state.readers += 1;
        true
    }

    /// Returns false if `timeout` elapsed before the lock was granted. The
    /// pending registration is withdrawn in that case.
    pub fn acquire_exclusive_timeout(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        state.pending_writers += 1;
        let mut timed_out = false;
        while state.readers > 0 || state.writing {
            if timed_out {
                state.pending_writers -= 1;
                // Readers queued behind this request may now proceed.
                self.changed.notify_all();
                return false;
            }
            timed_out = self.wait(&mut state, deadline);
        }
        state.pending_writers -= 1;
        state.writing = true;
        true
    }

    /// Returns false if no shared holder was registered.
    pub fn release_shared(&self) -> bool {
        let mut state = self.state.lock();
        if state.readers == 0 {
            warn!("release_shared on a lock with no readers");
            return false;
        }
        state.readers -= 1;
        self.changed.notify_all();
        true
    }

    /// Returns false if the lock was not held exclusively.
    pub fn release_exclusive(&self) -> bool {
        let mut state = self.state.lock();
        if !state.writing {
            warn!("release_exclusive on a lock that is not held");
            return false;
        }
        state.writing = false;
        self.changed.notify_all();
        true
    }

    pub fn acquire(&self, mode: LockMode, timeout: Option<Duration>) -> bool {
        match mode {
            LockMode::Shared => self.acquire_shared_timeout(timeout),
            LockMode::Exclusive => self.acquire_exclusive_timeout(timeout),
        }
    }

    pub fn release(&self, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.release_shared(),
            LockMode::Exclusive => self.release_exclusive(),
        }
    }

    pub fn snapshot(&self) -> LockSnapshot {
        let state = self.state.lock();
        LockSnapshot {
            readers: state.readers,
            pending_writers: state.pending_writers,
            writing: state.writing,
        }
    }

    /// Blocks until notified. Returns true if the deadline passed.
    fn wait(&self, state: &mut MutexGuard<'_, LockState>, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => self.changed.wait_until(state, deadline).timed_out(),
            None => {
                self.changed.wait(state);
                false
            }
        }
    }
}

/// Node path -> lock. Entries are created on first use and never removed.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: Mutex<HashMap<NodePath, Arc<PerNodeLock>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, path: &NodePath) -> Arc<PerNodeLock> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(path.clone()).or_default())
    }

    pub fn get(&self, path: &NodePath) -> Option<Arc<PerNodeLock>> {
        self.locks.lock().get(path).cloned()
    }
}
