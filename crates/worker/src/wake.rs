//! Coalescing wake signal shared between wakers and the worker.
//!
//! The signal is a single pending bit, not a counter: any number of wakes that
//! arrive before the worker claims the bit collapse into one drain cycle. A
//! wake that arrives while a cycle is running sets the bit again, and the
//! worker re-runs once that cycle finishes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Nothing pending.
    Idle,
    /// A wake is pending and no cycle is running.
    Scheduled,
    /// A drain cycle is executing.
    Running,
}

#[derive(Debug)]
struct WakeState {
    state: WorkerState,
    pending: bool,
    shutdown: bool,
    worker: Option<ThreadId>,
}

pub(crate) struct WakeSignal {
    state: Mutex<WakeState>,
    ready: Condvar,
    idle: Condvar,
    requested: AtomicU64,
    coalesced: AtomicU64,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(WakeState {
                state: WorkerState::Idle,
                pending: false,
                shutdown: false,
                worker: None,
            }),
            ready: Condvar::new(),
            idle: Condvar::new(),
            requested: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    pub(crate) fn signal(&self) {
        self.requested.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        if state.pending {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return;
        }
        state.pending = true;
        if state.state == WorkerState::Idle {
            state.state = WorkerState::Scheduled;
        }
        drop(state);
        self.ready.notify_one();
    }

    /// Claims the pending wake and enters `Running`. Returns false when no
    /// wake is pending or another cycle is already running.
    pub(crate) fn begin_cycle(&self) -> bool {
        let mut state = self.state.lock();
        Self::claim(&mut state)
    }

    pub(crate) fn finish_cycle(&self) {
        let mut state = self.state.lock();
        if state.pending {
            state.state = WorkerState::Scheduled;
            drop(state);
            self.ready.notify_one();
        } else {
            state.state = WorkerState::Idle;
            drop(state);
            self.idle.notify_all();
        }
    }

    /// Parks the worker until a wake can be claimed. Returns false once
    /// shutdown has been requested.
    pub(crate) fn wait_for_work(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return false;
            }
            if Self::claim(&mut state) {
                return true;
            }
            self.ready.wait(&mut state);
        }
    }

    /// Blocks until no wake is pending and no cycle is running.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.pending || state.state != WorkerState::Idle {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return !state.pending && state.state == WorkerState::Idle;
            }
        }
        true
    }

    /// Records `worker` as the thread that owns the drain loop.
    pub(crate) fn attach_worker(&self, worker: ThreadId) {
        self.state.lock().worker = Some(worker);
    }

    pub(crate) fn clear_shutdown(&self) {
        self.state.lock().shutdown = false;
    }

    pub(crate) fn has_worker(&self) -> bool {
        self.state.lock().worker.is_some()
    }

    /// Forgets `worker`, unless another thread has since been attached.
    pub(crate) fn detach_worker(&self, worker: ThreadId) {
        let mut state = self.state.lock();
        if state.worker == Some(worker) {
            state.worker = None;
        }
    }

    pub(crate) fn worker(&self) -> Option<ThreadId> {
        self.state.lock().worker
    }

    pub(crate) fn request_shutdown(&self) {
        self.state.lock().shutdown = true;
        self.ready.notify_all();
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state.lock().state
    }

    pub(crate) fn requested(&self) -> u64 {
        self.requested.load(Ordering::Relaxed)
    }

    pub(crate) fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    fn claim(state: &mut WakeState) -> bool {
        if !state.pending || state.state == WorkerState::Running {
            return false;
        }
        state.pending = false;
        state.state = WorkerState::Running;
        true
    }
}

/// Cloneable handle that requests a drain cycle.
///
/// `wake` never waits on the API lock or on the worker; it only touches the
/// signal's own short critical section, so it can be called from any thread,
/// including from inside a drain cycle.
#[derive(Clone)]
pub struct Waker {
    signal: Arc<WakeSignal>,
}

impl Waker {
    pub(crate) fn new(signal: Arc<WakeSignal>) -> Self {
        Self { signal }
    }

    pub fn wake(&self) {
        self.signal.signal();
    }
}

impl fmt::Debug for Waker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waker")
            .field("state", &self.signal.state())
            .finish()
    }
}
