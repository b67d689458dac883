//! Single-worker cooperative scheduler.
//!
//! All engine-internal processing happens in drain cycles. A drain cycle
//! holds the API lock, runs queued work until the engine reports none left,
//! services drivers once and releases the lock. Cycles are single-flight: at
//! most one runs at a time, whether it was started by the spawned worker
//! thread or by [`Scheduler::run_once`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::Engine;
use crate::error::{WorkerError, WorkerResult};
use crate::lock::{ApiGuard, ApiLock};
use crate::wake::{WakeSignal, Waker, WorkerState};

pub const DEFAULT_THREAD_NAME: &str = "openthread";

/// Default worker stack. Hosted threads need far more headroom than the
/// 6 KiB an RTOS build reserves, mostly for log formatting.
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

/// Configuration for the worker thread.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub name: String,
    pub stack_size: usize,
    pub idle_callback: Option<fn()>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: DEFAULT_STACK_SIZE,
            idle_callback: None,
        }
    }
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for ergonomic scheduler configuration construction.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Sets the worker thread name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the worker stack size in bytes. The platform may round it up.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = bytes;
        self
    }

    /// Sets a hook invoked after every drain cycle, once the lock is released.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

/// Counters sampled by [`Scheduler::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Drain cycles started.
    pub cycles: u64,
    /// Units of internal work processed across all cycles.
    pub work_items: u64,
    /// Total wake requests.
    pub wakes_requested: u64,
    /// Wake requests absorbed by an already pending wake.
    pub wakes_coalesced: u64,
}

struct Shared<E> {
    config: SchedulerConfig,
    lock: ApiLock<E>,
    signal: Arc<WakeSignal>,
    spawn_lock: Mutex<()>,
    cycles: AtomicU64,
    work_items: AtomicU64,
}

impl<E: Engine> Shared<E> {
    fn drain(&self) {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let mut processed = 0u64;
        {
            let engine = self.lock.lock();
            while engine.has_pending_work() {
                engine.process_pending_work();
                processed += 1;
            }
            engine.service_drivers();
        }
        self.work_items.fetch_add(processed, Ordering::Relaxed);
        log::trace!("drain cycle {cycle}: {processed} work item(s)");

        if let Some(idle) = self.config.idle_callback {
            idle();
        }
    }

    fn worker_loop(&self) {
        let _attached = WorkerGuard(self);
        log::debug!("worker `{}` started", self.config.name);
        while self.signal.wait_for_work() {
            let _cycle = CycleGuard(&self.signal);
            // Keep serving wakes after a panicking cycle.
            if panic::catch_unwind(AssertUnwindSafe(|| self.drain())).is_err() {
                log::error!(
                    "drain cycle panicked on worker `{}`; continuing",
                    self.config.name
                );
            }
        }
        log::debug!("worker `{}` stopped", self.config.name);
    }
}

/// Clears the worker registration when the loop exits, however it exits.
///
/// Taking the spawn lock orders the detach after `spawn` has attached this
/// thread, so a fast exit cannot leave a stale id behind.
struct WorkerGuard<'a, E>(&'a Shared<E>);

impl<E> Drop for WorkerGuard<'_, E> {
    fn drop(&mut self) {
        let _spawning = self.0.spawn_lock.lock();
        self.0.signal.detach_worker(thread::current().id());
    }
}

/// Leaves `Running` even if the engine panics mid-cycle.
struct CycleGuard<'a>(&'a WakeSignal);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_cycle();
    }
}

/// Owns the engine, the API lock and the wake signal.
///
/// Cloning yields another handle to the same scheduler.
pub struct Scheduler<E> {
    shared: Arc<Shared<E>>,
}

impl<E: Engine> Scheduler<E> {
    pub fn new(engine: E, config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                lock: ApiLock::new(engine),
                signal: Arc::new(WakeSignal::new()),
                spawn_lock: Mutex::new(()),
                cycles: AtomicU64::new(0),
                work_items: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// Returns a handle the engine (or anything else) can use to request a
    /// drain cycle.
    pub fn waker(&self) -> Waker {
        Waker::new(Arc::clone(&self.shared.signal))
    }

    /// Requests a drain cycle. Never blocks.
    pub fn request_wake(&self) {
        self.shared.signal.signal();
    }

    pub fn state(&self) -> WorkerState {
        self.shared.signal.state()
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            cycles: self.shared.cycles.load(Ordering::Relaxed),
            work_items: self.shared.work_items.load(Ordering::Relaxed),
            wakes_requested: self.shared.signal.requested(),
            wakes_coalesced: self.shared.signal.coalesced(),
        }
    }

    pub fn api_lock(&self) -> &ApiLock<E> {
        &self.shared.lock
    }

    /// Blocks on the API lock.
    pub fn lock(&self) -> ApiGuard<'_, E> {
        self.shared.lock.lock()
    }

    /// Runs `op` against the engine under the API lock.
    pub fn lock_and_call<R>(&self, op: impl FnOnce(&E) -> R) -> R {
        self.shared.lock.with(op)
    }

    /// Like [`lock_and_call`](Self::lock_and_call) but fails with
    /// [`WorkerError::WouldBlock`] instead of waiting.
    pub fn try_lock_and_call<R>(&self, op: impl FnOnce(&E) -> R) -> WorkerResult<R> {
        self.shared.lock.try_with(op)
    }

    /// Runs one drain cycle on the calling thread if a wake is pending.
    pub fn run_once(&self) -> bool {
        if !self.shared.signal.begin_cycle() {
            return false;
        }
        let _cycle = CycleGuard(&self.shared.signal);
        self.shared.drain();
        true
    }

    /// Runs drain cycles until no wake is pending. Returns the number of
    /// cycles run.
    pub fn run_until_idle(&self) -> usize {
        let mut cycles = 0;
        while self.run_once() {
            cycles += 1;
        }
        cycles
    }

    /// Waits until the scheduler is idle with nothing pending.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.signal.wait_idle(timeout)
    }

    /// Starts the worker thread. Only one worker may be alive at a time.
    pub fn spawn(&self) -> WorkerResult<WorkerHandle> {
        let _spawning = self.shared.spawn_lock.lock();
        if self.shared.signal.has_worker() {
            return Err(WorkerError::AlreadyRunning);
        }
        self.shared.signal.clear_shutdown();

        let shared = Arc::clone(&self.shared);
        let join = thread::Builder::new()
            .name(self.shared.config.name.clone())
            .stack_size(self.shared.config.stack_size)
            .spawn(move || shared.worker_loop())?;
        let thread_id = join.thread().id();
        self.shared.signal.attach_worker(thread_id);
        log::info!(
            "worker `{}` spawned ({} byte stack)",
            self.shared.config.name,
            self.shared.config.stack_size
        );

        Ok(WorkerHandle {
            join: Some(join),
            signal: Arc::clone(&self.shared.signal),
            thread_id,
        })
    }

    /// Thread id of the running worker, if one was spawned.
    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        self.shared.signal.worker()
    }
}

impl<E> Clone for Scheduler<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Engine> fmt::Debug for Scheduler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Handle to the spawned worker. Dropping it stops and joins the thread.
pub struct WorkerHandle {
    join: Option<JoinHandle<()>>,
    signal: Arc<WakeSignal>,
    thread_id: ThreadId,
}

impl WorkerHandle {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// True once the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stops the worker after its current cycle and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.signal.request_shutdown();
        if join.thread().id() == thread::current().id() {
            // Dropped from inside a drain cycle; the loop exits on its own
            // and detaches itself.
            log::warn!("worker handle dropped on the worker thread");
        } else if join.join().is_err() {
            log::error!("worker thread panicked");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("thread_id", &self.thread_id)
            .field("running", &self.join.is_some())
            .finish()
    }
}
