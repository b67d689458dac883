//! Drain cycles driven by the spawned worker thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use ot_worker::{Engine, Scheduler, SchedulerConfig, WorkerError, WorkerHandle, WorkerState};
use parking_lot::Mutex;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Engine whose first work item parks the worker on a barrier so the test can
/// act while a cycle is `Running`.
struct GatedEngine {
    gate: Arc<Barrier>,
    pending: AtomicUsize,
    cycles_serviced: AtomicUsize,
}

impl GatedEngine {
    fn new(gate: Arc<Barrier>) -> Self {
        Self {
            gate,
            pending: AtomicUsize::new(0),
            cycles_serviced: AtomicUsize::new(0),
        }
    }
}

impl Engine for GatedEngine {
    fn has_pending_work(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn process_pending_work(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        // Entered the cycle; wait for the test to release us.
        self.gate.wait();
        self.gate.wait();
    }

    fn service_drivers(&self) {
        self.cycles_serviced.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn worker_runs_cycles_when_woken() {
    let scheduler = Scheduler::new(
        GatedEngine::new(Arc::new(Barrier::new(1))),
        SchedulerConfig::default(),
    );
    let worker = scheduler.spawn().unwrap();
    assert_eq!(scheduler.worker_thread_id(), Some(worker.thread_id()));

    scheduler.request_wake();
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(scheduler.stats().cycles, 1);
    scheduler.lock_and_call(|engine| {
        assert_eq!(engine.cycles_serviced.load(Ordering::SeqCst), 1);
    });

    worker.shutdown();
    assert_eq!(scheduler.worker_thread_id(), None);
}

#[test]
fn second_spawn_is_rejected_until_shutdown() {
    let scheduler = Scheduler::new(
        GatedEngine::new(Arc::new(Barrier::new(1))),
        SchedulerConfig::default(),
    );
    let worker = scheduler.spawn().unwrap();

    assert!(matches!(scheduler.spawn(), Err(WorkerError::AlreadyRunning)));

    drop(worker);
    let worker = scheduler.spawn().unwrap();
    scheduler.request_wake();
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(scheduler.stats().cycles, 1);
    worker.shutdown();
}

#[test]
fn wake_during_running_cycle_is_not_lost() {
    let gate = Arc::new(Barrier::new(2));
    let scheduler = Scheduler::new(
        GatedEngine::new(Arc::clone(&gate)),
        SchedulerConfig::default(),
    );
    scheduler.lock_and_call(|engine| engine.pending.store(1, Ordering::SeqCst));
    let worker = scheduler.spawn().unwrap();

    scheduler.request_wake();
    gate.wait();
    assert_eq!(scheduler.state(), WorkerState::Running);
    scheduler.request_wake();
    gate.wait();

    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(scheduler.stats().cycles, 2);
    worker.shutdown();
}

#[test]
fn api_calls_from_other_threads_are_serialised_with_cycles() {
    let gate = Arc::new(Barrier::new(2));
    let scheduler = Scheduler::new(
        GatedEngine::new(Arc::clone(&gate)),
        SchedulerConfig::default(),
    );
    scheduler.lock_and_call(|engine| engine.pending.store(1, Ordering::SeqCst));
    let worker = scheduler.spawn().unwrap();

    scheduler.request_wake();
    gate.wait();
    // The worker holds the API lock mid-cycle.
    assert!(matches!(
        scheduler.try_lock_and_call(|_| ()),
        Err(WorkerError::WouldBlock)
    ));
    gate.wait();

    assert!(scheduler.wait_idle(TIMEOUT));
    assert!(scheduler.try_lock_and_call(|_| ()).is_ok());
    worker.shutdown();
}

/// Engine that panics while processing its first work item.
#[derive(Default)]
struct FaultyEngine {
    pending: AtomicUsize,
    processed: AtomicUsize,
    faults: AtomicUsize,
}

impl Engine for FaultyEngine {
    fn has_pending_work(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn process_pending_work(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        if self.faults.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("tasklet failed");
        }
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    fn service_drivers(&self) {}
}

#[test]
fn worker_survives_a_panicking_cycle() {
    let scheduler = Scheduler::new(FaultyEngine::default(), SchedulerConfig::default());
    let worker = scheduler.spawn().unwrap();

    scheduler.lock_and_call(|engine| engine.pending.store(1, Ordering::SeqCst));
    scheduler.request_wake();
    assert!(scheduler.wait_idle(TIMEOUT));

    scheduler.lock_and_call(|engine| engine.pending.store(1, Ordering::SeqCst));
    scheduler.request_wake();
    assert!(scheduler.wait_idle(TIMEOUT));

    assert_eq!(scheduler.stats().cycles, 2);
    assert_eq!(
        scheduler.lock_and_call(|engine| engine.processed.load(Ordering::SeqCst)),
        1
    );
    assert_eq!(scheduler.worker_thread_id(), Some(worker.thread_id()));
    assert!(!worker.is_finished());
    worker.shutdown();
}

/// Engine that drops the worker's own handle from inside a drain cycle.
#[derive(Default)]
struct SelfStoppingEngine {
    pending: AtomicUsize,
    handle: Mutex<Option<WorkerHandle>>,
}

impl Engine for SelfStoppingEngine {
    fn has_pending_work(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn process_pending_work(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        drop(self.handle.lock().take());
    }

    fn service_drivers(&self) {}
}

#[test]
fn worker_dropped_inside_a_cycle_detaches_on_exit() {
    let scheduler = Scheduler::new(SelfStoppingEngine::default(), SchedulerConfig::default());
    let handle = scheduler.spawn().unwrap();
    scheduler.lock_and_call(|engine| {
        *engine.handle.lock() = Some(handle);
        engine.pending.store(1, Ordering::SeqCst);
    });
    scheduler.request_wake();

    let deadline = Instant::now() + TIMEOUT;
    while scheduler.worker_thread_id().is_some() {
        assert!(Instant::now() < deadline, "worker never detached");
        thread::sleep(Duration::from_millis(5));
    }

    let worker = scheduler.spawn().unwrap();
    scheduler.request_wake();
    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(scheduler.stats().cycles, 2);
    assert_eq!(scheduler.worker_thread_id(), Some(worker.thread_id()));
    worker.shutdown();
}
