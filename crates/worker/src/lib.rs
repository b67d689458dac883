//! # ot-worker
//!
//! Cooperative single-worker scheduling for a non-thread-safe engine.
//!
//! Every call into the engine goes through one API lock. Engine-internal
//! processing (tasklets, timers, drivers) runs in drain cycles on a single
//! worker thread, which any thread may wake through a coalescing signal.
//!
//! ## Module Overview
//! - [`engine`]    – the work-source trait the worker drives.
//! - [`lock`]      – reentrant API lock with blocking and try variants.
//! - [`wake`]      – coalescing wake signal and the `Waker` handle.
//! - [`scheduler`] – drain cycles, worker thread and configuration.

pub mod engine;
mod error;
pub mod lock;
pub mod scheduler;
pub mod wake;

pub use engine::Engine;
pub use error::{WorkerError, WorkerResult};
pub use lock::{ApiGuard, ApiLock};
pub use scheduler::{
    Scheduler, SchedulerConfig, SchedulerConfigBuilder, SchedulerStats, WorkerHandle,
    DEFAULT_STACK_SIZE, DEFAULT_THREAD_NAME,
};
pub use wake::{Waker, WorkerState};

#[cfg(test)]
mod tests;
