//! API lock serialising every call into the engine.
//!
//! The lock is reentrant for the owning thread. Observers that run inside a
//! drain cycle execute on the worker while it holds the lock, and may call
//! back into the engine without deadlocking.

use std::fmt;
use std::ops::Deref;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::{WorkerError, WorkerResult};

pub struct ApiLock<E> {
    engine: ReentrantMutex<E>,
}

/// Proof that the API lock is held. Dereferences to the engine.
pub struct ApiGuard<'a, E> {
    guard: ReentrantMutexGuard<'a, E>,
}

impl<E> ApiLock<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: ReentrantMutex::new(engine),
        }
    }

    /// Blocks until the lock is available.
    pub fn lock(&self) -> ApiGuard<'_, E> {
        ApiGuard {
            guard: self.engine.lock(),
        }
    }

    /// Fails with [`WorkerError::WouldBlock`] when another thread holds the
    /// lock. Never blocks.
    pub fn try_lock(&self) -> WorkerResult<ApiGuard<'_, E>> {
        self.engine
            .try_lock()
            .map(|guard| ApiGuard { guard })
            .ok_or(WorkerError::WouldBlock)
    }

    pub fn with<R>(&self, op: impl FnOnce(&E) -> R) -> R {
        let guard = self.lock();
        op(&guard)
    }

    pub fn try_with<R>(&self, op: impl FnOnce(&E) -> R) -> WorkerResult<R> {
        let guard = self.try_lock()?;
        Ok(op(&guard))
    }

    pub fn is_locked(&self) -> bool {
        self.engine.is_locked()
    }
}

impl<E> Deref for ApiGuard<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.guard
    }
}

impl<E> fmt::Debug for ApiLock<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
