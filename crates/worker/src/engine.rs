//! The engine-facing surface the scheduler drives.

/// Work source serviced by the worker.
///
/// Methods take `&self`: the engine is only ever reached through the
/// [`ApiLock`](crate::ApiLock), which admits one thread at a time, so the
/// implementation needs to be `Send` but not `Sync`.
pub trait Engine: Send + 'static {
    /// Returns true while deferred internal work (tasklets) is queued.
    fn has_pending_work(&self) -> bool;

    /// Runs the queued internal work once.
    fn process_pending_work(&self);

    /// Services timers and radio/transport drivers once per drain cycle.
    fn service_drivers(&self);
}
