
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::{Engine, Waker};

/// Engine whose queued work is a plain counter.
#[derive(Default)]
pub(crate) struct CountingEngine {
    pub pending: AtomicUsize,
    pub processed: AtomicUsize,
    pub serviced: AtomicUsize,
    /// Work items that re-arm the waker when processed.
    pub rearm: AtomicUsize,
    pub waker: Mutex<Option<Waker>>,
}

impl CountingEngine {
    pub fn queue(&self, items: usize) {
        self.pending.fetch_add(items, Ordering::SeqCst);
    }
}

impl Engine for CountingEngine {
    fn has_pending_work(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn process_pending_work(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.processed.fetch_add(1, Ordering::SeqCst);
        let rearm = self
            .rearm
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rearm {
            if let Some(waker) = self.waker.lock().as_ref() {
                waker.wake();
            }
        }
    }

    fn service_drivers(&self) {
        self.serviced.fetch_add(1, Ordering::SeqCst);
    }
}
