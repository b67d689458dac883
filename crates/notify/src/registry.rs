//! Insertion-ordered registry of state-change observers.
//!
//! Entries live in an arena owned by the registry and are chained in
//! registration order through slot indices, so removal is O(1) and never
//! touches caller memory. Callers hold a [`CallbackHandle`] instead of the
//! entry itself. Each slot carries a generation that is bumped on removal,
//! which turns a stale handle into [`NotifyError::NotFound`] even after the
//! slot has been reused.
//!
//! Dispatch copies the current order out of the lock before delivering, so
//! observers may register or unregister (themselves included) while a
//! notification is in flight.

use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{NotifyError, NotifyResult};
use crate::flags::ChangedFlags;
use crate::observer::{ObserverRef, StateChangedCallback};
use crate::sync::{Arc, Mutex};

static NEXT_REGISTRY_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque ticket returned by [`CallbackRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackHandle {
    registry: u32,
    slot: u32,
    generation: u32,
}

struct Entry<I: ?Sized, U> {
    observer: ObserverRef<I, U>,
    user_data: Arc<U>,
    prev: Option<u32>,
    next: Option<u32>,
}

struct Slot<I: ?Sized, U> {
    generation: u32,
    entry: Option<Entry<I, U>>,
}

struct Inner<I: ?Sized, U> {
    slots: Vec<Slot<I, U>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl<I: ?Sized, U> Inner<I, U> {
    const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    fn entry_mut(&mut self, index: u32) -> Option<&mut Entry<I, U>> {
        self.slots
            .get_mut(index as usize)
            .and_then(|slot| slot.entry.as_mut())
    }

    fn allocate(&mut self) -> u32 {
        if let Some(index) = self.free.pop() {
            return index;
        }
        self.slots.push(Slot {
            generation: 0,
            entry: None,
        });
        (self.slots.len() - 1) as u32
    }

    fn push_back(&mut self, index: u32, observer: ObserverRef<I, U>, user_data: U) -> u32 {
        let prev = self.tail;
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(Entry {
            observer,
            user_data: Arc::new(user_data),
            prev,
            next: None,
        });
        let generation = slot.generation;

        match prev.and_then(|tail| self.entry_mut(tail)) {
            Some(tail) => tail.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        generation
    }

    fn unlink(&mut self, index: u32, generation: u32) -> NotifyResult<()> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == generation)
            .ok_or(NotifyError::NotFound)?;
        let entry = slot.entry.take().ok_or(NotifyError::NotFound)?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);

        match entry.prev.and_then(|prev| self.entry_mut(prev)) {
            Some(prev) => prev.next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next.and_then(|next| self.entry_mut(next)) {
            Some(next) => next.prev = entry.prev,
            None => self.tail = entry.prev,
        }
        self.len -= 1;
        Ok(())
    }

    fn ordered(&self) -> OrderIter<'_, I, U> {
        OrderIter {
            inner: self,
            cursor: self.head,
        }
    }
}

struct OrderIter<'a, I: ?Sized, U> {
    inner: &'a Inner<I, U>,
    cursor: Option<u32>,
}

impl<'a, I: ?Sized, U> Iterator for OrderIter<'a, I, U> {
    type Item = (u32, u32, &'a Entry<I, U>);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let slot = self.inner.slots.get(index as usize)?;
        let entry = slot.entry.as_ref()?;
        self.cursor = entry.next;
        Some((index, slot.generation, entry))
    }
}

/// Ordered set of registered observers, safe to share between threads.
pub struct CallbackRegistry<I: ?Sized, U = ()> {
    id: u32,
    inner: Mutex<Inner<I, U>>,
}

impl<I: ?Sized, U> CallbackRegistry<I, U> {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Appends `callback` to the end of the dispatch order.
    pub fn register(&self, callback: StateChangedCallback<I, U>) -> NotifyResult<CallbackHandle> {
        let StateChangedCallback {
            observer,
            user_data,
        } = callback;
        let observer = observer.ok_or(NotifyError::InvalidArgument)?;

        let mut inner = self.inner.lock();
        let slot = inner.allocate();
        let generation = inner.push_back(slot, observer, user_data);
        log::trace!("registry {}: registered slot {slot} gen {generation}", self.id);

        Ok(CallbackHandle {
            registry: self.id,
            slot,
            generation,
        })
    }

    /// Removes the entry identified by `handle`.
    pub fn unregister(&self, handle: CallbackHandle) -> NotifyResult<()> {
        if handle.registry != self.id {
            return Err(NotifyError::InvalidArgument);
        }

        self.inner.lock().unlink(handle.slot, handle.generation)?;
        log::trace!("registry {}: removed slot {}", self.id, handle.slot);
        Ok(())
    }

    pub fn contains(&self, handle: CallbackHandle) -> bool {
        if handle.registry != self.id {
            return false;
        }
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.slot as usize)
            .is_some_and(|slot| slot.generation == handle.generation && slot.entry.is_some())
    }

    /// Handles of the registered entries, in dispatch order.
    pub fn handles(&self) -> Vec<CallbackHandle> {
        self.inner
            .lock()
            .ordered()
            .map(|(slot, generation, _)| CallbackHandle {
                registry: self.id,
                slot,
                generation,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Outstanding handles become stale.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let Inner {
            slots,
            free,
            head,
            tail,
            len,
        } = &mut *inner;
        free.clear();
        for (index, slot) in slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            free.push(index as u32);
        }
        free.reverse();
        *head = None;
        *tail = None;
        *len = 0;
    }

    /// Invokes every registered observer, in registration order, with
    /// `(flags, instance, user_data)`. Returns the number of observers
    /// invoked.
    pub fn dispatch(&self, flags: ChangedFlags, instance: &I) -> usize {
        let snapshot = self.snapshot();
        for (observer, user_data) in &snapshot {
            deliver(observer, flags, instance, user_data);
        }
        snapshot.len()
    }

    fn snapshot(&self) -> Vec<(ObserverRef<I, U>, Arc<U>)> {
        let inner = self.inner.lock();
        let mut snapshot = Vec::with_capacity(inner.len);
        snapshot.extend(
            inner
                .ordered()
                .map(|(_, _, entry)| (Arc::clone(&entry.observer), Arc::clone(&entry.user_data))),
        );
        snapshot
    }
}

#[cfg(feature = "std")]
fn deliver<I: ?Sized, U>(
    observer: &ObserverRef<I, U>,
    flags: ChangedFlags,
    instance: &I,
    user_data: &U,
) {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        observer.state_changed(flags, instance, user_data)
    }));
    if outcome.is_err() {
        log::error!("state observer panicked while handling flags {flags}");
    }
}

// Without unwinding support a panicking observer is fatal.
#[cfg(not(feature = "std"))]
fn deliver<I: ?Sized, U>(
    observer: &ObserverRef<I, U>,
    flags: ChangedFlags,
    instance: &I,
    user_data: &U,
) {
    observer.state_changed(flags, instance, user_data)
}

impl<I: ?Sized, U> Default for CallbackRegistry<I, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ?Sized, U> fmt::Debug for CallbackRegistry<I, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}
