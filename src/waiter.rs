use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::id;
use crate::signal::Signal;

/// One parked operation: a sender's offered value or a receiver's landing
/// slot, plus the park slot its thread sleeps on.
pub(crate) struct Waiter<T> {
    sid: u64,
    slot: UnsafeCell<Option<T>>,
    pub(crate) park: Arc<Signal>,
    select_done: Option<Arc<AtomicBool>>,
    pub(crate) case_index: usize,
}

unsafe impl<T: Send> Send for Waiter<T> {}
unsafe impl<T: Send> Sync for Waiter<T> {}

impl<T> Waiter<T> {
    /// Waiter for a plain blocking send (`value` is `Some`) or recv (`None`).
    pub(crate) fn single(value: Option<T>) -> Arc<Self> {
        Arc::new(Self {
            sid: id::next_waiter_id(),
            slot: UnsafeCell::new(value),
            park: Arc::new(Signal::new()),
            select_done: None,
            case_index: 0,
        })
    }

    /// Waiter for one case of a select. All cases of the select share `done`
    /// and `park`.
    pub(crate) fn for_select(
        value: Option<T>,
        done: Arc<AtomicBool>,
        park: Arc<Signal>,
        case_index: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            sid: id::next_waiter_id(),
            slot: UnsafeCell::new(value),
            park,
            select_done: Some(done),
            case_index,
        })
    }

    pub(crate) fn sid(&self) -> u64 {
        self.sid
    }

    /// Claims the right to wake this waiter. For a select waiter the first
    /// claimant across all of the select's channels wins; everyone else must
    /// leave the waiter alone.
    pub(crate) fn claim(&self) -> bool {
        match &self.select_done {
            None => true,
            Some(done) => done
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok(),
        }
    }

    /// Writes a value into the slot.
    ///
    /// # Safety
    /// The caller must hold exclusive handoff rights: it just dequeued (and
    /// claimed) this waiter, or it owns the waiter outright.
    pub(crate) unsafe fn put(&self, value: T) {
        *self.slot.get() = Some(value);
    }

    /// Takes the slot's value, if any.
    ///
    /// # Safety
    /// Same exclusivity contract as [`put`](Self::put); the parked owner may
    /// only call this after its `wait` returned.
    pub(crate) unsafe fn take(&self) -> Option<T> {
        (*self.slot.get()).take()
    }
}

/// FIFO of parked operations on one side of a channel.
pub(crate) struct WaiterQueue<T> {
    waiters: VecDeque<Arc<Waiter<T>>>,
}

impl<T> WaiterQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            waiters: VecDeque::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Appends at the tail.
    pub(crate) fn enqueue(&mut self, waiter: Arc<Waiter<T>>) {
        self.waiters.push_back(waiter);
    }

    /// Pops the oldest claimable waiter. Waiters already won by another
    /// select case are ghosts: their claim fails and they are discarded in
    /// passing.
    pub(crate) fn dequeue(&mut self) -> Option<Arc<Waiter<T>>> {
        while let Some(waiter) = self.waiters.pop_front() {
            if waiter.claim() {
                return Some(waiter);
            }
        }
        None
    }

    /// Unlinks a waiter by id. No-op if it was already dequeued or drained.
    pub(crate) fn remove(&mut self, sid: u64) {
        if let Some(pos) = self.waiters.iter().position(|w| w.sid() == sid) {
            self.waiters.remove(pos);
        }
    }

    /// Empties the queue, handing every waiter to the caller.
    pub(crate) fn drain(&mut self) -> Vec<Arc<Waiter<T>>> {
        self.waiters.drain(..).collect()
    }
}
