use crossbeam_utils::Backoff;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, Thread};

const EMPTY: usize = 0;
const SET: usize = 1;

/// A one-shot handoff slot between a parked thread and its waker.
///
/// The waker posts a token and unparks the owner: `Some(index)` names the
/// winning waiter's case, `None` means the channel closed. At most one
/// `notify` ever happens per signal; for select waiters the `select_done`
/// claim is what admits a single poster.
pub(crate) struct Signal {
    state: AtomicUsize,
    thread: Thread,
    token: UnsafeCell<Option<usize>>,
}

unsafe impl Send for Signal {}
unsafe impl Sync for Signal {}

impl Signal {
    /// Creates a signal owned by the current thread.
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicUsize::new(EMPTY),
            thread: thread::current(),
            token: UnsafeCell::new(None),
        }
    }

    /// Blocks the owning thread until the token is posted.
    pub(crate) fn wait(&self) -> Option<usize> {
        let backoff = Backoff::new();
        while self.state.load(Ordering::Acquire) == EMPTY {
            if backoff.is_completed() {
                thread::park();
            } else {
                backoff.snooze();
            }
        }
        unsafe { *self.token.get() }
    }

    /// Posts the token and wakes the owning thread.
    pub(crate) fn notify(&self, token: Option<usize>) {
        unsafe { *self.token.get() = token };
        self.state.store(SET, Ordering::Release);
        self.thread.unpark();
    }
}
