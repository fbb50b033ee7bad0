use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_utils::CachePadded;

use crate::error::{CloseError, SendError, TrySendError};
use crate::id;
use crate::waiter::{Waiter, WaiterQueue};

/// Result of a receive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recv<T> {
    /// A value was delivered.
    Msg(T),
    /// The channel is closed and its buffer is drained.
    Closed,
}

impl<T> Recv<T> {
    /// Returns the delivered value, or `None` for [`Recv::Closed`].
    pub fn msg(self) -> Option<T> {
        match self {
            Recv::Msg(value) => Some(value),
            Recv::Closed => None,
        }
    }

    /// Returns true for [`Recv::Closed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, Recv::Closed)
    }
}

/// Mutable channel state. Guarded by `Channel::mutex`.
struct State<T> {
    buf: Box<[MaybeUninit<T>]>,
    sendx: usize,
    recvx: usize,
    send_q: WaiterQueue<T>,
    recv_q: WaiterQueue<T>,
}

pub(crate) struct Channel<T: 'static> {
    id: u64,
    capacity: usize,
    /// Set once, under the lock. Unlocked reads in the fast paths are
    /// advisory; the locked path re-validates.
    closed: AtomicBool,
    /// Number of buffered items. Written only under the lock.
    qcount: CachePadded<AtomicUsize>,
    /// Mirrors of the waiter queue lengths for the unlocked fast paths.
    send_waiting: AtomicUsize,
    recv_waiting: AtomicUsize,
    mutex: CachePadded<Mutex<()>>,
    state: UnsafeCell<State<T>>,
}

unsafe impl<T: 'static + Send> Send for Channel<T> {}
unsafe impl<T: 'static + Send> Sync for Channel<T> {}

/// Outcome of [`Channel::poll_send`].
pub(crate) enum PollSend<T> {
    /// Delivered. A dequeued receiver, if any, must be woken after unlock.
    Sent(Option<Arc<Waiter<T>>>),
    /// No receiver and no buffer space.
    Full(T),
    /// The channel is closed.
    Closed(T),
}

/// Outcome of [`Channel::poll_recv`].
pub(crate) enum PollRecv<T> {
    /// A value. A dequeued sender, if any, must be woken after unlock.
    Msg(T, Option<Arc<Waiter<T>>>),
    /// Closed with an empty buffer.
    Closed,
    /// No sender and no buffered value.
    Empty,
}

impl<T: 'static> Channel<T> {
    fn new(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buf.push(MaybeUninit::uninit());
        }
        Self {
            id: id::next_channel_id(),
            capacity,
            closed: AtomicBool::new(false),
            qcount: CachePadded::new(AtomicUsize::new(0)),
            send_waiting: AtomicUsize::new(0),
            recv_waiting: AtomicUsize::new(0),
            mutex: CachePadded::new(Mutex::new(())),
            state: UnsafeCell::new(State {
                buf: buf.into_boxed_slice(),
                sendx: 0,
                recvx: 0,
                send_q: WaiterQueue::new(),
                recv_q: WaiterQueue::new(),
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().unwrap()
    }

    /// Advisory unlocked check that a non-blocking send would block.
    /// Reads closed, then the receiver-queue head, then the item count.
    fn send_would_block(&self) -> bool {
        let closed = self.closed.load(Ordering::Acquire);
        let no_receiver = self.recv_waiting.load(Ordering::Acquire) == 0;
        let count = self.qcount.load(Ordering::Acquire);
        !closed
            && if self.capacity == 0 {
                no_receiver
            } else {
                count == self.capacity
            }
    }

    /// Advisory unlocked check that a non-blocking receive would block.
    /// Reads the sender-queue head, then the item count, then closed.
    fn recv_would_block(&self) -> bool {
        let no_sender = self.send_waiting.load(Ordering::Acquire) == 0;
        let count = self.qcount.load(Ordering::Acquire);
        let closed = self.closed.load(Ordering::Acquire);
        !closed
            && if self.capacity == 0 {
                no_sender
            } else {
                count == 0
            }
    }

    /// Attempts the synchronous part of a send: direct handoff to a parked
    /// receiver, then the buffer.
    ///
    /// # Safety
    /// The channel lock must be held by the caller.
    pub(crate) unsafe fn poll_send(&self, value: T) -> PollSend<T> {
        let st = &mut *self.state.get();
        if self.closed.load(Ordering::Relaxed) {
            return PollSend::Closed(value);
        }
        let receiver = st.recv_q.dequeue();
        self.recv_waiting.store(st.recv_q.len(), Ordering::Release);
        if let Some(rx) = receiver {
            rx.put(value);
            return PollSend::Sent(Some(rx));
        }
        let count = self.qcount.load(Ordering::Relaxed);
        if count < self.capacity {
            st.buf[st.sendx].write(value);
            st.sendx = (st.sendx + 1) % self.capacity;
            self.qcount.store(count + 1, Ordering::Release);
            return PollSend::Sent(None);
        }
        PollSend::Full(value)
    }

    /// Attempts the synchronous part of a receive: the buffer and parked
    /// senders, then the closed check.
    ///
    /// # Safety
    /// The channel lock must be held by the caller.
    pub(crate) unsafe fn poll_recv(&self) -> PollRecv<T> {
        let st = &mut *self.state.get();
        let count = self.qcount.load(Ordering::Relaxed);
        if self.closed.load(Ordering::Relaxed) && count == 0 {
            return PollRecv::Closed;
        }
        let sender = st.send_q.dequeue();
        self.send_waiting.store(st.send_q.len(), Ordering::Release);
        if let Some(tx) = sender {
            let value = match tx.take() {
                Some(value) => value,
                None => unreachable!("parked sender without a value"),
            };
            if self.capacity == 0 {
                return PollRecv::Msg(value, Some(tx));
            }
            // Senders only park while the buffer is full: pop the oldest
            // item and slot the parked value in behind it. Count unchanged.
            debug_assert_eq!(count, self.capacity);
            let out = st.buf[st.recvx].assume_init_read();
            st.buf[st.recvx].write(value);
            st.recvx = (st.recvx + 1) % self.capacity;
            return PollRecv::Msg(out, Some(tx));
        }
        if count > 0 {
            let out = st.buf[st.recvx].assume_init_read();
            st.recvx = (st.recvx + 1) % self.capacity;
            self.qcount.store(count - 1, Ordering::Release);
            return PollRecv::Msg(out, None);
        }
        PollRecv::Empty
    }

    /// # Safety
    /// The channel lock must be held by the caller.
    pub(crate) unsafe fn register_sender(&self, waiter: Arc<Waiter<T>>) {
        let st = &mut *self.state.get();
        st.send_q.enqueue(waiter);
        self.send_waiting.store(st.send_q.len(), Ordering::Release);
    }

    /// # Safety
    /// The channel lock must be held by the caller.
    pub(crate) unsafe fn register_receiver(&self, waiter: Arc<Waiter<T>>) {
        let st = &mut *self.state.get();
        st.recv_q.enqueue(waiter);
        self.recv_waiting.store(st.recv_q.len(), Ordering::Release);
    }

    /// # Safety
    /// The channel lock must be held by the caller.
    pub(crate) unsafe fn unregister_sender(&self, sid: u64) {
        let st = &mut *self.state.get();
        st.send_q.remove(sid);
        self.send_waiting.store(st.send_q.len(), Ordering::Release);
    }

    /// # Safety
    /// The channel lock must be held by the caller.
    pub(crate) unsafe fn unregister_receiver(&self, sid: u64) {
        let st = &mut *self.state.get();
        st.recv_q.remove(sid);
        self.recv_waiting.store(st.recv_q.len(), Ordering::Release);
    }

    fn close(&self) -> Result<(), CloseError> {
        let guard = self.lock();
        if self.closed.load(Ordering::Relaxed) {
            return Err(CloseError);
        }
        self.closed.store(true, Ordering::Release);
        let st = unsafe { &mut *self.state.get() };
        let mut waiters = st.send_q.drain();
        waiters.extend(st.recv_q.drain());
        self.send_waiting.store(0, Ordering::Release);
        self.recv_waiting.store(0, Ordering::Release);
        drop(guard);
        // Wake outside the lock. A select waiter whose select already won
        // elsewhere fails its claim and is skipped.
        for waiter in waiters {
            if waiter.claim() {
                waiter.park.notify(None);
            }
        }
        Ok(())
    }
}

impl<T: 'static> Drop for Channel<T> {
    fn drop(&mut self) {
        let st = self.state.get_mut();
        assert!(st.send_q.is_empty(), "pending senders when dropping channel");
        assert!(
            st.recv_q.is_empty(),
            "pending receivers when dropping channel"
        );
        let mut count = *self.qcount.get_mut();
        while count > 0 {
            unsafe {
                st.buf[st.recvx].assume_init_drop();
            }
            st.recvx = (st.recvx + 1) % self.capacity;
            count -= 1;
        }
    }
}

/// A bounded channel handle. Clones share the same channel; the channel is
/// dropped when the last clone goes away.
pub struct Chan<T: 'static> {
    inner: Arc<Channel<T>>,
}

impl<T: 'static> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> Chan<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Channel::new(capacity)),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<Channel<T>> {
        &self.inner
    }

    /// Sends a value, blocking while the channel is full (or, for capacity
    /// 0, until a receiver arrives). Fails if the channel is or becomes
    /// closed before delivery, handing the value back.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        match self.send_inner(value, true) {
            Ok(()) => Ok(()),
            Err(TrySendError::Closed(value)) => Err(SendError::Closed(value)),
            Err(TrySendError::Full(_)) => unreachable!("blocking send reported full"),
        }
    }

    /// Attempts to send without blocking.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        self.send_inner(value, false)
    }

    fn send_inner(&self, value: T, block: bool) -> Result<(), TrySendError<T>> {
        if !block && self.inner.send_would_block() {
            return Err(TrySendError::Full(value));
        }
        let guard = self.inner.lock();
        match unsafe { self.inner.poll_send(value) } {
            PollSend::Sent(receiver) => {
                drop(guard);
                if let Some(rx) = receiver {
                    rx.park.notify(Some(rx.case_index));
                }
                Ok(())
            }
            PollSend::Closed(value) => Err(TrySendError::Closed(value)),
            PollSend::Full(value) if !block => Err(TrySendError::Full(value)),
            PollSend::Full(value) => {
                let waiter = Waiter::single(Some(value));
                unsafe { self.inner.register_sender(waiter.clone()) };
                drop(guard);
                match waiter.park.wait() {
                    Some(_) => Ok(()),
                    // Closed while parked; the value is still ours.
                    None => match unsafe { waiter.take() } {
                        Some(value) => Err(TrySendError::Closed(value)),
                        None => unreachable!("closed wakeup consumed a parked send"),
                    },
                }
            }
        }
    }

    /// Receives a value, blocking while the channel is empty. Returns
    /// [`Recv::Closed`] once the channel is closed and drained.
    pub fn recv(&self) -> Recv<T> {
        match self.recv_inner(true) {
            Some(result) => result,
            None => unreachable!("blocking recv reported empty"),
        }
    }

    /// Attempts to receive without blocking. `None` means the receive would
    /// have blocked.
    pub fn try_recv(&self) -> Option<Recv<T>> {
        self.recv_inner(false)
    }

    fn recv_inner(&self, block: bool) -> Option<Recv<T>> {
        if !block && self.inner.recv_would_block() {
            return None;
        }
        let guard = self.inner.lock();
        match unsafe { self.inner.poll_recv() } {
            PollRecv::Msg(value, sender) => {
                drop(guard);
                if let Some(tx) = sender {
                    tx.park.notify(Some(tx.case_index));
                }
                Some(Recv::Msg(value))
            }
            PollRecv::Closed => Some(Recv::Closed),
            PollRecv::Empty if !block => None,
            PollRecv::Empty => {
                let waiter = Waiter::single(None);
                unsafe { self.inner.register_receiver(waiter.clone()) };
                drop(guard);
                match waiter.park.wait() {
                    Some(_) => match unsafe { waiter.take() } {
                        Some(value) => Some(Recv::Msg(value)),
                        None => unreachable!("woken receiver without a value"),
                    },
                    None => Some(Recv::Closed),
                }
            }
        }
    }

    /// Closes the channel. Parked senders fail with
    /// [`SendError`](crate::SendError), parked receivers observe
    /// [`Recv::Closed`], and buffered values stay receivable.
    pub fn close(&self) -> Result<(), CloseError> {
        self.inner.close()
    }

    /// Number of buffered values.
    pub fn len(&self) -> usize {
        self.inner.qcount.load(Ordering::Acquire)
    }

    /// True if no values are buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the buffer is at capacity. Always true for capacity 0.
    pub fn is_full(&self) -> bool {
        self.len() == self.inner.capacity
    }

    /// The fixed capacity the channel was created with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// True once [`close`](Self::close) has succeeded.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}
