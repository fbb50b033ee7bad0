use rand::seq::SliceRandom;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, MutexGuard};

use crate::channel::{Chan, Channel, PollRecv, PollSend, Recv};
use crate::signal::Signal;
use crate::waiter::Waiter;

/// Lock-side view of a channel, independent of its element type. Lets the
/// engine hold one guard per distinct channel while the cases keep their
/// typed handles.
pub(crate) trait LockChan {
    fn chan_id(&self) -> u64;
    fn raw_lock(&self) -> MutexGuard<'_, ()>;
}

impl<T: 'static> LockChan for Channel<T> {
    fn chan_id(&self) -> u64 {
        self.id()
    }

    fn raw_lock(&self) -> MutexGuard<'_, ()> {
        self.lock()
    }
}

/// Pass-1 outcome for a single case.
enum Poll {
    /// The operation completed; run the handler once all locks are dropped.
    Ready,
    Pending,
    /// A send case observed a closed channel.
    ClosedSend,
}

/// The per-case operations the engine drives. Methods marked unsafe require
/// the case's channel lock to be held.
trait CaseOp<R> {
    fn chan_id(&self) -> u64;
    fn locker(&self) -> Arc<dyn LockChan>;
    /// Pass 1: try to complete synchronously.
    ///
    /// # Safety
    /// The case's channel lock must be held.
    unsafe fn poll(&mut self) -> Poll;
    /// Pass 2: enqueue a waiter sharing the select's flag and park slot.
    ///
    /// # Safety
    /// The case's channel lock must be held.
    unsafe fn register(&mut self, done: &Arc<AtomicBool>, park: &Arc<Signal>, index: usize);
    /// Pass 3: pull the waiter back out of its queue.
    ///
    /// # Safety
    /// The case's channel lock must be held.
    unsafe fn unregister(&mut self);
    /// Wakes the counterparty left over from `poll`, if any, and runs the
    /// handler. Called with no locks held.
    fn complete(&mut self) -> R;
}

/// One branch of a [`select`]: a pending receive or send on some channel.
pub struct Case<'a, R> {
    op: Box<dyn CaseOp<R> + 'a>,
}

impl<'a, R> Case<'a, R> {
    /// A receive case. `handler` runs with the outcome if this case wins.
    pub fn recv<T: 'static>(chan: &Chan<T>, handler: impl FnOnce(Recv<T>) -> R + 'a) -> Self {
        Self {
            op: Box::new(RecvCase {
                chan: chan.clone(),
                handler: Some(handler),
                outcome: None,
                wake: None,
                waiter: None,
            }),
        }
    }

    /// A send case offering `value`. `handler` runs after delivery if this
    /// case wins.
    pub fn send<T: 'static>(chan: &Chan<T>, value: T, handler: impl FnOnce() -> R + 'a) -> Self {
        Self {
            op: Box::new(SendCase {
                chan: chan.clone(),
                value: Some(value),
                handler: Some(handler),
                wake: None,
                waiter: None,
            }),
        }
    }
}

struct RecvCase<T: 'static, F> {
    chan: Chan<T>,
    handler: Option<F>,
    outcome: Option<Recv<T>>,
    wake: Option<Arc<Waiter<T>>>,
    waiter: Option<Arc<Waiter<T>>>,
}

impl<T: 'static, F, R> CaseOp<R> for RecvCase<T, F>
where
    F: FnOnce(Recv<T>) -> R,
{
    fn chan_id(&self) -> u64 {
        self.chan.inner().id()
    }

    fn locker(&self) -> Arc<dyn LockChan> {
        self.chan.inner().clone()
    }

    unsafe fn poll(&mut self) -> Poll {
        match self.chan.inner().poll_recv() {
            PollRecv::Msg(value, sender) => {
                self.outcome = Some(Recv::Msg(value));
                self.wake = sender;
                Poll::Ready
            }
            PollRecv::Closed => {
                self.outcome = Some(Recv::Closed);
                Poll::Ready
            }
            PollRecv::Empty => Poll::Pending,
        }
    }

    unsafe fn register(&mut self, done: &Arc<AtomicBool>, park: &Arc<Signal>, index: usize) {
        let waiter = Waiter::for_select(None, done.clone(), park.clone(), index);
        self.chan.inner().register_receiver(waiter.clone());
        self.waiter = Some(waiter);
    }

    unsafe fn unregister(&mut self) {
        if let Some(waiter) = &self.waiter {
            self.chan.inner().unregister_receiver(waiter.sid());
        }
    }

    fn complete(&mut self) -> R {
        if let Some(tx) = self.wake.take() {
            tx.park.notify(Some(tx.case_index));
        }
        let outcome = match self.outcome.take() {
            Some(outcome) => outcome,
            // Won while parked: the sender wrote into our waiter's slot.
            None => {
                let waiter = match self.waiter.take() {
                    Some(waiter) => waiter,
                    None => unreachable!("select case completed without a waiter"),
                };
                match unsafe { waiter.take() } {
                    Some(value) => Recv::Msg(value),
                    None => unreachable!("woken receiver without a value"),
                }
            }
        };
        match self.handler.take() {
            Some(handler) => handler(outcome),
            None => unreachable!("select case completed twice"),
        }
    }
}

struct SendCase<T: 'static, F> {
    chan: Chan<T>,
    value: Option<T>,
    handler: Option<F>,
    wake: Option<Arc<Waiter<T>>>,
    waiter: Option<Arc<Waiter<T>>>,
}

impl<T: 'static, F, R> CaseOp<R> for SendCase<T, F>
where
    F: FnOnce() -> R,
{
    fn chan_id(&self) -> u64 {
        self.chan.inner().id()
    }

    fn locker(&self) -> Arc<dyn LockChan> {
        self.chan.inner().clone()
    }

    unsafe fn poll(&mut self) -> Poll {
        let value = match self.value.take() {
            Some(value) => value,
            None => unreachable!("send case polled without a value"),
        };
        match self.chan.inner().poll_send(value) {
            PollSend::Sent(receiver) => {
                self.wake = receiver;
                Poll::Ready
            }
            PollSend::Full(value) => {
                self.value = Some(value);
                Poll::Pending
            }
            PollSend::Closed(value) => {
                self.value = Some(value);
                Poll::ClosedSend
            }
        }
    }

    unsafe fn register(&mut self, done: &Arc<AtomicBool>, park: &Arc<Signal>, index: usize) {
        let value = match self.value.take() {
            Some(value) => value,
            None => unreachable!("send case registered without a value"),
        };
        let waiter = Waiter::for_select(Some(value), done.clone(), park.clone(), index);
        self.chan.inner().register_sender(waiter.clone());
        self.waiter = Some(waiter);
    }

    unsafe fn unregister(&mut self) {
        if let Some(waiter) = self.waiter.take() {
            self.chan.inner().unregister_sender(waiter.sid());
            // A losing send case keeps its value for the next round; a
            // winning one finds the slot already emptied by the receiver
            // that claimed it.
            if let Some(value) = waiter.take() {
                self.value = Some(value);
            }
        }
    }

    fn complete(&mut self) -> R {
        if let Some(rx) = self.wake.take() {
            rx.park.notify(Some(rx.case_index));
        }
        match self.handler.take() {
            Some(handler) => handler(),
            None => unreachable!("select case completed twice"),
        }
    }
}

/// Blocks until exactly one case completes, then runs that case's handler
/// and returns its result.
///
/// Among simultaneously ready cases the winner is drawn from a fresh random
/// permutation, so no case is preferred by position. A send case on a closed
/// channel panics with "send on closed channel"; a receive case on a closed
/// channel completes with [`Recv::Closed`].
///
/// Panics if `cases` is empty.
pub fn select<R>(cases: Vec<Case<'_, R>>) -> R {
    select_inner(cases, None::<fn() -> R>)
}

/// Like [`select`], but runs `default` instead of blocking when no case is
/// immediately ready.
pub fn select_or<R, D: FnOnce() -> R>(cases: Vec<Case<'_, R>>, default: D) -> R {
    select_inner(cases, Some(default))
}

fn select_inner<R, D: FnOnce() -> R>(mut cases: Vec<Case<'_, R>>, default: Option<D>) -> R {
    let mut default = default;
    if cases.is_empty() {
        match default.take() {
            Some(default) => return default(),
            None => panic!("select with no cases"),
        }
    }

    // Locks are taken per distinct channel, ascending by id. Single ops lock
    // one channel, so a global order on ids rules out deadlock.
    let mut lockers: Vec<Arc<dyn LockChan>> = cases.iter().map(|case| case.op.locker()).collect();
    lockers.sort_by_key(|locker| locker.chan_id());
    lockers.dedup_by_key(|locker| locker.chan_id());

    let mut lock_order: Vec<usize> = (0..cases.len()).collect();
    lock_order.sort_by_key(|&i| (cases[i].op.chan_id(), i));

    let mut poll_order: Vec<usize> = (0..cases.len()).collect();
    let mut rng = rand::thread_rng();

    loop {
        poll_order.shuffle(&mut rng);

        let mut guards = lock_all(&lockers);

        // Pass 1: try every case in poll order with every lock held.
        let mut ready = None;
        for &i in &poll_order {
            match unsafe { cases[i].op.poll() } {
                Poll::Ready => {
                    ready = Some(i);
                    break;
                }
                Poll::ClosedSend => {
                    unlock_all(guards);
                    panic!("send on closed channel");
                }
                Poll::Pending => {}
            }
        }
        if let Some(i) = ready {
            unlock_all(guards);
            return cases[i].op.complete();
        }

        if let Some(default) = default.take() {
            unlock_all(guards);
            return default();
        }

        // Pass 2: park on every case at once. The shared flag serializes the
        // wakers; whoever claims it first owns this select.
        let done = Arc::new(AtomicBool::new(false));
        let park = Arc::new(Signal::new());
        for &i in &lock_order {
            unsafe { cases[i].op.register(&done, &park, i) };
        }
        unlock_all(guards);

        let woken = park.wait();

        // Pass 3: pull every remaining waiter back out. Winners and waiters
        // collected by counterparties are already gone; removal tolerates
        // that.
        guards = lock_all(&lockers);
        for &i in &lock_order {
            unsafe { cases[i].op.unregister() };
        }
        unlock_all(guards);

        match woken {
            Some(winner) => return cases[winner].op.complete(),
            // A channel closed under us. Rerun the poll so the closed
            // channel's own case observes it and fairness still applies.
            None => continue,
        }
    }
}

fn lock_all<'a>(lockers: &'a [Arc<dyn LockChan>]) -> Vec<MutexGuard<'a, ()>> {
    lockers.iter().map(|locker| locker.raw_lock()).collect()
}

fn unlock_all(mut guards: Vec<MutexGuard<'_, ()>>) {
    while let Some(guard) = guards.pop() {
        drop(guard);
    }
}

/// Waits on multiple receive cases, running the body of whichever wins.
///
/// Send cases go through [`Case::send`] and the [`select`] function.
///
/// # Examples
///
/// ```
/// use savak::{make, Recv};
///
/// let a = make::<i32>(1);
/// let b = make::<i32>(1);
///
/// a.send(10).unwrap();
///
/// savak::select! {
///     m = a => assert_eq!(m, Recv::Msg(10)),
///     _m = b => panic!("b is empty"),
/// }
/// ```
///
/// With a default case:
///
/// ```
/// use savak::make;
///
/// let a = make::<i32>(1);
///
/// let label = savak::select! {
///     _m = a => "recv";
///     default => "idle",
/// };
/// assert_eq!(label, "idle");
/// ```
#[macro_export]
macro_rules! select {
    // Cases with default
    (
        $($name:ident = $ch:expr => $body:expr),* ;
        default => $default:expr $(,)?
    ) => {
        $crate::select_or(
            vec![ $( $crate::Case::recv(&$ch, |$name| $body) ),* ],
            || $default,
        )
    };
    // Cases without default
    (
        $($name:ident = $ch:expr => $body:expr),* $(,)?
    ) => {
        $crate::select(vec![ $( $crate::Case::recv(&$ch, |$name| $body) ),* ])
    };
}
