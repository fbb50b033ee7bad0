//! Bounded multi-producer multi-consumer channels with multi-way select.
//!
//! This crate provides Go-style channels: a fixed-capacity FIFO that hands
//! values directly between parked senders and receivers whenever the buffer
//! cannot, plus a [`select`] operation that atomically commits to exactly
//! one of several pending sends and receives.
//!
//! # Key Features
//!
//! - **Multi-producer Multi-consumer (MPMC)**: clones of a [`Chan`] share one channel.
//! - **Synchronous rendezvous**: capacity 0 pairs every send with a receive.
//! - **Close semantics**: [`Chan::close`] wakes every parked operation; buffered values stay receivable and late receivers observe [`Recv::Closed`].
//! - **Select**: [`select`], [`select_or`] and the [`select!`] macro wait on many cases, run exactly one handler, and choose fairly among ready cases.
//! - **Timer channels**: [`after`], [`tick`] and [`never`] compose timeouts and pacing into selects.
//!
//! # Example
//!
//! ```rust
//! use savak::{make, select, Case, Recv};
//! use std::thread;
//!
//! let c1 = make::<i32>(1);
//! let c2 = make::<i32>(1);
//!
//! thread::spawn({
//!     let c1 = c1.clone();
//!     move || c1.send(10).unwrap()
//! });
//!
//! let got = select(vec![
//!     Case::recv(&c1, |m| m.msg()),
//!     Case::recv(&c2, |m| m.msg()),
//! ]);
//! assert_eq!(got, Some(10));
//! ```
//!
//! Capacity 0 gives a rendezvous channel:
//!
//! ```rust
//! use savak::{make, Recv};
//! use std::thread;
//!
//! let c = make::<&str>(0);
//! let tx = c.clone();
//! let t = thread::spawn(move || tx.send("hi").unwrap());
//! assert_eq!(c.recv(), Recv::Msg("hi"));
//! t.join().unwrap();
//! ```

#![warn(missing_docs)]

mod channel;
mod error;
mod id;
mod select;
mod signal;
mod waiter;

pub use channel::{Chan, Recv};
pub use error::{CloseError, SendError, TrySendError};
pub use select::{select, select_or, Case};

use std::thread;
use std::time::{Duration, Instant};

/// Creates a channel with the given capacity.
///
/// Capacity 0 creates a synchronous channel: every send blocks until a
/// receiver takes the value, and vice versa.
pub fn make<T: 'static>(capacity: usize) -> Chan<T> {
    Chan::new(capacity)
}

/// Creates a channel that delivers the current time once, after `duration`.
pub fn after(duration: Duration) -> Chan<Instant> {
    let chan = make(1);
    let tx = chan.clone();
    thread::spawn(move || {
        thread::sleep(duration);
        let _ = tx.send(Instant::now());
    });
    chan
}

/// Creates a channel that delivers the current time every `duration`.
///
/// The timer stops once the caller closes the channel.
pub fn tick(duration: Duration) -> Chan<Instant> {
    let chan = make(1);
    let tx = chan.clone();
    thread::spawn(move || loop {
        thread::sleep(duration);
        if tx.send(Instant::now()).is_err() {
            break;
        }
    });
    chan
}

/// Creates a channel on which nothing is ever sent. A receive case on it
/// never fires, which makes it a neutral filler in a [`select`].
pub fn never<T: 'static>() -> Chan<T> {
    make(0)
}
