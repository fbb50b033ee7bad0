use std::fmt;

/// Error returned by [`Chan::send`](crate::Chan::send).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SendError<T> {
    /// The channel is closed; carries the undelivered value.
    Closed(T),
}

impl<T> std::error::Error for SendError<T> {}

impl<T> fmt::Debug for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "SendError(..)".fmt(f)
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "send on closed channel".fmt(f)
    }
}

/// Error returned by [`Chan::try_send`](crate::Chan::try_send).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TrySendError<T> {
    /// The operation would have blocked: the buffer is full, or the channel
    /// has capacity 0 and no receiver is waiting. Carries the value back.
    Full(T),
    /// The channel is closed; carries the undelivered value.
    Closed(T),
}

impl<T> std::error::Error for TrySendError<T> {}

impl<T> fmt::Debug for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TrySendError::Full(..) => "Full(..)".fmt(f),
            TrySendError::Closed(..) => "Closed(..)".fmt(f),
        }
    }
}

impl<T> fmt::Display for TrySendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrySendError::Full(..) => "sending on a full channel".fmt(f),
            TrySendError::Closed(..) => "send on closed channel".fmt(f),
        }
    }
}

/// Error returned by [`Chan::close`](crate::Chan::close) when the channel is
/// already closed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct CloseError;

impl std::error::Error for CloseError {}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "close of closed channel".fmt(f)
    }
}
