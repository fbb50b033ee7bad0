use std::sync::atomic::{
    AtomicU64,
    Ordering::Relaxed,
};

static CHANNEL_IDS: AtomicU64 = AtomicU64::new(0);
static WAITER_IDS: AtomicU64 = AtomicU64::new(0);

/// Mints the next channel id. Channel ids are the global order in which
/// `select` acquires locks.
pub(crate) fn next_channel_id() -> u64 {
    CHANNEL_IDS.fetch_add(1, Relaxed)
}

/// Mints the next waiter id. Waiter ids only need to be unique among live
/// waiters; queues unlink by them.
pub(crate) fn next_waiter_id() -> u64 {
    WAITER_IDS.fetch_add(1, Relaxed)
}
