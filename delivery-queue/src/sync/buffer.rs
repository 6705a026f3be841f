//! Unbounded mutex-protected FIFO buffer.
//!
//! The buffer never refuses an item: [`Buffer::push`] always succeeds and
//! never blocks, so a producer that outruns its consumer grows the buffer
//! without limit. Callers that need backpressure can watch [`Buffer::len`].
//!
//! # Example
//!
//! ```
//! use delivery_queue::sync::Buffer;
//!
//! let buffer = Buffer::new();
//! buffer.push("a");
//! buffer.push("b");
//!
//! assert_eq!(buffer.pop(), Some("a"));
//! assert_eq!(buffer.pull(), "b");
//! assert_eq!(buffer.pop(), None);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use crossbeam_channel::Receiver;
use minstant::Instant;

use crate::sync::stream::{self, Stream};
use crate::trace::debug;

/// Capacity of the channel behind [`Buffer::as_stream`] unless configured.
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

/// Timeout specification for blocking operations.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Wait indefinitely.
    Infinite,
    /// Wait for at most the specified duration.
    Duration(Duration),
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

/// State shared between every handle to one buffer and its stream forwarder.
pub(crate) struct Shared<T> {
    items: Mutex<VecDeque<T>>,
    /// Signalled on push and on close.
    available: Condvar,
    closed: AtomicBool,
    stream: OnceLock<Receiver<T>>,
    stream_capacity: usize,
}

impl<T> Shared<T> {
    // A panicking holder cannot leave the deque half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, item: T) {
        self.lock().push_back(item);
        self.available.notify_one();
    }

    /// Returns an item taken by the forwarder to the head of the buffer.
    pub(crate) fn push_front(&self, item: T) {
        self.lock().push_front(item);
        self.available.notify_one();
    }

    fn pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Blocks for the next item, or returns `None` once the buffer is closed.
    pub(crate) fn pull_or_closed(&self) -> Option<T> {
        let mut items = self.lock();
        loop {
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            items = self
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Unbounded, thread-safe FIFO buffer.
///
/// `Buffer` is a handle: clones share the same items. All operations take
/// `&self` and may be called from any thread.
pub struct Buffer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .field("streaming", &self.shared.stream.get().is_some())
            .finish()
    }
}

impl<T> Buffer<T> {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::with_stream_capacity(DEFAULT_STREAM_CAPACITY)
    }

    /// Creates an empty buffer whose stream view uses a channel of the given
    /// capacity. A capacity of zero makes every stream hand-off a rendezvous.
    #[must_use]
    pub fn with_stream_capacity(stream_capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(VecDeque::new()),
                available: Condvar::new(),
                closed: AtomicBool::new(false),
                stream: OnceLock::new(),
                stream_capacity,
            }),
        }
    }

    /// Appends an item to the tail. Never blocks and never fails.
    #[inline]
    pub fn push(&self, item: T) {
        self.shared.push(item);
    }

    /// Removes the head item without blocking.
    ///
    /// Returns `None` immediately if the buffer is empty.
    #[inline]
    #[must_use]
    pub fn pop(&self) -> Option<T> {
        self.shared.pop()
    }

    /// Blocks until an item is available, then removes and returns it.
    ///
    /// There is no cancellation: on a buffer that never receives another
    /// item this waits forever. Use [`Buffer::pull_timeout`] for a bounded wait.
    #[must_use]
    pub fn pull(&self) -> T {
        let mut items = self.shared.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self
                .shared
                .available
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`Buffer::pull`], but gives up after `timeout`.
    ///
    /// Returns `None` only if the deadline passed with the buffer still empty.
    #[must_use]
    pub fn pull_timeout(&self, timeout: impl Into<Timeout>) -> Option<T> {
        let d = match timeout.into() {
            Timeout::Infinite => return Some(self.pull()),
            Timeout::Duration(d) => d,
        };
        let mut items = self.shared.lock();
        if let Some(item) = items.pop_front() {
            return Some(item);
        }
        // A deadline past the clock's range is no different from waiting forever.
        let Some(deadline) = Instant::now().checked_add(d) else {
            drop(items);
            return Some(self.pull());
        };
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            items = self
                .shared
                .available
                .wait_timeout(items, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
        }
    }

    /// Number of items currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    /// Returns `true` if no items are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    /// Stops the stream forwarder started by [`Buffer::as_stream`].
    ///
    /// Idempotent. Buffered items are kept and push/pop/pull keep working.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(buffered = self.len(), "buffer closed");
        // Taking the lock orders this wake-up after a forwarder's closed check.
        drop(self.shared.lock());
        self.shared.available.notify_all();
    }

    /// Returns `true` once [`Buffer::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl<T: Send + 'static> Buffer<T> {
    /// Presents the buffer as a channel of items.
    ///
    /// The first call creates a bounded channel and spawns a forwarder thread
    /// that moves items from the buffer into it until [`Buffer::close`] is
    /// called; the channel then closes once. Later calls return another
    /// receiver for the same channel.
    ///
    /// The forwarder keeps the buffer's shared state alive. Dropping every
    /// handle does not stop it: call [`Buffer::close`] to release the thread.
    ///
    /// Pulling or popping directly while a stream is active is memory-safe,
    /// but either side may take any given item.
    ///
    /// # Panics
    ///
    /// Panics if the forwarder thread cannot be spawned.
    #[must_use]
    pub fn as_stream(&self) -> Stream<T> {
        let rx = self.shared.stream.get_or_init(|| {
            stream::spawn_forwarder(Arc::clone(&self.shared), self.shared.stream_capacity)
        });
        Stream::new(rx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let buffer = Buffer::new();
        for i in 0..10 {
            buffer.push(i);
        }
        for i in 0..10 {
            assert_eq!(buffer.pop(), Some(i));
        }
        assert_eq!(buffer.pop(), None);
    }

    #[test]
    fn test_pop_empty_returns_immediately() {
        let buffer = Buffer::<u64>::new();
        let start = std::time::Instant::now();
        assert_eq!(buffer.pop(), None);
        assert!(start.elapsed() < Duration::from_millis(50));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_len_tracks_push_and_pop() {
        let buffer = Buffer::new();
        assert_eq!(buffer.len(), 0);
        buffer.push("x");
        buffer.push("y");
        assert_eq!(buffer.len(), 2);
        let _ = buffer.pop();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_clones_share_items() {
        let a = Buffer::new();
        let b = a.clone();
        a.push(7u32);
        assert_eq!(b.pop(), Some(7));
        assert!(a.is_empty());
    }

    #[test]
    fn test_pull_waits_for_push_from_other_thread() {
        let buffer = Buffer::new();
        let producer = buffer.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            producer.push(42u64);
        });

        assert_eq!(buffer.pull(), 42);
        handle.join().unwrap();
    }

    #[test]
    fn test_pull_timeout_expires_on_empty_buffer() {
        let buffer = Buffer::<u64>::new();
        let start = std::time::Instant::now();
        assert_eq!(buffer.pull_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_pull_timeout_returns_available_item() {
        let buffer = Buffer::new();
        buffer.push(1u8);
        assert_eq!(buffer.pull_timeout(Duration::ZERO), Some(1));
        buffer.push(2u8);
        assert_eq!(buffer.pull_timeout(Timeout::Infinite), Some(2));
    }

    #[test]
    fn test_pull_timeout_huge_duration() {
        let buffer = Buffer::new();
        buffer.push(1u8);
        assert_eq!(buffer.pull_timeout(Duration::MAX), Some(1));

        let producer = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            producer.push(2u8);
        });
        assert_eq!(buffer.pull_timeout(Duration::MAX), Some(2));
        handle.join().unwrap();
    }

    #[test]
    fn test_push_never_blocks() {
        let buffer = Buffer::new();
        let start = std::time::Instant::now();
        for i in 0..100_000u64 {
            buffer.push(i);
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(buffer.len(), 100_000);
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 1000;

        let buffer = Buffer::new();
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        buffer.push((p, i));
                    }
                })
            })
            .collect();

        let mut next = vec![0u64; PRODUCERS as usize];
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let (p, i) = buffer.pull();
            assert_eq!(i, next[p as usize], "producer {p} out of order");
            next[p as usize] += 1;
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_close_is_idempotent_without_stream() {
        let buffer = Buffer::new();
        buffer.push(1);
        buffer.close();
        buffer.close();
        assert!(buffer.is_closed());
        assert_eq!(buffer.pull(), 1);
    }

    #[test]
    fn test_non_copy_type() {
        let buffer = Buffer::new();
        buffer.push("hello".to_string());
        buffer.push("world".to_string());
        assert_eq!(buffer.pop(), Some("hello".to_string()));
        assert_eq!(buffer.pull(), "world".to_string());
    }
}
