//! Rate-limited delivery queue.
//!
//! [`DeliveryQueue`] buffers items from any number of producers and hands them
//! to a callback from a single polling loop, at most `max_ops_per_second`
//! dispatches per second.
//!
//! # Lifecycle
//!
//! The queue is `Running` as soon as [`DeliveryQueue::poll`] starts and becomes
//! `Stopped` after [`DeliveryQueue::stop_polling`]. A stopped queue cannot be
//! restarted. [`DeliveryQueue::add`] keeps working after the stop; those items
//! stay in the buffer until drained through [`DeliveryQueue::buffer`].
//!
//! # Pacing
//!
//! Whenever the next item arrives less than one interval after the previous
//! dispatch, the loop sleeps for a full interval rather than the remainder.
//! The configured rate is an upper bound, and under sustained load the
//! effective rate sits a little below it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! use delivery_queue::DeliveryQueue;
//!
//! let delivered = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&delivered);
//!
//! let queue = Arc::new(
//!     DeliveryQueue::builder()
//!         .max_ops_per_second(100)
//!         .deliver(move |_item: u32| {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         })
//!         .build()?,
//! );
//!
//! let poller = queue.spawn_polling();
//! for i in 0..5 {
//!     queue.add(i);
//! }
//!
//! while delivered.load(Ordering::Relaxed) < 5 {
//!     std::thread::sleep(Duration::from_millis(10));
//! }
//!
//! queue.stop_polling();
//! queue.add(0); // wakes the loop so it can observe the stop
//! poller.join().unwrap();
//! # Ok::<(), delivery_queue::QueueError>(())
//! ```

pub mod config;
pub mod dispatch;
pub mod error;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use minstant::Instant;

use crate::sync::Buffer;
use crate::trace::{debug, info, warn};

pub use config::{DEFAULT_MAX_OPS_PER_SECOND, DeliveryConfig};
pub use dispatch::DeliverFn;
pub use error::QueueError;

/// Queue with an embedded rate limiter.
///
/// The delivery callback is never dispatched more than
/// `max_ops_per_second` times per second. Dispatches run on their own
/// threads and are not awaited, so completions may arrive out of order.
pub struct DeliveryQueue<T> {
    buffer: Buffer<T>,
    interval: Duration,
    /// Held by the running poll loop for its whole lifetime.
    last_delivery: Mutex<Instant>,
    deliver: Arc<DeliverFn<T>>,
    stop: AtomicBool,
}

impl<T> fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("buffer", &self.buffer)
            .field("interval", &self.interval)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl<T> DeliveryQueue<T> {
    /// Starts building a queue.
    #[must_use]
    pub fn builder() -> DeliveryQueueBuilder<T> {
        DeliveryQueueBuilder::new()
    }

    /// Creates a queue from a configuration and a delivery callback.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfiguration`] if the configured rate is zero.
    pub fn new<F>(config: DeliveryConfig, deliver: F) -> Result<Self, QueueError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::builder().config(config).deliver(deliver).build()
    }

    /// Adds an item to the queue. Never blocks and never fails.
    #[inline]
    pub fn add(&self, item: T) {
        self.buffer.push(item);
    }

    /// Requests the polling loop to stop.
    ///
    /// The loop checks the flag between items. A loop blocked waiting for the
    /// next item stays blocked until one arrives; that item is still
    /// delivered before the loop returns.
    pub fn stop_polling(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            info!(buffered = self.buffer.len(), "stop polling requested");
        }
    }

    /// Returns `true` once [`DeliveryQueue::stop_polling`] has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Minimum time between two delivery dispatches.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of items waiting for delivery.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if no items are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The underlying buffer, e.g. to drain items left after a stop.
    #[must_use]
    pub const fn buffer(&self) -> &Buffer<T> {
        &self.buffer
    }
}

impl<T: Send + 'static> DeliveryQueue<T> {
    /// Runs the delivery loop on the calling thread until stopped.
    ///
    /// Each iteration blocks for the next item, sleeps one full interval if
    /// the previous dispatch was less than an interval ago, then hands the
    /// item to the callback on a new thread.
    ///
    /// Only one loop may run per queue. A call made while another loop is
    /// active returns immediately without delivering anything.
    pub fn poll(&self) {
        let mut last_delivery = match self.last_delivery.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                warn!("poll loop already running for this queue");
                return;
            }
        };

        info!(
            interval_us = self.interval.as_micros() as u64,
            buffered = self.buffer.len(),
            "poll loop started"
        );

        let mut dispatched: u64 = 0;
        loop {
            if self.stop.load(Ordering::Acquire) {
                info!(dispatched, "poll loop stopped");
                return;
            }

            let item = self.buffer.pull();

            if last_delivery.elapsed() < self.interval {
                debug!(dispatched, "delivery too soon, pacing");
                thread::sleep(self.interval);
            }

            dispatch::spawn_delivery(&self.deliver, item, dispatched);
            *last_delivery = Instant::now();
            dispatched += 1;
        }
    }

    /// Runs [`DeliveryQueue::poll`] on a dedicated `delivery-poll` thread.
    ///
    /// # Panics
    ///
    /// Panics if the thread cannot be spawned.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        thread::Builder::new()
            .name("delivery-poll".into())
            .spawn(move || queue.poll())
            .expect("failed to spawn poll thread")
    }
}

/// Builder for [`DeliveryQueue`].
pub struct DeliveryQueueBuilder<T> {
    config: DeliveryConfig,
    deliver: Option<Arc<DeliverFn<T>>>,
}

impl<T> Default for DeliveryQueueBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeliveryQueueBuilder<T> {
    /// Creates a builder with the default configuration and no callback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
            deliver: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: DeliveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the maximum number of dispatches per second.
    #[must_use]
    pub fn max_ops_per_second(mut self, max_ops_per_second: u32) -> Self {
        self.config.max_ops_per_second = max_ops_per_second;
        self
    }

    /// Sets the channel capacity of the buffer's stream view.
    #[must_use]
    pub fn stream_capacity(mut self, stream_capacity: usize) -> Self {
        self.config.stream_capacity = stream_capacity;
        self
    }

    /// Sets the callback invoked once per item.
    #[must_use]
    pub fn deliver<F>(mut self, deliver: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.deliver = Some(Arc::new(deliver));
        self
    }

    /// Validates the configuration and creates the queue.
    ///
    /// The construction instant counts as the last delivery, so the first
    /// item may be paced.
    ///
    /// # Errors
    ///
    /// - [`QueueError::InvalidConfiguration`] if the rate is zero
    /// - [`QueueError::MissingCallback`] if [`DeliveryQueueBuilder::deliver`] was never called
    pub fn build(self) -> Result<DeliveryQueue<T>, QueueError> {
        self.config.validate()?;
        let deliver = self.deliver.ok_or(QueueError::MissingCallback)?;
        let interval = self.config.interval();

        debug!(
            max_ops_per_second = self.config.max_ops_per_second,
            interval_us = interval.as_micros() as u64,
            "delivery queue created"
        );

        Ok(DeliveryQueue {
            buffer: Buffer::with_stream_capacity(self.config.stream_capacity),
            interval,
            last_delivery: Mutex::new(Instant::now()),
            deliver,
            stop: AtomicBool::new(false),
        })
    }
}
