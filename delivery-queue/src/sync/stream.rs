//! Channel view over a [`Buffer`](crate::sync::Buffer).
//!
//! A single forwarder thread per buffer moves items into a bounded
//! `crossbeam-channel`. The sending side lives only in that thread, so the
//! channel is closed exactly once: when the forwarder returns after
//! [`Buffer::close`](crate::sync::Buffer::close).

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

use crate::sync::buffer::Shared;
use crate::trace::{debug, info, trace};

/// How long the forwarder waits on a full channel before rechecking for close.
const CLOSE_RECHECK_INTERVAL: Duration = Duration::from_millis(10);

/// Receiving end of a buffer's stream view.
///
/// Yields items in buffer order. Iteration ends once the buffer has been
/// closed and every item already handed to the channel has been received.
#[derive(Debug, Clone)]
pub struct Stream<T> {
    rx: Receiver<T>,
}

impl<T> Stream<T> {
    pub(crate) const fn new(rx: Receiver<T>) -> Self {
        Self { rx }
    }

    /// Blocks for the next item. Returns `None` once the stream is closed and drained.
    #[must_use]
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Returns the next item if one is ready, without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next item.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Number of items waiting in the channel.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` if no items are waiting in the channel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Iterator for Stream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.recv()
    }
}

/// Creates the stream channel and starts its forwarder.
///
/// # Panics
///
/// Panics if the forwarder thread cannot be spawned.
pub(crate) fn spawn_forwarder<T: Send + 'static>(
    shared: Arc<Shared<T>>,
    capacity: usize,
) -> Receiver<T> {
    let (tx, rx) = crossbeam_channel::bounded(capacity);

    if shared.is_closed() {
        debug!("stream requested on closed buffer");
        // Dropping `tx` closes the channel immediately.
        return rx;
    }

    thread::Builder::new()
        .name("delivery-stream".into())
        .spawn(move || {
            info!(capacity, "stream forwarder started");
            forward(&shared, &tx);
            info!("stream forwarder exiting");
        })
        .expect("failed to spawn stream forwarder thread");

    rx
}

fn forward<T>(shared: &Shared<T>, tx: &Sender<T>) {
    while let Some(mut item) = shared.pull_or_closed() {
        loop {
            match tx.send_timeout(item, CLOSE_RECHECK_INTERVAL) {
                Ok(()) => break,
                Err(SendTimeoutError::Timeout(back)) => {
                    if shared.is_closed() {
                        shared.push_front(back);
                        return;
                    }
                    trace!("stream channel full, retrying");
                    item = back;
                }
                Err(SendTimeoutError::Disconnected(back)) => {
                    shared.push_front(back);
                    return;
                }
            }
        }
    }
}
