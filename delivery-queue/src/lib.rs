//! Unbounded FIFO queue with a rate-limited delivery loop.
//!
//! - [`sync::Buffer`] - unbounded thread-safe FIFO with push, pop, blocking
//!   pull and a closable channel view
//! - [`DeliveryQueue`] - wraps a buffer and dispatches each item to a callback
//!   on its own thread, no more than `max_ops_per_second` times per second

pub mod queue;
pub mod sync;
mod trace;

pub use queue::{DeliveryConfig, DeliveryQueue, DeliveryQueueBuilder, QueueError};
pub use trace::init_tracing;
