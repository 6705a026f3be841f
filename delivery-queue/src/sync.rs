//! Synchronization primitives for handing items between threads.
//!
//! - [`Buffer`] - unbounded FIFO with non-blocking push/pop and blocking pull
//! - [`Stream`] - channel view over a buffer, fed by a forwarder thread

pub mod buffer;
pub mod stream;

pub use buffer::{Buffer, DEFAULT_STREAM_CAPACITY, Timeout};
pub use stream::Stream;
