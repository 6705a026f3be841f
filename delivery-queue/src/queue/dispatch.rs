//! Fire-and-forget hand-off of one item to the delivery callback.

use std::sync::Arc;
use std::thread;

use crate::trace::{error, trace};

/// Callback invoked once per delivered item.
pub type DeliverFn<T> = dyn Fn(T) + Send + Sync + 'static;

/// Runs `deliver(item)` on a fresh thread and returns without waiting.
///
/// A thread that cannot be spawned loses its item; the failure is logged.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
pub(crate) fn spawn_delivery<T: Send + 'static>(deliver: &Arc<DeliverFn<T>>, item: T, seq: u64) {
    let deliver = Arc::clone(deliver);
    let spawned = thread::Builder::new()
        .name("delivery-worker".into())
        .spawn(move || deliver(item));

    match spawned {
        Ok(_detached) => {
            trace!(seq, "delivery dispatched");
        }
        Err(e) => {
            error!(seq, error = %e, "failed to spawn delivery thread, item dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_delivery_runs_on_named_thread() {
        let (tx, rx) = mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let deliver: Arc<DeliverFn<u32>> = Arc::new(move |item| {
            let name = thread::current().name().map(str::to_owned);
            tx.lock().unwrap().send((item, name)).unwrap();
        });

        spawn_delivery(&deliver, 5, 0);

        let (item, name) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(item, 5);
        assert_eq!(name.as_deref(), Some("delivery-worker"));
    }
}
