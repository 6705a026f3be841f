//! Delivery queue demo.
//!
//! Adds `1..=count` to a rate-limited queue, waits until every item has been
//! delivered and reports how long it took.
//!
//! # Usage
//!
//! ```sh
//! delivery-demo --rate 31 --count 120
//! ```
//!
//! Build with `--features tracing` and set `RUST_LOG` to watch the loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use minstant::Instant;

use delivery_queue::{DeliveryConfig, DeliveryQueue, QueueError};

/// Default number of items to deliver.
const DEFAULT_COUNT: u64 = 120;

/// How often the main thread checks the completion counter.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors surfaced by the demo.
#[derive(Debug, thiserror::Error)]
enum DemoError {
    /// A flag was given without its value.
    #[error("missing value for {0}")]
    MissingValue(String),
    /// A flag value is not a number.
    #[error("invalid number for {flag}: {value}")]
    InvalidNumber { flag: String, value: String },
    /// Unrecognised argument.
    #[error("unknown argument: {0}")]
    UnknownArgument(String),
    /// The queue rejected the configuration.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

struct DemoArgs {
    config: DeliveryConfig,
    count: u64,
}

fn main() {
    delivery_queue::init_tracing();

    if let Err(e) = run() {
        eprintln!("delivery-demo: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DemoError> {
    let args: Vec<String> = std::env::args().collect();
    let DemoArgs { config, count } = parse_args(&args)?;

    let delivered = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&delivered);
    let queue = Arc::new(DeliveryQueue::new(config.clone(), move |item: u64| {
        eprintln!("delivery-demo: {item}");
        counter.fetch_add(1, Ordering::Release);
    })?);

    let poller = queue.spawn_polling();

    for i in 1..=count {
        queue.add(i);
    }
    eprintln!(
        "delivery-demo: all {count} items submitted at {} per second",
        config.max_ops_per_second
    );

    let start = Instant::now();
    while delivered.load(Ordering::Acquire) < count {
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
    let elapsed = start.elapsed();

    eprintln!(
        "delivery-demo: delivered {count} items in {:.3} seconds",
        elapsed.as_secs_f64()
    );

    // The loop stays parked in pull() and ends with the process.
    queue.stop_polling();
    drop(poller);

    Ok(())
}

/// Parses command line arguments into the demo settings.
fn parse_args(args: &[String]) -> Result<DemoArgs, DemoError> {
    let mut config = DeliveryConfig::default();
    let mut count = DEFAULT_COUNT;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--rate" | "-r" => {
                let value = iter
                    .next()
                    .ok_or_else(|| DemoError::MissingValue(arg.clone()))?;
                config.max_ops_per_second = parse_number(arg, value)?;
            }
            "--count" | "-n" => {
                let value = iter
                    .next()
                    .ok_or_else(|| DemoError::MissingValue(arg.clone()))?;
                count = parse_number(arg, value)?;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(DemoError::UnknownArgument(other.to_string())),
        }
    }

    config.validate()?;
    Ok(DemoArgs { config, count })
}

fn parse_number<N: std::str::FromStr>(flag: &str, value: &str) -> Result<N, DemoError> {
    value.parse().map_err(|_| DemoError::InvalidNumber {
        flag: flag.to_string(),
        value: value.to_string(),
    })
}

fn print_usage() {
    eprintln!(
        "Usage: delivery-demo [OPTIONS]

Options:
  -r, --rate <N>    Maximum deliveries per second (default: {})
  -n, --count <M>   Number of items to deliver (default: {DEFAULT_COUNT})
  -h, --help        Print this help",
        delivery_queue::queue::DEFAULT_MAX_OPS_PER_SECOND
    );
}
