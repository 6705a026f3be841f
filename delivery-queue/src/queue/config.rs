//! Delivery queue configuration.

use std::time::Duration;

use crate::queue::error::QueueError;
use crate::sync::DEFAULT_STREAM_CAPACITY;

/// Default delivery rate when none is configured.
pub const DEFAULT_MAX_OPS_PER_SECOND: u32 = 31;

/// Configuration for a [`DeliveryQueue`](crate::DeliveryQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Upper bound on delivery dispatches per second. Must be at least 1.
    pub max_ops_per_second: u32,
    /// Capacity of the channel used by the buffer's stream view.
    pub stream_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_ops_per_second: DEFAULT_MAX_OPS_PER_SECOND,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
        }
    }
}

impl DeliveryConfig {
    /// Creates a configuration for the given rate with default capacities.
    #[must_use]
    pub fn with_rate(max_ops_per_second: u32) -> Self {
        Self {
            max_ops_per_second,
            ..Self::default()
        }
    }

    /// Checks that the configuration describes a usable queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidConfiguration`] if the rate is zero.
    pub const fn validate(&self) -> Result<(), QueueError> {
        if self.max_ops_per_second < 1 {
            return Err(QueueError::InvalidConfiguration {
                max_ops_per_second: self.max_ops_per_second,
            });
        }
        Ok(())
    }

    /// Minimum time between two delivery dispatches: one second divided by the rate.
    ///
    /// Only meaningful for a validated configuration; a zero rate yields
    /// `Duration::ZERO` instead of panicking.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1)
            .checked_div(self.max_ops_per_second)
            .unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeliveryConfig::default();
        assert_eq!(config.max_ops_per_second, 31);
        assert_eq!(config.stream_capacity, DEFAULT_STREAM_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_interval_from_rate() {
        assert_eq!(DeliveryConfig::with_rate(1).interval(), Duration::from_secs(1));
        assert_eq!(
            DeliveryConfig::with_rate(4).interval(),
            Duration::from_millis(250)
        );
        assert_eq!(
            DeliveryConfig::with_rate(31).interval(),
            Duration::from_nanos(32_258_064)
        );
    }

    #[test]
    fn test_zero_rate_rejected() {
        let config = DeliveryConfig::with_rate(0);
        assert_eq!(
            config.validate(),
            Err(QueueError::InvalidConfiguration {
                max_ops_per_second: 0
            })
        );
        assert_eq!(config.interval(), Duration::ZERO);
    }
}
