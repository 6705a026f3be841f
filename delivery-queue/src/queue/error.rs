//! Errors reported when building a [`DeliveryQueue`](crate::DeliveryQueue).

use thiserror::Error;

/// Construction-time errors. Nothing else in the crate reports an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The rate limit must allow at least one delivery per second.
    #[error("maximum operations per second has to be greater than zero (got {max_ops_per_second})")]
    InvalidConfiguration {
        /// The rejected rate.
        max_ops_per_second: u32,
    },

    /// No delivery callback was supplied.
    #[error("delivery callback is missing")]
    MissingCallback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_format() {
        let err = QueueError::InvalidConfiguration {
            max_ops_per_second: 0,
        };
        assert_eq!(
            err.to_string(),
            "maximum operations per second has to be greater than zero (got 0)"
        );
        assert_eq!(
            QueueError::MissingCallback.to_string(),
            "delivery callback is missing"
        );
    }
}
