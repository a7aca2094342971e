//! Reconnect backoff policies.

use std::time::Duration;

use crate::error::SyncError;

/// Default fixed reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// Default cap for exponential backoff in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;

/// Default multiplier for exponential backoff.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Delay policy applied before each reconnect attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// Same delay before every attempt.
    Fixed(Duration),

    /// Delay grows by `multiplier` per consecutive failed attempt, capped at
    /// `max`.
    Exponential {
        /// Delay before the first attempt.
        initial: Duration,
        /// Upper bound for any delay.
        max: Duration,
        /// Growth factor per attempt.
        multiplier: f64,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS))
    }
}

impl BackoffPolicy {
    /// Creates an exponential policy with the default multiplier.
    #[must_use]
    pub const fn exponential(initial: Duration, max: Duration) -> Self {
        Self::Exponential {
            initial,
            max,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    /// Returns the delay before the given attempt (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let millis = initial.as_millis() as f64 * multiplier.powi(exponent);
                let capped = millis.min(max.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy can never produce a usable delay.
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            Self::Fixed(_) => Ok(()),
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                if *multiplier < 1.0 {
                    return Err(SyncError::Configuration(
                        "backoff multiplier must be >= 1.0".to_string(),
                    ));
                }
                if initial > max {
                    return Err(SyncError::Configuration(
                        "initial backoff must be <= max backoff".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fixed_three_seconds() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay(1), Duration::from_secs(3));
        assert_eq!(policy.delay(50), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_growth_and_cap() {
        let policy =
            BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_millis(1_000));

        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        assert_eq!(policy.delay(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay(u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn test_exponential_attempt_zero_uses_initial() {
        let policy = BackoffPolicy::exponential(Duration::from_millis(250), Duration::from_secs(5));
        assert_eq!(policy.delay(0), Duration::from_millis(250));
    }

    #[test]
    fn test_validate() {
        assert!(BackoffPolicy::default().validate().is_ok());

        let bad_multiplier = BackoffPolicy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            multiplier: 0.5,
        };
        assert!(bad_multiplier.validate().is_err());

        let inverted = BackoffPolicy::exponential(Duration::from_secs(10), Duration::from_secs(1));
        assert!(inverted.validate().is_err());
    }
}
