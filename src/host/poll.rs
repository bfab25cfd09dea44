//! Poll loop configuration
//!
//! Status polling runs at a fixed interval with no backoff. By default there
//! is no bound at all: a job the server never finishes blocks the caller
//! forever. An overall timeout and a maximum poll count can be configured.

use std::time::{Duration, Instant};

/// Default pause between two status checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound accepted for the poll interval (seconds)
const MAX_INTERVAL_SECONDS: u64 = 3600;

/// Poll loop configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Pause between status checks (default: 5 seconds)
    pub interval: Duration,

    /// Give up once this much time has passed (default: never)
    pub timeout: Option<Duration>,

    /// Give up after this many status checks (default: never)
    pub max_polls: Option<u64>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            max_polls: None,
        }
    }
}

impl PollConfig {
    /// Create PollConfig from configured values, keeping defaults for unset ones
    pub fn from_config(
        interval_seconds: Option<u64>,
        timeout_seconds: Option<u64>,
        max_polls: Option<u64>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            interval: interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            timeout: timeout_seconds.map(Duration::from_secs),
            max_polls,
        }
    }

    /// Zero-interval config for driving an in-process mock service
    ///
    /// Never point this at a live service: with no bound set it polls in a
    /// tight loop. Configured settings reject a zero interval.
    pub fn immediate() -> Self {
        Self {
            interval: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_polls(mut self, max_polls: u64) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Validate the bounds
    pub fn validate(&self) -> Result<(), PollValidationError> {
        if self.interval.as_secs() > MAX_INTERVAL_SECONDS {
            return Err(PollValidationError::IntervalOutOfBounds {
                value: self.interval.as_secs(),
            });
        }

        if self.timeout == Some(Duration::ZERO) {
            return Err(PollValidationError::ZeroTimeout);
        }

        if self.max_polls == Some(0) {
            return Err(PollValidationError::ZeroMaxPolls);
        }

        Ok(())
    }

    /// True when neither a timeout nor a poll limit is set
    pub fn is_unbounded(&self) -> bool {
        self.timeout.is_none() && self.max_polls.is_none()
    }
}

/// Poll configuration errors
#[derive(Debug, thiserror::Error)]
pub enum PollValidationError {
    #[error("poll interval must be at most 3600s, got {value}s")]
    IntervalOutOfBounds { value: u64 },

    #[error("poll timeout must be greater than zero")]
    ZeroTimeout,

    #[error("max_polls must be greater than zero")]
    ZeroMaxPolls,
}

/// Tracks how much of a poll budget one wait has used
///
/// The budget only reports exhaustion; the caller decides what to do.
#[derive(Debug)]
pub struct PollBudget {
    config: PollConfig,
    start_time: Instant,
    polls: u64,
}

impl PollBudget {
    pub fn start(config: PollConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            polls: 0,
        }
    }

    /// Count one status check
    pub fn record_poll(&mut self) {
        self.polls += 1;
    }

    pub fn polls(&self) -> u64 {
        self.polls
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Whether another status check is allowed
    pub fn exhausted(&self) -> bool {
        if let Some(max) = self.config.max_polls {
            if self.polls >= max {
                return true;
            }
        }
        if let Some(timeout) = self.config.timeout {
            if self.elapsed() >= timeout {
                return true;
            }
        }
        false
    }

    /// Pause before the next check: the interval, cut short by a timeout
    pub fn next_sleep(&self) -> Duration {
        match self.config.timeout {
            Some(timeout) => self
                .config
                .interval
                .min(timeout.saturating_sub(self.elapsed())),
            None => self.config.interval,
        }
    }
}
