//! Tunable parameters for both endpoints.
//!
//! Defaults are the values the `udp-arq` binary ships with; it exposes every
//! field as a flag.

use std::time::Duration;

use thiserror::Error;

/// UDP port both endpoints use unless told otherwise.
pub const DEFAULT_PORT: u16 = 27016;

/// Invalid parameter values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("total packet count must be at least 1")]
    ZeroPackets,
    #[error("total packet count must be below {}", u32::MAX)]
    TooManyPackets,
    #[error("window size must be at least 1")]
    ZeroWindow,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("drop probability {0} is outside [0, 1]")]
    Probability(f64),
}

/// Sender-side parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Number of DATA packets in the transfer; sequences run `1..=total_packets`.
    pub total_packets: u32,
    /// Maximum number of sequences eligible to be in flight.
    pub window_size: u32,
    /// Age after which an unacknowledged packet is retransmitted.
    pub timeout: Duration,
    /// Upper bound on a single receive wait.
    pub poll_interval: Duration,
    /// Log a milestone whenever `base` passes a multiple of this (0 = never).
    pub progress_interval: u32,
    /// Retransmissions allowed per sequence before it is reported failed.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            total_packets: 200,
            window_size: 16,
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(50),
            progress_interval: 25,
            max_retries: None,
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_packets == 0 {
            return Err(ConfigError::ZeroPackets);
        }
        if self.total_packets == u32::MAX {
            return Err(ConfigError::TooManyPackets);
        }
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("timeout"));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("poll interval"));
        }
        Ok(())
    }
}

/// Receiver-side parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverConfig {
    /// Probability that an acknowledgment is deliberately suppressed.
    pub drop_probability: f64,
    /// Seed for the drop decision; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            drop_probability: 0.30,
            seed: None,
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.drop_probability) {
            return Err(ConfigError::Probability(self.drop_probability));
        }
        Ok(())
    }
}
