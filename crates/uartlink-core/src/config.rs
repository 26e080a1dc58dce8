//! Supervisor and channel configuration
//!
//! Durations are stored as milliseconds so the structs map directly onto the
//! CLI's TOML file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::UartError;
use crate::record::RecordKind;

// ----------------------------------------------------------------------------
// Supervisor Configuration
// ----------------------------------------------------------------------------

/// Reconnect policy and transcript selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Interval between reconnect attempts while the link is down
    pub retry_interval_ms: u64,
    /// Delay before the first attempt after an unexpected disconnect
    pub reconnect_delay_ms: u64,
    /// Growth factor applied per failed attempt (1.0 keeps the interval fixed)
    pub backoff_multiplier: f64,
    /// Upper bound for the grown interval
    pub max_retry_interval_ms: u64,
    /// Connect to the remembered peer at startup
    pub autoconnect: bool,
    /// Record kinds appended to the durable transcript
    pub persisted_kinds: Vec<RecordKind>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 10_000,
            reconnect_delay_ms: 100,
            backoff_multiplier: 1.0,
            max_retry_interval_ms: 60_000,
            autoconnect: true,
            persisted_kinds: RecordKind::ALL.to_vec(),
        }
    }
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed retry interval
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the delay before reconnecting after an unexpected drop
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enable capped exponential backoff
    pub fn with_backoff(mut self, multiplier: f64, max_interval: Duration) -> Self {
        self.backoff_multiplier = multiplier;
        self.max_retry_interval_ms = max_interval.as_millis() as u64;
        self
    }

    pub fn with_autoconnect(mut self, enabled: bool) -> Self {
        self.autoconnect = enabled;
        self
    }

    pub fn with_persisted_kinds(mut self, kinds: impl IntoIterator<Item = RecordKind>) -> Self {
        self.persisted_kinds = kinds.into_iter().collect();
        self
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Delay before retry number `attempt` (0-based) of the current outage
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.retry_interval_ms as f64;
        if self.backoff_multiplier <= 1.0 {
            return self.retry_interval();
        }
        let grown = base * self.backoff_multiplier.powi(attempt.min(32) as i32);
        let capped = grown.min(self.max_retry_interval_ms.max(self.retry_interval_ms) as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn persists(&self, kind: RecordKind) -> bool {
        self.persisted_kinds.contains(&kind)
    }

    pub fn validate(&self) -> Result<(), UartError> {
        if self.retry_interval_ms == 0 {
            return Err(UartError::Config {
                reason: "Retry interval cannot be zero".into(),
            });
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(UartError::Config {
                reason: "Backoff multiplier must be at least 1.0".into(),
            });
        }
        if self.max_retry_interval_ms < self.retry_interval_ms && self.backoff_multiplier > 1.0 {
            return Err(UartError::Config {
                reason: "Max retry interval cannot be smaller than the retry interval".into(),
            });
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes of the dispatcher's input and output channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (UI -> Dispatcher)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Transport -> Dispatcher)
    pub event_buffer_size: usize,
    /// Buffer size for internal inputs (timers, queries)
    pub internal_buffer_size: usize,
    /// Capacity of the notification broadcast (Dispatcher -> UI)
    pub notification_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,       // UI commands are infrequent
            event_buffer_size: 128,        // Notifications can be bursty
            internal_buffer_size: 32,
            notification_buffer_size: 256, // Slow UIs lag instead of blocking
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<(), UartError> {
        let sizes = [
            ("Command", self.command_buffer_size),
            ("Event", self.event_buffer_size),
            ("Internal", self.internal_buffer_size),
            ("Notification", self.notification_buffer_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(UartError::Config {
                    reason: format!("{} buffer size cannot be zero", name),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_interval_policy() {
        let config = SupervisorConfig::default();
        assert_eq!(config.retry_interval(), Duration::from_secs(10));
        assert_eq!(config.reconnect_delay(), Duration::from_millis(100));
        for attempt in 0..5 {
            assert_eq!(config.retry_delay(attempt), Duration::from_secs(10));
        }
        assert!(config.validate().is_ok());
        assert!(ChannelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = SupervisorConfig::new()
            .with_retry_interval(Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(5));

        assert_eq!(config.retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.retry_delay(1), Duration::from_secs(2));
        assert_eq!(config.retry_delay(2), Duration::from_secs(4));
        assert_eq!(config.retry_delay(3), Duration::from_secs(5));
        assert_eq!(config.retry_delay(400), Duration::from_secs(5));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero = SupervisorConfig::new().with_retry_interval(Duration::ZERO);
        assert!(zero.validate().is_err());

        let shrinking = SupervisorConfig::new().with_backoff(0.5, Duration::from_secs(60));
        assert!(shrinking.validate().is_err());

        let channels = ChannelConfig {
            event_buffer_size: 0,
            ..ChannelConfig::default()
        };
        assert!(channels.validate().is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: SupervisorConfig =
            serde_json::from_str(r#"{ "retry_interval_ms": 2500 }"#).unwrap();
        assert_eq!(config.retry_interval(), Duration::from_millis(2500));
        assert_eq!(config.reconnect_delay_ms, 100);
        assert!(config.persists(RecordKind::Received));
    }
}
