//! Coordinator configuration.

use std::time::Duration;

use tracing::warn;

/// Configuration for the room coordinator.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Size of the command channel between [`RoomClient`](crate::RoomClient)
    /// handles and the coordinator task. When full, callers wait
    /// (bounded channel — backpressure, not loss).
    pub command_buffer: usize,

    /// How long to wait for the server to acknowledge a request
    /// (including the join snapshot) before failing it.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command_buffer: 32,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Minimum accepted request timeout.
    pub const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

    /// Clamp and fix any out-of-range values so the config is safe to
    /// use. Called automatically when the coordinator is spawned.
    pub fn validated(mut self) -> Self {
        if self.command_buffer == 0 {
            warn!("command_buffer of 0 is not usable — raising to 1");
            self.command_buffer = 1;
        }
        if self.request_timeout < Self::MIN_REQUEST_TIMEOUT {
            warn!(
                timeout_ms = self.request_timeout.as_millis() as u64,
                "request_timeout below minimum — clamping"
            );
            self.request_timeout = Self::MIN_REQUEST_TIMEOUT;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.command_buffer, 32);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_validated_clamps_degenerate_values() {
        let config = ClientConfig {
            command_buffer: 0,
            request_timeout: Duration::ZERO,
        }
        .validated();
        assert_eq!(config.command_buffer, 1);
        assert_eq!(config.request_timeout, ClientConfig::MIN_REQUEST_TIMEOUT);
    }
}
