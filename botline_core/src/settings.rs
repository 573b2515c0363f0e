use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ChannelAccount, RetryPolicy};

/// Who the local side of the conversation is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Empty is valid; it is what the service sees when no id is configured.
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "Identity::default_user_name")]
    pub user_name: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            user_name: Self::default_user_name(),
        }
    }
}

impl Identity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }

    fn default_user_name() -> String {
        "user".to_string()
    }

    #[must_use]
    pub fn account(&self) -> ChannelAccount {
        ChannelAccount::new(self.user_id.clone(), self.user_name.clone())
    }
}

/// Timing and retry knobs of a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "SessionConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "SessionConfig::default_create_attempts")]
    pub create_attempts: u32,
    #[serde(default)]
    pub create_retry_delay_ms: u64,
    #[serde(default = "SessionConfig::default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
    #[serde(default = "SessionConfig::default_single_attempt")]
    pub send_attempts: u32,
    #[serde(default = "SessionConfig::default_single_attempt")]
    pub poll_attempts: u32,
    /// Restart the poll timer after each send, resetting its idle clock.
    #[serde(default)]
    pub restart_polling_on_send: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::default_poll_interval_ms(),
            create_attempts: Self::default_create_attempts(),
            create_retry_delay_ms: 0,
            max_retry_delay_ms: Self::default_max_retry_delay_ms(),
            send_attempts: Self::default_single_attempt(),
            poll_attempts: Self::default_single_attempt(),
            restart_polling_on_send: false,
        }
    }
}

impl SessionConfig {
    const fn default_poll_interval_ms() -> u64 {
        1000
    }

    const fn default_create_attempts() -> u32 {
        3
    }

    const fn default_max_retry_delay_ms() -> u64 {
        2000
    }

    const fn default_single_attempt() -> u32 {
        1
    }

    /// Poll period, never shorter than one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    #[must_use]
    pub const fn create_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.create_attempts,
            initial_delay: Duration::from_millis(self.create_retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms),
        }
    }

    #[must_use]
    pub const fn send_policy(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.send_attempts)
    }

    #[must_use]
    pub const fn poll_policy(&self) -> RetryPolicy {
        RetryPolicy::immediate(self.poll_attempts)
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let ms = interval.as_millis() as u64;
        self.poll_interval_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.create_policy().attempts, 3);
        assert_eq!(config.create_policy().initial_delay, Duration::ZERO);
        assert_eq!(config.send_policy(), RetryPolicy::once());
        assert_eq!(config.poll_policy(), RetryPolicy::once());
        assert!(!config.restart_polling_on_send);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"poll_interval_ms": 250, "send_attempts": 3}"#)
                .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.send_attempts, 3);
        assert_eq!(config.create_attempts, 3);
    }

    #[test]
    fn identity_defaults_to_empty_id_and_user_name() {
        let identity = Identity::default();
        assert_eq!(identity.user_id, "");
        assert_eq!(identity.user_name, "user");
        assert_eq!(identity.account(), ChannelAccount::new("", "user"));
    }
}
