//! `[engine]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [engine]
//! debounce_ms = 300          # Quiet period before a compile starts
//! remote_timeout_ms = 4000   # Remote answer deadline before compiling locally
//! max_auth_retries = 3       # Rejected joins before "reconnect required"
//! hot_reload = true          # false: compile only on explicit refresh
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Preview engine timing and behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Debounce window in milliseconds (1..=10000).
    pub debounce_ms: u64,

    /// Milliseconds a remote request may stay unanswered (>= 100).
    pub remote_timeout_ms: u64,

    /// Consecutive join rejections tolerated before giving up.
    pub max_auth_retries: u32,

    pub hot_reload: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            remote_timeout_ms: 4000,
            max_auth_retries: 3,
            hot_reload: true,
        }
    }
}

impl EngineSection {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=10_000).contains(&self.debounce_ms) {
            return Err(ConfigError::Validation(format!(
                "engine.debounce_ms must be within 1..=10000, got {}",
                self.debounce_ms
            )));
        }
        if self.remote_timeout_ms < 100 {
            return Err(ConfigError::Validation(format!(
                "engine.remote_timeout_ms must be at least 100, got {}",
                self.remote_timeout_ms
            )));
        }
        if self.max_auth_retries == 0 {
            return Err(ConfigError::Validation(
                "engine.max_auth_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_engine_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.engine.debounce_ms, 300);
        assert_eq!(config.engine.remote_timeout().as_millis(), 4000);
        assert_eq!(config.engine.max_auth_retries, 3);
        assert!(config.engine.hot_reload);
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn test_engine_partial_override() {
        let config = test_parse_config("[engine]\ndebounce_ms = 120\nhot_reload = false");
        assert_eq!(config.engine.debounce().as_millis(), 120);
        assert!(!config.engine.hot_reload);
        // untouched fields keep defaults
        assert_eq!(config.engine.remote_timeout_ms, 4000);
    }

    #[test]
    fn test_engine_validation_bounds() {
        let config = test_parse_config("[engine]\ndebounce_ms = 0");
        assert!(config.engine.validate().is_err());

        let config = test_parse_config("[engine]\ndebounce_ms = 10001");
        assert!(config.engine.validate().is_err());

        let config = test_parse_config("[engine]\ndebounce_ms = 10000\nremote_timeout_ms = 100");
        assert!(config.engine.validate().is_ok());

        let config = test_parse_config("[engine]\nremote_timeout_ms = 99");
        let err = config.engine.validate().unwrap_err();
        assert!(err.to_string().contains("remote_timeout_ms"));
    }
}
