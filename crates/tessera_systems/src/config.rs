//! # Scheduler Configuration
//!
//! ```toml
//! monitor_perf = true
//! perf_history = 64
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SystemError, SystemResult};

/// Settings of a [`SystemRoot`](crate::SystemRoot).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SystemsConfig {
    /// Record update durations of every system.
    pub monitor_perf: bool,
    /// Number of durations kept per system.
    pub perf_history: usize,
}

impl Default for SystemsConfig {
    fn default() -> Self {
        Self {
            monitor_perf: false,
            perf_history: 32,
        }
    }
}

impl SystemsConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on parse errors, unknown fields or invalid values.
    pub fn from_toml_str(source: &str) -> SystemResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| SystemError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `perf_history` is zero.
    pub fn validate(&self) -> SystemResult<()> {
        if self.perf_history == 0 {
            return Err(SystemError::InvalidConfig("perf_history must be at least 1".to_owned()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SystemsConfig::from_toml_str("").unwrap();
        assert_eq!(config, SystemsConfig::default());
        assert_eq!(config.perf_history, 32);
    }

    #[test]
    fn test_parse_and_validate() {
        let config = SystemsConfig::from_toml_str("monitor_perf = true\nperf_history = 8").unwrap();
        assert!(config.monitor_perf);
        assert_eq!(config.perf_history, 8);

        assert!(matches!(
            SystemsConfig::from_toml_str("perf_history = 0"),
            Err(SystemError::InvalidConfig(_))
        ));
        assert!(matches!(
            SystemsConfig::from_toml_str("unknown = 1"),
            Err(SystemError::InvalidConfig(_))
        ));
    }
}
