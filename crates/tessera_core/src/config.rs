//! # Store Configuration
//!
//! Loaded once at startup, typically from a TOML file:
//!
//! ```toml
//! pid_type = "random_pids"
//! recycle_ids = true
//! max_entity_id = 1000000
//! pid_seed = 42
//! initial_capacity = 4096
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// How persistent ids (pids) relate to entity ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PidType {
    /// The pid of an entity is its id.
    #[default]
    UsePidAsId,
    /// Each entity gets a random positive 64-bit pid, mapped back to its id.
    RandomPids,
}

/// Configuration of an [`EntityStore`](crate::EntityStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Pid assignment strategy.
    pub pid_type: PidType,
    /// Reuse ids of deleted entities before allocating new ones.
    pub recycle_ids: bool,
    /// Highest id the store may allocate. Reaching it exhausts the store.
    pub max_entity_id: u32,
    /// Seed of the deterministic pid generator.
    pub pid_seed: u64,
    /// Entity slots reserved up front.
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pid_type: PidType::UsePidAsId,
            recycle_ids: true,
            max_entity_id: u32::MAX,
            pid_seed: 0x7E55_E7A,
            initial_capacity: 0,
        }
    }
}

impl StoreConfig {
    /// Parses and validates a TOML document. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on syntax errors, unknown fields or invalid values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `max_entity_id` is zero or `initial_capacity`
    /// exceeds it.
    pub fn validate(&self) -> EcsResult<()> {
        if self.max_entity_id == 0 {
            return Err(EcsError::InvalidConfig("max_entity_id must be at least 1".to_owned()));
        }
        if self.initial_capacity > self.max_entity_id as usize {
            return Err(EcsError::InvalidConfig(format!(
                "initial_capacity {} exceeds max_entity_id {}",
                self.initial_capacity, self.max_entity_id
            )));
        }
        Ok(())
    }

    /// Sets the pid strategy.
    #[must_use]
    pub const fn with_pid_type(mut self, pid_type: PidType) -> Self {
        self.pid_type = pid_type;
        self
    }

    /// Sets the highest allocatable id.
    #[must_use]
    pub const fn with_max_entity_id(mut self, max_entity_id: u32) -> Self {
        self.max_entity_id = max_entity_id;
        self
    }

    /// Enables or disables id recycling.
    #[must_use]
    pub const fn with_recycle_ids(mut self, recycle_ids: bool) -> Self {
        self.recycle_ids = recycle_ids;
        self
    }
}
