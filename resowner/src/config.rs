use crate::error::{Result, TrackerError};
use crate::registry::DEFAULT_INITIAL_CAPACITY;
use serde::{Deserialize, Serialize};

/// Tunables for a [`ResourceTracker`](crate::ResourceTracker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackerConfig {
    /// Number of slots allocated the first time a registry needs room.
    /// Later growth doubles the capacity.
    pub initial_capacity: usize,
    /// Log a warning for every reference still held when an owner is
    /// released at commit. The reference is released either way.
    pub warn_on_commit_leaks: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { initial_capacity: DEFAULT_INITIAL_CAPACITY, warn_on_commit_leaks: true }
    }
}

impl TrackerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrackerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(TrackerError::Config("initial_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
