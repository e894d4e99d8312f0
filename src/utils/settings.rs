use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{Result, WorldError};
use crate::world::noise::OctaveLimits;

/// Tunables for one world. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub seed: u64,
    /// Chunks within this Chebyshev distance of the observer are loaded.
    pub view_radius: i32,
    /// Loaded chunks beyond this distance are evicted. Must exceed
    /// `view_radius` so chunks on the border do not thrash.
    pub unload_radius: i32,
    /// Most chunks enqueued per observer update.
    pub load_budget: usize,
    /// 0 picks one worker per CPU.
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub noise: OctaveLimits,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            view_radius: VIEW_RADIUS,
            unload_radius: UNLOAD_RADIUS,
            load_budget: MAX_LOADS_PER_UPDATE,
            worker_count: 0,
            queue_capacity: TASK_QUEUE_CAPACITY,
            noise: OctaveLimits::default(),
        }
    }
}

impl WorldConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.as_ref().display(), seed = config.seed, "loaded world config");
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: WorldConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.view_radius < 0 {
            return Err(WorldError::InvalidConfig(format!(
                "view_radius must not be negative (got {})",
                self.view_radius
            )));
        }
        if self.unload_radius <= self.view_radius {
            return Err(WorldError::InvalidConfig(format!(
                "unload_radius ({}) must be greater than view_radius ({})",
                self.unload_radius, self.view_radius
            )));
        }
        if self.load_budget == 0 {
            return Err(WorldError::InvalidConfig(
                "load_budget must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(WorldError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
