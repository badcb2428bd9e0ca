use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use super::Validate;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Seconds of simulated time between statistics rollups.
    pub stat_update_interval: f64,
    /// Vehicles per lane at which a segment counts as saturated.
    pub lane_capacity: f32,
    /// Speed limit (m/s) for segments without an explicit one.
    pub default_speed_limit: f32,
    /// Fixed tick length used by the console runner.
    pub dt: f64,
    pub seed: Option<u64>,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            stat_update_interval: 1.0,
            lane_capacity: 5.0,
            default_speed_limit: 13.9, // ~50 km/h
            dt: 1.0 / 60.0,
            seed: None,
        }
    }
}

impl Validate for SimulationParams {
    fn validate(&self) -> Result<()> {
        if !(self.stat_update_interval > 0.0) {
            return Err(anyhow!("Statistics update interval must be positive"));
        }

        if !(self.lane_capacity > 0.0) {
            return Err(anyhow!("Lane capacity must be positive"));
        }

        if !(self.default_speed_limit > 0.0) {
            return Err(anyhow!("Default speed limit must be positive"));
        }

        if !(self.dt > 0.0) || self.dt > self.stat_update_interval {
            return Err(anyhow!("Tick length must be positive and no longer than the statistics interval, got {}", self.dt));
        }

        Ok(())
    }
}
