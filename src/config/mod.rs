use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod alerts;
pub mod feed;
pub mod simulation;

pub use alerts::*;
pub use feed::*;
pub use simulation::*;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub simulation: SimulationParams,
    pub alerts: AlertParams,
    pub feed: FeedParams,
}

impl TrafficConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: TrafficConfig = toml::from_str(content)?;

        // Validate configurations
        config.simulation.validate()?;
        config.alerts.validate()?;
        config.feed.validate()?;

        Ok(config)
    }
}

pub trait Validate {
    fn validate(&self) -> Result<()>;
}
