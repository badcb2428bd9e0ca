use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use super::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    #[default]
    None,
    Dummy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedParams {
    pub kind: FeedKind,
    /// Seconds between upsert batches.
    pub interval: f32,
    /// Per-axis velocity perturbation applied by the dummy feed.
    pub jitter: f32,
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            kind: FeedKind::None,
            interval: 0.5,
            jitter: 1.0,
        }
    }
}

impl Validate for FeedParams {
    fn validate(&self) -> Result<()> {
        if !(self.interval > 0.0) {
            return Err(anyhow!("Feed interval must be positive"));
        }

        if !(self.jitter >= 0.0) {
            return Err(anyhow!("Feed jitter must be non-negative"));
        }

        Ok(())
    }
}
