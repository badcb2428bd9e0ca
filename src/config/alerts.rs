use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};
use crate::alerts::AlertType;
use super::Validate;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertParams {
    pub enabled: bool,
    pub max_history: usize,
    pub thresholds: AlertThresholds,
}

impl Default for AlertParams {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history: 100,
            thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Congestion level at or above which a segment is reported.
    pub congestion: f32,
    /// Multiple of the speed limit that counts as a violation.
    pub speed_violation: f32,
    /// Ratio of current to baseline speed below which a slowdown is reported.
    pub unusual_slowdown: f32,
    /// Fractional drop from baseline speed that counts as an incident.
    pub incident: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            congestion: 0.7,
            speed_violation: 1.5,
            unusual_slowdown: 0.5,
            incident: 0.8,
        }
    }
}

impl AlertThresholds {
    pub fn get(&self, alert_type: AlertType) -> f32 {
        match alert_type {
            AlertType::Congestion => self.congestion,
            AlertType::SpeedViolation => self.speed_violation,
            AlertType::UnusualSlowdown => self.unusual_slowdown,
            AlertType::Incident => self.incident,
        }
    }

    pub fn set(&mut self, alert_type: AlertType, threshold: f32) {
        let slot = match alert_type {
            AlertType::Congestion => &mut self.congestion,
            AlertType::SpeedViolation => &mut self.speed_violation,
            AlertType::UnusualSlowdown => &mut self.unusual_slowdown,
            AlertType::Incident => &mut self.incident,
        };
        *slot = threshold;
    }
}

impl Validate for AlertParams {
    fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            return Err(anyhow!("Alert history must hold at least one alert"));
        }

        let thresholds = &self.thresholds;
        for (name, value) in [
            ("congestion", thresholds.congestion),
            ("unusual_slowdown", thresholds.unusual_slowdown),
            ("incident", thresholds.incident),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("Threshold '{}' must be in range [0, 1], got {}", name, value));
            }
        }

        if !(thresholds.speed_violation > 0.0) {
            return Err(anyhow!("Speed violation threshold must be positive"));
        }

        Ok(())
    }
}
