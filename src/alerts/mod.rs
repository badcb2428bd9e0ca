use crate::network::SegmentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

pub mod manager;

pub use manager::*;

pub(crate) const LOG_TARGET: &str = "traffic_monitor::alerts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AlertType {
    Congestion,
    SpeedViolation,
    UnusualSlowdown,
    Incident,
}

impl AlertType {
    pub const ALL: [AlertType; 4] = [
        AlertType::Congestion,
        AlertType::SpeedViolation,
        AlertType::UnusualSlowdown,
        AlertType::Incident,
    ];
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertType::Congestion => "congestion",
            AlertType::SpeedViolation => "speed violation",
            AlertType::UnusualSlowdown => "unusual slowdown",
            AlertType::Incident => "incident",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub alert_type: AlertType,
    pub segment_id: SegmentId,
    pub message: String,
    pub timestamp: SystemTime,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(alert_type: AlertType, segment_id: SegmentId, message: impl Into<String>) -> Self {
        Self {
            alert_type,
            segment_id,
            message: message.into(),
            timestamp: SystemTime::now(),
            acknowledged: false,
        }
    }

    /// Whether this alert reports the same condition as `(alert_type, segment_id)`.
    pub fn matches(&self, alert_type: AlertType, segment_id: SegmentId) -> bool {
        self.alert_type == alert_type && self.segment_id == segment_id
    }
}
