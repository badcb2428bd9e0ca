use crate::network::{SegmentId, Vec2};
use std::collections::BTreeMap;

pub mod congestion;
pub mod engine;
pub mod statistics;
pub mod vehicles;

pub use congestion::*;
pub use engine::*;
pub use statistics::*;
pub use vehicles::*;

pub type VehicleId = u64;

/// Live vehicle set keyed by id. Ordered so that seeded runs replay exactly.
pub type VehicleMap = BTreeMap<VehicleId, Vehicle>;

pub(crate) const LOG_TARGET: &str = "traffic_monitor::simulation";

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: VehicleId,
    pub segment_id: SegmentId,
    pub position: f32, // 0..1 along the segment
    pub velocity: Vec2, // world units / s
    pub length: f32,
    pub width: f32,
    pub kind: String, // car, bus, truck, ...
}

impl Vehicle {
    pub fn new(id: VehicleId, segment_id: SegmentId, position: f32, velocity: Vec2) -> Self {
        Self {
            id,
            segment_id,
            position,
            velocity,
            length: 4.0,
            width: 2.0,
            kind: "car".to_string(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Magnitude of the velocity vector.
    pub fn speed(&self) -> f32 {
        self.velocity.magnitude()
    }
}
