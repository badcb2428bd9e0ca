use nalgebra::{Point2, Vector2};

pub mod graph;
pub mod source;

pub use graph::*;
pub use source::*;

pub type Vec2 = Vector2<f32>;
pub type Point = Point2<f32>;

pub type NodeId = u32;
pub type SegmentId = u32;

pub(crate) const LOG_TARGET: &str = "traffic_monitor::network";

/// Intersection or segment endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    pub outgoing: Vec<SegmentId>, // in insertion order
}

impl Node {
    pub fn new(id: NodeId, x: f32, y: f32) -> Self {
        Self {
            id,
            position: Point::new(x, y),
            outgoing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub lane_count: u32,
    pub one_way: bool,
    pub length: f32,
    pub direction: Vec2, // unit vector from `from_node` to `to_node`

    // Traffic metrics, rewritten by the simulation every tick
    pub free_flow_speed: f32,
    pub current_speed: f32,
    pub vehicle_count: u32,
    pub congestion_level: f32, // 0.0 (free flow) to 1.0 (standstill)
}

impl RoadSegment {
    pub const DEFAULT_FREE_FLOW_SPEED: f32 = 10.0;

    pub fn new(id: SegmentId, from_node: NodeId, to_node: NodeId) -> Self {
        Self {
            id,
            from_node,
            to_node,
            lane_count: 1,
            one_way: false,
            length: 0.0,
            direction: Vec2::zeros(),
            free_flow_speed: Self::DEFAULT_FREE_FLOW_SPEED,
            current_speed: Self::DEFAULT_FREE_FLOW_SPEED,
            vehicle_count: 0,
            congestion_level: 0.0,
        }
    }

    /// Caches length and direction from the endpoint positions.
    pub fn set_geometry(&mut self, from: &Point, to: &Point) {
        let delta = to - from;
        self.length = delta.magnitude();
        self.direction = if self.length > 0.0 {
            delta / self.length
        } else {
            Vec2::zeros()
        };
    }

    /// The node reached when leaving `node` along this segment, if that
    /// direction of travel is allowed.
    pub fn traverse_from(&self, node: NodeId) -> Option<NodeId> {
        if node == self.from_node {
            Some(self.to_node)
        } else if node == self.to_node && !self.one_way {
            Some(self.from_node)
        } else {
            None
        }
    }
}

/// Render-ready record of a loaded segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadVisual {
    pub id: SegmentId,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub length: f32,
}

/// One data row of a road source: `segmentId, x1, y1, x2, y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoadRow {
    pub segment_id: SegmentId,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl RoadRow {
    pub fn new(segment_id: SegmentId, x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { segment_id, x1, y1, x2, y2 }
    }

    /// Euclidean length. Deltas are taken in `f64`, so any pair of `i32`
    /// coordinates is valid.
    pub fn length(&self) -> f32 {
        let dx = f64::from(self.x2) - f64::from(self.x1);
        let dy = f64::from(self.y2) - f64::from(self.y1);
        dx.hypot(dy) as f32
    }
}
