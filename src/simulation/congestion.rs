use crate::network::RoadSegment;

/// Fraction of speed lost at full congestion; vehicles never drop below 20%
/// of their own speed.
pub const CONGESTION_SLOWDOWN: f32 = 0.8;

/// Level at which the over-capacity tail starts.
const SATURATION_KNEE: f32 = 0.8;

/// Lane-capacity congestion model: linear up to `lane_count * per_lane`
/// vehicles, then a steep tail from 0.8 to 1.0 over one extra capacity.
pub fn congestion_level(vehicle_count: u32, lane_count: u32, per_lane: f32) -> f32 {
    let capacity = lane_count as f32 * per_lane;
    let count = vehicle_count as f32;
    if capacity <= 0.0 {
        return if vehicle_count > 0 { 1.0 } else { 0.0 };
    }

    let level = if count <= capacity {
        count / capacity
    } else {
        (SATURATION_KNEE + (1.0 - SATURATION_KNEE) * (count - capacity) / capacity).min(1.0)
    };
    level.clamp(0.0, 1.0)
}

/// Multiplier applied to a vehicle's speed on a segment with this congestion.
pub fn speed_factor(congestion: f32) -> f32 {
    1.0 - congestion.clamp(0.0, 1.0) * CONGESTION_SLOWDOWN
}

/// Recomputes congestion from the segment's vehicle count, then derives its
/// current speed from the free-flow speed.
pub fn update_congestion(segment: &mut RoadSegment, per_lane: f32) {
    segment.congestion_level =
        congestion_level(segment.vehicle_count, segment.lane_count, per_lane);
    segment.current_speed = segment.free_flow_speed * speed_factor(segment.congestion_level);
}
