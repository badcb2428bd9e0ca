use thiserror::Error;

use crate::network::{NodeId, SegmentId};

#[derive(Error, Debug)]
pub enum TrafficError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Source '{0}' yielded no usable records")]
    EmptySource(String),
    #[error("No road graph attached to the simulation")]
    NoRoadGraph,
    #[error("Segment {segment} references unknown node {node}")]
    UnknownNode { segment: SegmentId, node: NodeId },
    #[error("Segment {0} already exists")]
    DuplicateSegment(SegmentId),
    #[error("Segment {0} has zero length")]
    DegenerateSegment(SegmentId),
}

pub type Result<T, E = TrafficError> = std::result::Result<T, E>;
