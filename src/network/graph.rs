use super::{Node, NodeId, RoadRow, RoadSegment, RoadVisual, SegmentId, LOG_TARGET};
use crate::error::{Result, TrafficError};
use pathfinding::prelude::bfs;
use std::collections::HashMap;

/// Road topology plus the live per-segment traffic metrics.
#[derive(Debug, Clone, Default)]
pub struct RoadGraph {
    visuals: Vec<RoadVisual>,
    adjacency: HashMap<NodeId, Vec<SegmentId>>, // both endpoints, insertion order
    segments: HashMap<SegmentId, RoadSegment>,
    segment_order: Vec<SegmentId>,
    nodes: HashMap<NodeId, Node>,
}

impl RoadGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.visuals.clear();
        self.adjacency.clear();
        self.segments.clear();
        self.segment_order.clear();
        self.nodes.clear();
    }

    /// Replaces the graph with the given rows, returning the number of
    /// segments loaded. Nodes are derived from distinct endpoint coordinates
    /// and numbered from 1 in first-seen order.
    pub fn load_from_rows<I>(&mut self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = RoadRow>,
    {
        self.clear();

        let mut node_ids: HashMap<(i32, i32), NodeId> = HashMap::new();
        let mut next_node_id: NodeId = 1;

        for row in rows {
            if self.segments.contains_key(&row.segment_id) {
                log::warn!(target: LOG_TARGET, "Skipping duplicate segment {}", row.segment_id);
                continue;
            }
            let length = row.length();
            if length <= 0.0 {
                log::warn!(target: LOG_TARGET, "Skipping zero-length segment {}", row.segment_id);
                continue;
            }

            let mut endpoint = |x: i32, y: i32, nodes: &mut HashMap<NodeId, Node>| {
                *node_ids.entry((x, y)).or_insert_with(|| {
                    let id = next_node_id;
                    next_node_id += 1;
                    nodes.insert(id, Node::new(id, x as f32, y as f32));
                    id
                })
            };
            let from = endpoint(row.x1, row.y1, &mut self.nodes);
            let to = endpoint(row.x2, row.y2, &mut self.nodes);

            let mut segment = RoadSegment::new(row.segment_id, from, to);
            segment.set_geometry(&self.nodes[&from].position, &self.nodes[&to].position);

            self.link(segment);
            self.visuals.push(RoadVisual {
                id: row.segment_id,
                x1: row.x1,
                y1: row.y1,
                x2: row.x2,
                y2: row.y2,
                length,
            });
        }

        log::info!(target: LOG_TARGET, "Loaded {} segments, created {} nodes",
                   self.segments.len(), self.nodes.len());

        if self.segments.is_empty() {
            return Err(TrafficError::EmptySource("road rows".to_string()));
        }
        Ok(self.segments.len())
    }

    // Registers an already validated segment whose endpoints exist.
    fn link(&mut self, segment: RoadSegment) {
        let id = segment.id;
        if let Some(from) = self.nodes.get_mut(&segment.from_node) {
            from.outgoing.push(id);
        }
        self.adjacency.entry(segment.from_node).or_default().push(id);
        if segment.to_node != segment.from_node {
            self.adjacency.entry(segment.to_node).or_default().push(id);
        }
        self.segment_order.push(id);
        self.segments.insert(id, segment);
    }

    pub fn segment(&self, id: SegmentId) -> Option<&RoadSegment> {
        self.segments.get(&id)
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> Option<&mut RoadSegment> {
        self.segments.get_mut(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Segments leaving `node`, empty for unknown nodes.
    pub fn outgoing(&self, node: NodeId) -> &[SegmentId] {
        self.nodes
            .get(&node)
            .map(|n| n.outgoing.as_slice())
            .unwrap_or(&[])
    }

    /// Segment ids in insertion order.
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segment_order.clone()
    }

    pub fn segments(&self) -> impl Iterator<Item = &RoadSegment> {
        self.segment_order.iter().filter_map(|id| self.segments.get(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn visuals(&self) -> &[RoadVisual] {
        &self.visuals
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Shortest-hop path from `src` to `dst` as a list of segment ids.
    ///
    /// Neighbors are explored in adjacency order, so ties resolve to the
    /// segment inserted first. Returns an empty list when `src == dst`, when
    /// either node is unknown, or when `dst` is unreachable.
    pub fn route(&self, src: NodeId, dst: NodeId) -> Vec<SegmentId> {
        if src == dst || !self.nodes.contains_key(&src) || !self.nodes.contains_key(&dst) {
            return Vec::new();
        }

        let Some(path) = bfs(&src, |&node| self.neighbors(node), |&node| node == dst) else {
            return Vec::new();
        };

        path.windows(2)
            .filter_map(|hop| self.connecting_segment(hop[0], hop[1]))
            .collect()
    }

    fn neighbors(&self, node: NodeId) -> Vec<NodeId> {
        self.adjacency
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.segments.get(id))
            .filter_map(|segment| segment.traverse_from(node))
            .collect()
    }

    fn connecting_segment(&self, from: NodeId, to: NodeId) -> Option<SegmentId> {
        self.adjacency.get(&from)?.iter().copied().find(|id| {
            self.segments
                .get(id)
                .and_then(|segment| segment.traverse_from(from))
                == Some(to)
        })
    }

    /// Inserts or replaces a node. A replaced node keeps its outgoing list.
    pub fn add_node(&mut self, mut node: Node) {
        if let Some(previous) = self.nodes.remove(&node.id) {
            for id in previous.outgoing {
                if !node.outgoing.contains(&id) {
                    node.outgoing.push(id);
                }
            }
        }
        self.nodes.insert(node.id, node);
    }

    /// Adds a segment between two existing nodes. Length and direction are
    /// derived from the node positions unless a positive length is supplied.
    pub fn add_segment(&mut self, mut segment: RoadSegment) -> Result<()> {
        if self.segments.contains_key(&segment.id) {
            return Err(TrafficError::DuplicateSegment(segment.id));
        }
        let endpoint = |node: NodeId| {
            self.nodes
                .get(&node)
                .map(|n| n.position)
                .ok_or(TrafficError::UnknownNode { segment: segment.id, node })
        };
        let from = endpoint(segment.from_node)?;
        let to = endpoint(segment.to_node)?;

        let supplied_length = segment.length;
        segment.set_geometry(&from, &to);
        if supplied_length > 0.0 {
            segment.length = supplied_length;
        }
        if segment.length <= 0.0 {
            return Err(TrafficError::DegenerateSegment(segment.id));
        }

        self.visuals.push(RoadVisual {
            id: segment.id,
            x1: from.x as i32,
            y1: from.y as i32,
            x2: to.x as i32,
            y2: to.y as i32,
            length: segment.length,
        });
        log::debug!(target: LOG_TARGET, "Added segment {} ({} -> {})",
                    segment.id, segment.from_node, segment.to_node);
        self.link(segment);
        Ok(())
    }
}
