//! Lane connectivity graph.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::entity::{Entity, EntityType};
use crate::geometry::distance_2d;

/// Maximum gap between a lane's end and its successor's start.
pub const CONNECTION_DISTANCE: f32 = 0.01;

/// Maximum raw heading difference between connected lane ends, in radians.
pub const CONNECTION_HEADING: f32 = 0.1;

/// Directed graph of lanes, one node per lane entity.
///
/// # Invariants
///
/// - Node weights are entity indices of `ROAD_LANE` entities
/// - An edge `i -> j` means lane `i` flows into lane `j`
/// - The graph is immutable after [`build`](Self::build)
#[derive(Debug, Clone)]
pub struct LaneGraph {
    graph: DiGraph<usize, ()>,
    /// Maps entity index → node index.
    node_by_entity: HashMap<usize, NodeIndex>,
}

impl LaneGraph {
    /// Connects every lane whose end meets another lane's start.
    ///
    /// Returns `None` when the map has no lanes at all. Lanes with fewer
    /// than two points are kept as isolated nodes.
    pub fn build(entities: &[Entity]) -> Option<Self> {
        let lanes: Vec<usize> = entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.entity_type == EntityType::RoadLane)
            .map(|(i, _)| i)
            .collect();
        if lanes.is_empty() {
            return None;
        }

        let mut graph = DiGraph::with_capacity(lanes.len(), lanes.len());
        let node_by_entity: HashMap<usize, NodeIndex> =
            lanes.iter().map(|&i| (i, graph.add_node(i))).collect();

        for &i in &lanes {
            let Some((end, end_heading)) = lane_end(&entities[i]) else {
                continue;
            };
            for &j in &lanes {
                if i == j {
                    continue;
                }
                let Some((start, start_heading)) = lane_start(&entities[j]) else {
                    continue;
                };
                let gap = distance_2d(end.0, end.1, start.0, start.1);
                if gap < CONNECTION_DISTANCE
                    && (end_heading - start_heading).abs() < CONNECTION_HEADING
                {
                    graph.add_edge(node_by_entity[&i], node_by_entity[&j], ());
                }
            }
        }

        debug!(
            lanes = graph.node_count(),
            connections = graph.edge_count(),
            "lane graph built"
        );
        Some(Self {
            graph,
            node_by_entity,
        })
    }

    /// Successor lanes of `entity_idx`, at most `max_count`.
    ///
    /// Successors come most recently connected first. Unknown indices and
    /// dead ends yield an empty list.
    pub fn next_lanes(&self, entity_idx: usize, max_count: usize) -> Vec<usize> {
        let Some(&node) = self.node_by_entity.get(&entity_idx) else {
            return Vec::new();
        };
        self.graph
            .neighbors(node)
            .take(max_count)
            .map(|n| self.graph[n])
            .collect()
    }

    pub fn lane_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Terminal point and heading of a lane's last segment.
fn lane_end(lane: &Entity) -> Option<((f32, f32), f32)> {
    let n = lane.trajectory.len();
    if n < 2 {
        return None;
    }
    let (prev, last) = lane.trajectory.segment(n - 2)?;
    Some((last, (last.1 - prev.1).atan2(last.0 - prev.0)))
}

/// Initial point and heading of a lane's first segment.
fn lane_start(lane: &Entity) -> Option<((f32, f32), f32)> {
    if lane.trajectory.len() < 2 {
        return None;
    }
    let (first, next) = lane.trajectory.segment(0)?;
    Some((first, (next.1 - first.1).atan2(next.0 - first.0)))
}
