//! Goal resampling along the lane graph, and respawning.

use tracing::debug;

use crate::entity::Entity;
use crate::geometry::distance_2d;
use crate::topology::LaneGraph;

/// How far ahead along the lanes a resampled goal is placed.
pub const GOAL_LOOKAHEAD: f32 = 40.0;

/// Successors considered at each lane junction.
const MAX_SUCCESSORS: usize = 5;

/// Segments shorter than this (squared) are ignored by the projection.
const MIN_SEGMENT_LENGTH_SQ: f32 = 1e-6;

/// Nearest point of `lane` that lies ahead of the agent.
///
/// Returns the segment index `i` (the segment ending at point `i`) and
/// the clamped fraction along it.
fn forward_projection(lane: &Entity, agent: &Entity) -> Option<(usize, f32)> {
    let traj = &lane.trajectory;
    let mut best: Option<(usize, f32, f32)> = None;

    for i in 1..traj.len() {
        let (x0, y0) = (traj.x[i - 1], traj.y[i - 1]);
        let dx = traj.x[i] - x0;
        let dy = traj.y[i] - y0;
        let seg_len_sq = dx * dx + dy * dy;
        if seg_len_sq < MIN_SEGMENT_LENGTH_SQ {
            continue;
        }
        let t = (((agent.x - x0) * dx + (agent.y - y0) * dy) / seg_len_sq).clamp(0.0, 1.0);
        let rel_x = x0 + t * dx - agent.x;
        let rel_y = y0 + t * dy - agent.y;
        if rel_x * agent.heading_x + rel_y * agent.heading_y < 0.0 {
            continue;
        }
        let dist_sq = rel_x * rel_x + rel_y * rel_y;
        if best.map_or(true, |(_, _, d)| dist_sq < d) {
            best = Some((i, t, dist_sq));
        }
    }
    best.map(|(i, t, _)| (i, t))
}

fn last_point(lane: &Entity) -> Option<(f32, f32)> {
    lane.trajectory
        .len()
        .checked_sub(1)
        .and_then(|i| lane.trajectory.point(i))
}

/// Picks the point [`GOAL_LOOKAHEAD`] units ahead of the agent along its
/// current lane and the lanes that follow.
///
/// Returns `None` when the agent has no current lane. Dead ends, and walks
/// that revisit more lanes than the graph has, settle on the last point of
/// the lane reached.
pub fn sample_goal(
    entities: &[Entity],
    graph: Option<&LaneGraph>,
    agent_idx: usize,
) -> Option<(f32, f32)> {
    let agent = entities.get(agent_idx)?;
    let mut lane_idx = agent.current_lane_idx?;
    let mut lane = entities.get(lane_idx)?;

    let start_idx = match forward_projection(lane, agent) {
        Some((segment, _)) => segment,
        None => {
            let forward = (0..lane.trajectory.len()).find(|&i| {
                let to_x = lane.trajectory.x[i] - agent.x;
                let to_y = lane.trajectory.y[i] - agent.y;
                to_x * agent.heading_x + to_y * agent.heading_y > 0.0
            });
            match forward {
                Some(i) => i.max(1),
                None => return last_point(lane),
            }
        }
    };

    let mut remaining = GOAL_LOOKAHEAD;
    let mut first_segment = start_idx;
    let max_hops = graph.map_or(0, LaneGraph::lane_count) + 1;

    for _ in 0..max_hops {
        let traj = &lane.trajectory;
        for i in first_segment..traj.len() {
            let segment_length = distance_2d(traj.x[i - 1], traj.y[i - 1], traj.x[i], traj.y[i]);
            if remaining <= segment_length {
                return Some((traj.x[i], traj.y[i]));
            }
            remaining -= segment_length;
        }

        let successors = graph.map(|g| g.next_lanes(lane_idx, MAX_SUCCESSORS)).unwrap_or_default();
        if successors.is_empty() {
            return last_point(lane);
        }
        lane_idx = successors[agent_idx % successors.len()];
        let Some(next) = entities.get(lane_idx) else {
            return last_point(lane);
        };
        lane = next;
        first_segment = 1;
    }
    last_point(lane)
}

/// Replaces the agent's goal with one sampled ahead on the lane graph.
///
/// Leaves the goal, and the pending resample request, untouched when the
/// agent is not on a lane.
pub fn compute_new_goal(entities: &mut [Entity], graph: Option<&LaneGraph>, agent_idx: usize) {
    let Some((gx, gy)) = sample_goal(entities, graph, agent_idx) else {
        return;
    };
    let agent = &mut entities[agent_idx];
    agent.goal_position_x = gx;
    agent.goal_position_y = gy;
    agent.sampled_new_goal = false;
    debug!(agent = agent_idx, x = gx, y = gy, "new goal sampled");
}

/// Puts an agent back at its first recorded pose and marks it respawned.
///
/// Clears every metric including the reached-goal flag.
pub fn respawn(agent: &mut Entity, timestep: usize) {
    let traj = &agent.trajectory;
    let (x, y) = traj.point(0).unwrap_or((agent.x, agent.y));
    let heading = traj.heading.first().copied().unwrap_or(agent.heading);
    let vx = traj.vx.first().copied().unwrap_or(0.0);
    let vy = traj.vy.first().copied().unwrap_or(0.0);

    agent.x = x;
    agent.y = y;
    agent.vx = vx;
    agent.vy = vy;
    agent.set_heading(heading);
    agent.reset_all_metrics();
    agent.respawn_timestep = Some(timestep);
    agent.respawn_count += 1;
}
