//! Per-step agent metrics: displacement error, offroad, lane alignment and
//! vehicle collisions.

use std::f32::consts::{FRAC_PI_6, PI};

use crate::entity::{CollisionState, Entity, EntityType};
use crate::geometry::{heading_difference, point_to_segment_distance, segments_intersect};
use crate::grid::{GridMap, COLLISION_OFFSETS};

use super::selection::Roster;

/// Squared center distance beyond which two vehicles cannot touch.
const COLLISION_QUICK_REJECT_SQ: f32 = 225.0;

/// Lanes farther than this from the agent center do not count.
const MAX_LANE_DISTANCE: f32 = 4.0;

/// Distance penalty for lane segments pointing more than 30° away.
const MISALIGNED_LANE_PENALTY: f32 = 3.0;

/// Alignment tolerance, 15°.
const LANE_ALIGNMENT_TOLERANCE: f32 = PI / 12.0;

/// What the road scan around an agent found.
#[derive(Debug, Clone, Copy, Default)]
struct RoadContact {
    offroad: bool,
    /// `(entity_idx, geometry_idx, penalized distance)` of the nearest lane.
    closest_lane: Option<(usize, usize, f32)>,
}

/// Recomputes metrics and collision state for one agent.
///
/// Clears the per-step metrics first; off-map agents stop there. The
/// reached-goal slot is left alone.
///
/// # Arguments
///
/// * `entities` - Full entity list
/// * `grid` - Road segment index
/// * `roster` - Supplies the vehicle collision candidates
/// * `agent_idx` - Entity index of the agent
/// * `timestep` - Current step, for the displacement error
pub fn compute_agent_metrics(
    entities: &mut [Entity],
    grid: &GridMap,
    roster: &Roster,
    agent_idx: usize,
    timestep: usize,
) {
    let Some(agent) = entities.get_mut(agent_idx) else {
        return;
    };
    agent.reset_step_metrics();
    if agent.is_off_map() {
        return;
    }

    let displacement = agent.displacement_error(timestep);
    if displacement > 0.0 {
        agent.cumulative_displacement += displacement;
        agent.displacement_sample_count += 1;
        agent.metrics.avg_displacement_error =
            agent.cumulative_displacement / agent.displacement_sample_count as f32;
    }

    let road = scan_road(entities, grid, agent_idx);
    let collided_with = collision_check(entities, roster, agent_idx);

    let lane = match road.closest_lane {
        Some((lane_idx, geometry_idx, distance)) if distance <= MAX_LANE_DISTANCE => {
            let aligned =
                lane_aligned(entities[agent_idx].heading, &entities[lane_idx], geometry_idx);
            Some((lane_idx, aligned))
        }
        _ => None,
    };

    let agent = &mut entities[agent_idx];
    agent.current_lane_idx = lane.map(|(lane_idx, _)| lane_idx);
    if let Some((_, true)) = lane {
        agent.metrics.lane_aligned = 1.0;
    }

    agent.collision_state = if collided_with.is_some() {
        CollisionState::Vehicle
    } else if road.offroad {
        CollisionState::Offroad
    } else {
        CollisionState::None
    };
    agent.metrics.collision = f32::from(u8::from(agent.collision_state == CollisionState::Vehicle));
    agent.metrics.offroad = f32::from(u8::from(agent.collision_state == CollisionState::Offroad));
}

/// Walks the road segments in the 5x5 cell window around the agent.
///
/// The first road edge crossing the footprint stops the scan. Lanes seen
/// before that compete on distance to the agent center.
fn scan_road(entities: &[Entity], grid: &GridMap, agent_idx: usize) -> RoadContact {
    let mut contact = RoadContact::default();
    let agent = &entities[agent_idx];
    let Some(cell) = grid.grid_index(agent.x, agent.y) else {
        return contact;
    };
    let edges = agent.oriented_box().edges();
    let mut min_distance = i16::MAX as f32;

    for entry in grid.entries_around(cell, &COLLISION_OFFSETS) {
        if entry.entity_idx == agent_idx {
            continue;
        }
        let Some(entity) = entities.get(entry.entity_idx) else {
            continue;
        };
        let Some((start, end)) = entity.trajectory.segment(entry.geometry_idx) else {
            continue;
        };
        let (start, end) = ([start.0, start.1], [end.0, end.1]);

        match entity.entity_type {
            EntityType::RoadEdge => {
                if edges
                    .iter()
                    .any(|&(a, b)| segments_intersect(a, b, start, end))
                {
                    contact.offroad = true;
                    break;
                }
            }
            EntityType::RoadLane => {
                let mut distance = point_to_segment_distance([agent.x, agent.y], start, end);
                let segment_heading = (end[1] - start[1]).atan2(end[0] - start[0]);
                if heading_difference(segment_heading, agent.heading) > FRAC_PI_6 {
                    distance += MISALIGNED_LANE_PENALTY;
                }
                if distance < min_distance {
                    min_distance = distance;
                    contact.closest_lane = Some((entry.entity_idx, entry.geometry_idx, distance));
                }
            }
            _ => {}
        }
    }
    contact
}

/// Whether `heading` is within 15° of the lane direction at a segment.
///
/// The lane direction is the mean of the incoming and outgoing segment
/// headings. Out-of-range segment indices are clamped.
pub fn lane_aligned(heading: f32, lane: &Entity, geometry_idx: usize) -> bool {
    let n = lane.trajectory.len();
    if n < 2 {
        return false;
    }
    let idx = geometry_idx.min(n - 2);
    let seg_heading = |i: usize| {
        lane.trajectory
            .segment(i)
            .map(|((x0, y0), (x1, y1))| (y1 - y0).atan2(x1 - x0))
            .unwrap_or(0.0)
    };
    let outgoing = seg_heading(idx);
    let incoming = if idx > 0 { seg_heading(idx - 1) } else { outgoing };

    let mut lane_heading = (incoming + outgoing) / 2.0;
    if lane_heading > PI {
        lane_heading -= 2.0 * PI;
    }
    if lane_heading < -PI {
        lane_heading += 2.0 * PI;
    }
    heading_difference(heading, lane_heading) < LANE_ALIGNMENT_TOLERANCE
}

/// First collision candidate whose footprint overlaps the agent's.
///
/// Candidates are scanned in roster order (active agents, then statics).
/// Off-map and respawning agents never collide; respawning candidates and
/// candidates more than 15 units away are skipped.
pub fn collision_check(entities: &[Entity], roster: &Roster, agent_idx: usize) -> Option<usize> {
    let agent = entities.get(agent_idx)?;
    if agent.is_off_map() || agent.is_respawning() {
        return None;
    }
    let footprint = agent.oriented_box();

    roster.collision_candidates().find(|&idx| {
        if idx == agent_idx {
            return false;
        }
        let Some(other) = entities.get(idx) else {
            return false;
        };
        if other.is_respawning() {
            return false;
        }
        let dx = other.x - agent.x;
        let dy = other.y - agent.y;
        if dx * dx + dy * dy > COLLISION_QUICK_REJECT_SQ {
            return false;
        }
        footprint.overlaps(&other.oriented_box())
    })
}
