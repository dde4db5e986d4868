//! Observation encoding for active agents.
//!
//! Each agent sees itself, nearby partner vehicles and nearby road
//! segments, all in its own frame.

use tracing::warn;

use super::config::{DriveConfig, MAX_AGENTS, MAX_ROAD_SEGMENT_OBSERVATIONS};
use super::dynamics::MAX_SPEED;
use super::selection::Roster;
use crate::entity::Entity;
use crate::grid::GridMap;

/// Scale for relative goal coordinates.
pub const GOAL_SCALE: f32 = 0.005;
/// Scale for ego speed.
pub const SPEED_SCALE: f32 = 0.01;
/// Scale for partner and road positions.
pub const POSITION_SCALE: f32 = 0.02;
const MAX_VEHICLE_WIDTH: f32 = 15.0;
const MAX_VEHICLE_LENGTH: f32 = 30.0;
const MAX_ROAD_SEGMENT_LENGTH: f32 = 100.0;
const MAX_ROAD_SCALE: f32 = 100.0;
/// Nominal road segment width.
const ROAD_SEGMENT_WIDTH: f32 = 0.1;
/// Squared radius within which partners are visible.
const PARTNER_RADIUS_SQ: f32 = 2500.0;

/// Rotates a world-frame offset into the frame with heading `(cos, sin)`.
fn to_ego_frame(dx: f32, dy: f32, cos: f32, sin: f32) -> (f32, f32) {
    (dx * cos + dy * sin, -dx * sin + dy * cos)
}

/// Builds observation vectors for active agents.
pub struct ObservationBuilder;

impl ObservationBuilder {
    /// Encodes one agent into `obs`, which must be zeroed and exactly
    /// [`DriveConfig::observation_dim`] long.
    ///
    /// Layout:
    /// ```text
    /// [ego(7)] ++ [partner_1(7)] ++ ... ++ [partner_63(7)] ++ [road_1(7)] ++ ... ++ [road_200(7)]
    /// ```
    ///
    /// Partners fill slots in roster order (active agents, then statics),
    /// skipping the ego, respawning entities and anything beyond 50 units.
    /// A respawning ego sees no partners. Road slots come from the neighbor
    /// cache of the ego's cell. Unused slots stay zero.
    ///
    /// # Arguments
    ///
    /// * `obs` - Output slice for this agent
    /// * `agent_idx` - Entity index of the ego
    /// * `entities` - Full entity list
    /// * `roster` - Current roster
    /// * `grid` - Road segment index
    pub fn write(
        obs: &mut [f32],
        agent_idx: usize,
        entities: &[Entity],
        roster: &Roster,
        grid: &GridMap,
    ) {
        let Some(ego) = entities.get(agent_idx) else {
            return;
        };
        let (cos, sin) = (ego.heading_x, ego.heading_y);

        let (ego_part, rest) = obs.split_at_mut(DriveConfig::EGO_FEATURE_DIM);
        let partner_len = DriveConfig::PARTNER_FEATURE_DIM * (MAX_AGENTS - 1);
        let (partner_part, road_part) = rest.split_at_mut(partner_len);

        // Ego
        let (goal_x, goal_y) = to_ego_frame(
            ego.goal_position_x - ego.x,
            ego.goal_position_y - ego.y,
            cos,
            sin,
        );
        ego_part.copy_from_slice(&[
            goal_x * GOAL_SCALE,
            goal_y * GOAL_SCALE,
            ego.speed() * SPEED_SCALE,
            ego.width / MAX_VEHICLE_WIDTH,
            ego.length / MAX_VEHICLE_LENGTH,
            if ego.collision_state.is_collision() { 1.0 } else { 0.0 },
            if ego.is_respawning() { 1.0 } else { 0.0 },
        ]);

        // Partners
        if !ego.is_respawning() {
            let visible = roster
                .collision_candidates()
                .filter(|&idx| idx != agent_idx)
                .filter_map(|idx| entities.get(idx))
                .filter(|other| !other.is_respawning())
                .filter(|other| {
                    let dx = other.x - ego.x;
                    let dy = other.y - ego.y;
                    dx * dx + dy * dy <= PARTNER_RADIUS_SQ
                });
            let slots = partner_part.chunks_exact_mut(DriveConfig::PARTNER_FEATURE_DIM);
            for (slot, other) in slots.zip(visible) {
                let (rel_x, rel_y) = to_ego_frame(other.x - ego.x, other.y - ego.y, cos, sin);
                slot.copy_from_slice(&[
                    rel_x * POSITION_SCALE,
                    rel_y * POSITION_SCALE,
                    other.width / MAX_VEHICLE_WIDTH,
                    other.length / MAX_VEHICLE_LENGTH,
                    other.heading_x * cos + other.heading_y * sin,
                    other.heading_y * cos - other.heading_x * sin,
                    other.speed() / MAX_SPEED,
                ]);
            }
        }

        // Road segments
        let Some(cell) = grid.grid_index(ego.x, ego.y) else {
            return;
        };
        let segments = grid
            .neighbors(cell)
            .iter()
            .take(MAX_ROAD_SEGMENT_OBSERVATIONS)
            .filter_map(|entry| {
                let segment = entities
                    .get(entry.entity_idx)
                    .and_then(|e| e.trajectory.segment(entry.geometry_idx).map(|s| (e, s)));
                if segment.is_none() {
                    warn!(
                        entity = entry.entity_idx,
                        geometry = entry.geometry_idx,
                        "invalid grid entry skipped"
                    );
                }
                segment
            });
        let slots = road_part.chunks_exact_mut(DriveConfig::ROAD_FEATURE_DIM);
        for (slot, (road, ((x0, y0), (x1, y1)))) in slots.zip(segments) {
            let mid_x = (x0 + x1) / 2.0;
            let mid_y = (y0 + y1) / 2.0;
            let (rel_x, rel_y) = to_ego_frame(mid_x - ego.x, mid_y - ego.y, cos, sin);

            let mut dx = x1 - mid_x;
            let mut dy = y1 - mid_y;
            let half_length = (dx * dx + dy * dy).sqrt();
            if half_length > 0.0 {
                dx /= half_length;
                dy /= half_length;
            }
            let (dir_cos, dir_sin) = to_ego_frame(dx, dy, cos, sin);

            slot.copy_from_slice(&[
                rel_x * POSITION_SCALE,
                rel_y * POSITION_SCALE,
                half_length / MAX_ROAD_SEGMENT_LENGTH,
                ROAD_SEGMENT_WIDTH / MAX_ROAD_SCALE,
                dir_cos,
                dir_sin,
                road.entity_type.code() as f32 - 4.0,
            ]);
        }
    }

    /// Encodes every active agent into `buffer`, one
    /// [`DriveConfig::observation_dim`] row per agent in roster order.
    ///
    /// The buffer is cleared first.
    pub fn write_all(buffer: &mut [f32], entities: &[Entity], roster: &Roster, grid: &GridMap) {
        buffer.fill(0.0);
        let rows = buffer.chunks_exact_mut(DriveConfig::observation_dim());
        for (obs, &agent_idx) in rows.zip(&roster.active) {
            Self::write(obs, agent_idx, entities, roster, grid);
        }
    }
}
