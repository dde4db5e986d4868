//! Map objects and road geometry.
//!
//! Every record in a map, whether a vehicle or a road edge, is an [`Entity`].
//! Agents use the full kinematic state; road elements only use their
//! trajectory as a polyline.

pub mod trajectory;

pub use trajectory::Trajectory;

use std::fmt;

use crate::geometry::{distance_2d, OrientedBox};

/// Sentinel coordinate marking an agent that is off the map this step.
pub const INVALID_POSITION: f32 = -10000.0;

/// Agents whose goal is closer than this at t=0 are not worth controlling.
pub const MIN_DISTANCE_TO_GOAL: f32 = 2.0;

/// Kind of map record, with the numeric codes used by the map format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityType {
    #[default]
    None,
    Vehicle,
    Pedestrian,
    Cyclist,
    RoadLane,
    RoadLine,
    RoadEdge,
    StopSign,
    Crosswalk,
    SpeedBump,
    Driveway,
}

impl EntityType {
    /// Decodes a map-format type code.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => EntityType::None,
            1 => EntityType::Vehicle,
            2 => EntityType::Pedestrian,
            3 => EntityType::Cyclist,
            4 => EntityType::RoadLane,
            5 => EntityType::RoadLine,
            6 => EntityType::RoadEdge,
            7 => EntityType::StopSign,
            8 => EntityType::Crosswalk,
            9 => EntityType::SpeedBump,
            10 => EntityType::Driveway,
            _ => return None,
        })
    }

    /// Map-format type code.
    pub fn code(self) -> i32 {
        match self {
            EntityType::None => 0,
            EntityType::Vehicle => 1,
            EntityType::Pedestrian => 2,
            EntityType::Cyclist => 3,
            EntityType::RoadLane => 4,
            EntityType::RoadLine => 5,
            EntityType::RoadEdge => 6,
            EntityType::StopSign => 7,
            EntityType::Crosswalk => 8,
            EntityType::SpeedBump => 9,
            EntityType::Driveway => 10,
        }
    }

    /// Vehicles, pedestrians and cyclists.
    pub fn is_agent(self) -> bool {
        matches!(
            self,
            EntityType::Vehicle | EntityType::Pedestrian | EntityType::Cyclist
        )
    }

    /// Any road element (lanes onwards).
    pub fn is_road(self) -> bool {
        self.code() >= EntityType::RoadLane.code()
    }

    /// Road geometry indexed by the spatial grid: lanes, lines and edges.
    pub fn is_gridded(self) -> bool {
        matches!(
            self,
            EntityType::RoadLane | EntityType::RoadLine | EntityType::RoadEdge
        )
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::None => "none",
            EntityType::Vehicle => "vehicle",
            EntityType::Pedestrian => "pedestrian",
            EntityType::Cyclist => "cyclist",
            EntityType::RoadLane => "road_lane",
            EntityType::RoadLine => "road_line",
            EntityType::RoadEdge => "road_edge",
            EntityType::StopSign => "stop_sign",
            EntityType::Crosswalk => "crosswalk",
            EntityType::SpeedBump => "speed_bump",
            EntityType::Driveway => "driveway",
        };
        f.write_str(name)
    }
}

/// Outcome of the per-step collision evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionState {
    #[default]
    None,
    Vehicle,
    Offroad,
}

impl CollisionState {
    pub fn is_collision(self) -> bool {
        self != CollisionState::None
    }
}

/// Per-agent metrics refreshed every step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentMetrics {
    pub collision: f32,
    pub offroad: f32,
    pub reached_goal: f32,
    pub lane_aligned: f32,
    pub avg_displacement_error: f32,
}

impl AgentMetrics {
    /// Metrics in `[collision, offroad, reached_goal, lane_aligned, ade]` order.
    pub fn as_array(&self) -> [f32; 5] {
        [
            self.collision,
            self.offroad,
            self.reached_goal,
            self.lane_aligned,
            self.avg_displacement_error,
        ]
    }

    /// Clears everything except the reached-goal flag.
    pub fn clear_step(&mut self) {
        self.collision = 0.0;
        self.offroad = 0.0;
        self.lane_aligned = 0.0;
        self.avg_displacement_error = 0.0;
    }
}

/// One map record plus its simulation state.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub entity_type: EntityType,
    pub trajectory: Trajectory,

    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
    pub heading: f32,
    pub heading_x: f32,
    pub heading_y: f32,
    pub width: f32,
    pub length: f32,
    pub height: f32,

    pub goal_position_x: f32,
    pub goal_position_y: f32,
    pub goal_position_z: f32,
    pub init_goal_x: f32,
    pub init_goal_y: f32,
    /// Lane entity the agent was last matched to.
    pub current_lane_idx: Option<usize>,
    pub sampled_new_goal: bool,

    pub valid: bool,
    pub active_agent: bool,
    pub mark_as_expert: bool,
    /// Timestep of the last respawn; `None` while driving normally.
    pub respawn_timestep: Option<usize>,
    pub respawn_count: u32,
    pub collided_before_goal: bool,
    pub reached_goal_this_episode: bool,
    pub num_goals_reached: u32,

    pub collision_state: CollisionState,
    pub metrics: AgentMetrics,
    pub cumulative_displacement: f32,
    pub displacement_sample_count: u32,
}

impl Entity {
    /// Creates an entity from its recorded data, positioned at the first
    /// trajectory sample.
    pub fn new(entity_type: EntityType, trajectory: Trajectory) -> Self {
        let (x, y) = trajectory.point(0).unwrap_or((0.0, 0.0));
        let heading = trajectory.heading.first().copied().unwrap_or(0.0);
        Self {
            entity_type,
            x,
            y,
            z: trajectory.z.first().copied().unwrap_or(0.0),
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            heading,
            heading_x: heading.cos(),
            heading_y: heading.sin(),
            width: 0.0,
            length: 0.0,
            height: 0.0,
            goal_position_x: 0.0,
            goal_position_y: 0.0,
            goal_position_z: 0.0,
            init_goal_x: 0.0,
            init_goal_y: 0.0,
            current_lane_idx: None,
            sampled_new_goal: false,
            valid: trajectory.is_valid(0),
            active_agent: false,
            mark_as_expert: false,
            respawn_timestep: None,
            respawn_count: 0,
            collided_before_goal: false,
            reached_goal_this_episode: false,
            num_goals_reached: 0,
            collision_state: CollisionState::None,
            metrics: AgentMetrics::default(),
            cumulative_displacement: 0.0,
            displacement_sample_count: 0,
            trajectory,
        }
    }

    /// Road element with the given polyline.
    pub fn road(entity_type: EntityType, points: &[(f32, f32)]) -> Self {
        Self::new(entity_type, Trajectory::polyline(points))
    }

    /// Agent with a recorded trajectory, footprint and goal.
    pub fn agent(
        entity_type: EntityType,
        trajectory: Trajectory,
        length: f32,
        width: f32,
        goal: (f32, f32),
    ) -> Self {
        let mut entity = Self::new(entity_type, trajectory);
        entity.length = length;
        entity.width = width;
        entity.height = 1.5;
        entity.goal_position_x = goal.0;
        entity.goal_position_y = goal.1;
        entity.init_goal_x = goal.0;
        entity.init_goal_y = goal.1;
        entity
    }

    /// Sets the heading and refreshes its cached cosine and sine.
    pub fn set_heading(&mut self, heading: f32) {
        self.heading = heading;
        self.heading_x = heading.cos();
        self.heading_y = heading.sin();
    }

    /// Moves the entity to the off-map sentinel pose.
    pub fn set_off_map(&mut self) {
        self.x = INVALID_POSITION;
        self.y = INVALID_POSITION;
        self.z = 0.0;
        self.heading = 0.0;
        self.heading_x = 1.0;
        self.heading_y = 0.0;
    }

    pub fn is_off_map(&self) -> bool {
        self.x == INVALID_POSITION
    }

    pub fn is_respawning(&self) -> bool {
        self.respawn_timestep.is_some()
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn distance_to_goal(&self) -> f32 {
        distance_2d(self.x, self.y, self.goal_position_x, self.goal_position_y)
    }

    /// Current footprint.
    pub fn oriented_box(&self) -> OrientedBox {
        OrientedBox {
            x: self.x,
            y: self.y,
            cos: self.heading_x,
            sin: self.heading_y,
            half_length: self.length * 0.5,
            half_width: self.width * 0.5,
        }
    }

    /// Distance between the current position and the recorded one at `t`.
    ///
    /// Zero when `t` is outside the recording, the sample is invalid, or
    /// the recorded point is the off-map sentinel.
    pub fn displacement_error(&self, t: usize) -> f32 {
        if !self.trajectory.is_valid(t) {
            return 0.0;
        }
        match self.trajectory.point(t) {
            Some((rx, ry)) if rx != INVALID_POSITION && ry != INVALID_POSITION => {
                distance_2d(self.x, self.y, rx, ry)
            }
            _ => 0.0,
        }
    }

    /// Goal distance measured in the ego frame of the first recorded pose.
    pub fn ego_goal_distance_t0(&self) -> f32 {
        let (Some((x0, y0)), Some(&h0)) = (self.trajectory.point(0), self.trajectory.heading.first())
        else {
            return 0.0;
        };
        let (sin_h, cos_h) = h0.sin_cos();
        let gx = self.goal_position_x - x0;
        let gy = self.goal_position_y - y0;
        let rel_x = gx * cos_h + gy * sin_h;
        let rel_y = -gx * sin_h + gy * cos_h;
        (rel_x * rel_x + rel_y * rel_y).sqrt()
    }

    /// Valid at t=0 with a goal far enough away to be a real episode.
    pub fn eligible_at_start(&self) -> bool {
        self.trajectory.is_valid(0) && self.ego_goal_distance_t0() >= MIN_DISTANCE_TO_GOAL
    }

    /// Clears collision state and per-step metrics (reached-goal is kept).
    pub fn reset_step_metrics(&mut self) {
        self.metrics.clear_step();
        self.collision_state = CollisionState::None;
    }

    /// Clears all metrics and the displacement accumulator.
    pub fn reset_all_metrics(&mut self) {
        self.metrics = AgentMetrics::default();
        self.cumulative_displacement = 0.0;
        self.displacement_sample_count = 0;
    }
}
