//! Configuration for the driving simulation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Hard cap on agents tracked per simulation (active plus static).
pub const MAX_AGENTS: usize = 64;

/// Road segments encoded per observation.
pub const MAX_ROAD_SEGMENT_OBSERVATIONS: usize = 200;

/// Vehicle dynamics model.
///
/// Only [`DynamicsModel::Classic`] is implemented; the others are recognized
/// so configurations naming them fail validation instead of parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DynamicsModel {
    #[default]
    Classic,
    InvertibleBicycle,
    DeltaLocal,
    StateDynamics,
}

/// How actions are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActionType {
    /// Index pairs into the acceleration and steering tables.
    #[default]
    Discrete,
    /// Raw `(acceleration, steering)` floats.
    Continuous,
}

/// Configuration for a [`Drive`](super::Drive) simulation.
///
/// Controls dynamics, reward shaping, episode length and how agents are
/// chosen from the map.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriveConfig {
    // --- Dynamics ---
    pub dynamics_model: DynamicsModel,
    pub action_type: ActionType,

    // --- Reward shaping ---
    /// Added on a step that ends in a vehicle collision.
    pub reward_vehicle_collision: f32,
    /// Added on a step that ends crossing a road edge.
    pub reward_offroad_collision: f32,
    /// Added the first time an agent reaches its goal.
    pub reward_goal: f32,
    /// Added when a respawned agent reaches its goal again.
    pub reward_goal_post_respawn: f32,
    /// Multiplier on the running displacement error, applied every step.
    pub reward_ade: f32,
    /// Distance below which the goal counts as reached.
    pub goal_radius: f32,

    // --- Episode ---
    /// Steps per episode; reaching it triggers a full reset.
    pub scenario_length: usize,
    /// Trajectory step agents start from.
    pub init_steps: usize,

    // --- Agent selection ---
    pub control_all_agents: bool,
    /// Skip the shuffle when picking agents.
    pub deterministic_agent_selection: bool,
    /// Number of policy agents to pick; 0 falls back to the legacy selection.
    pub policy_agents_per_env: usize,
    /// Also control pedestrians and cyclists.
    pub control_non_vehicles: bool,
    /// Upper bound on active agents, at most [`MAX_AGENTS`].
    pub max_agents: usize,

    // --- Goals ---
    /// Resample goals along the lane graph instead of respawning.
    pub use_goal_generation: bool,

    /// Name used in diagnostics.
    pub map_name: Option<String>,
}

impl DriveConfig {
    /// Features encoding the ego agent.
    pub const EGO_FEATURE_DIM: usize = 7; // goal x, goal y, speed, width, length, collided, respawned

    /// Features encoding one partner agent.
    pub const PARTNER_FEATURE_DIM: usize = 7; // x, y, width, length, cos, sin, speed

    /// Features encoding one road segment.
    pub const ROAD_FEATURE_DIM: usize = 7; // x, y, length, width, cos, sin, type

    /// Observation length per active agent.
    pub const fn observation_dim() -> usize {
        Self::EGO_FEATURE_DIM
            + Self::PARTNER_FEATURE_DIM * (MAX_AGENTS - 1)
            + Self::ROAD_FEATURE_DIM * MAX_ROAD_SEGMENT_OBSERVATIONS
    }

    /// Map name for log output.
    pub fn map_label(&self) -> &str {
        self.map_name.as_deref().unwrap_or("(unset-map)")
    }

    /// Checks that the configuration can drive a simulation.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenario_length == 0 {
            return Err(ConfigError::ZeroScenarioLength);
        }
        if self.init_steps >= self.scenario_length {
            return Err(ConfigError::InitStepsBeyondScenario {
                init_steps: self.init_steps,
                scenario_length: self.scenario_length,
            });
        }
        if !(self.goal_radius.is_finite() && self.goal_radius > 0.0) {
            return Err(ConfigError::InvalidGoalRadius(self.goal_radius));
        }
        if self.max_agents == 0 || self.max_agents > MAX_AGENTS {
            return Err(ConfigError::AgentCapacity {
                requested: self.max_agents,
                max: MAX_AGENTS,
            });
        }
        if self.dynamics_model != DynamicsModel::Classic {
            return Err(ConfigError::UnsupportedDynamics(self.dynamics_model));
        }
        Ok(())
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            dynamics_model: DynamicsModel::Classic,
            action_type: ActionType::Discrete,
            reward_vehicle_collision: -0.1,
            reward_offroad_collision: -0.1,
            reward_goal: 1.0,
            reward_goal_post_respawn: 0.5,
            reward_ade: 0.0,
            goal_radius: 2.0,
            scenario_length: 91,
            init_steps: 0,
            control_all_agents: false,
            deterministic_agent_selection: false,
            policy_agents_per_env: 0,
            control_non_vehicles: false,
            max_agents: MAX_AGENTS,
            use_goal_generation: false,
            map_name: None,
        }
    }
}
