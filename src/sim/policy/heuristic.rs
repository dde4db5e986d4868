//! Goal-seeking heuristic baseline.
//!
//! Steers toward the goal read from the ego features and brakes for
//! partners directly ahead.

use super::trait_::Policy;
use crate::sim::config::{ActionType, DriveConfig, MAX_AGENTS};
use crate::sim::dynamics::{Action, ACCELERATION_VALUES, STEERING_VALUES};
use crate::sim::observation::{GOAL_SCALE, POSITION_SCALE, SPEED_SCALE};

/// Speed the policy tries to hold, in m/s.
const CRUISE_SPEED: f32 = 8.0;
/// Look-ahead distance for partners, in meters.
const BRAKING_DISTANCE: f32 = 10.0;
/// Half width of the corridor checked for partners, in meters.
const CORRIDOR_HALF_WIDTH: f32 = 2.5;

/// Heuristic policy that drives each agent straight at its goal.
///
/// For each agent, from its observation row:
/// ```text
/// steering     = clip(atan2(goal_y, goal_x), ±1)
/// target_speed = min(CRUISE_SPEED, 0.5 × |goal|), or 0 with a partner ahead
/// acceleration = ±4 toward target_speed, 0 within 1 m/s
/// ```
///
/// Discrete actions snap to the nearest table entries. Serves as a
/// baseline that should beat the random policy on goal completion.
pub struct GoalSeekingPolicy {
    action_type: ActionType,
}

impl GoalSeekingPolicy {
    pub fn new(action_type: ActionType) -> Self {
        Self { action_type }
    }

    /// Continuous `(acceleration, steering)` for one observation row.
    fn controls(obs: &[f32]) -> (f32, f32) {
        let goal_x = obs[0] / GOAL_SCALE;
        let goal_y = obs[1] / GOAL_SCALE;
        let speed = obs[2] / SPEED_SCALE;

        let steering = goal_y.atan2(goal_x).clamp(-1.0, 1.0);
        let goal_distance = (goal_x * goal_x + goal_y * goal_y).sqrt();
        let target_speed = if Self::partner_ahead(obs) {
            0.0
        } else {
            CRUISE_SPEED.min(0.5 * goal_distance)
        };

        let acceleration = if speed < target_speed - 1.0 {
            ACCELERATION_VALUES[ACCELERATION_VALUES.len() - 1]
        } else if speed > target_speed + 1.0 {
            ACCELERATION_VALUES[0]
        } else {
            0.0
        };
        (acceleration, steering)
    }

    /// Whether a partner slot lies in the corridor in front of the ego.
    fn partner_ahead(obs: &[f32]) -> bool {
        let start = DriveConfig::EGO_FEATURE_DIM;
        let end = start + DriveConfig::PARTNER_FEATURE_DIM * (MAX_AGENTS - 1);
        obs[start..end]
            .chunks_exact(DriveConfig::PARTNER_FEATURE_DIM)
            .filter(|slot| slot.iter().any(|&v| v != 0.0))
            .any(|slot| {
                let ahead = slot[0] / POSITION_SCALE;
                let lateral = slot[1] / POSITION_SCALE;
                ahead > 0.0 && ahead <= BRAKING_DISTANCE && lateral.abs() <= CORRIDOR_HALF_WIDTH
            })
    }
}

/// Index of the table entry closest to `value`.
fn nearest_index(table: &[f32], value: f32) -> usize {
    table
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

impl Policy for GoalSeekingPolicy {
    fn select_actions(&mut self, observations: &[f32]) -> Vec<Action> {
        observations
            .chunks_exact(DriveConfig::observation_dim())
            .map(|obs| {
                let (acceleration, steering) = Self::controls(obs);
                match self.action_type {
                    ActionType::Discrete => Action::Discrete {
                        acceleration: nearest_index(&ACCELERATION_VALUES, acceleration),
                        steering: nearest_index(&STEERING_VALUES, steering),
                    },
                    ActionType::Continuous => Action::Continuous {
                        acceleration,
                        steering,
                    },
                }
            })
            .collect()
    }

    fn name(&self) -> &str {
        "goal-seeking"
    }
}
