//! Per-step reward for an active agent.
//!
//! Combines collision and offroad penalties, the goal bonus and the
//! displacement-error shaping term, and records them in the agent's log.

use super::config::DriveConfig;
use super::log::Log;
use crate::entity::{CollisionState, Entity};

/// Computes rewards for active agents.
pub struct RewardComputer;

impl RewardComputer {
    /// Computes one agent's reward for the step that was just evaluated.
    ///
    /// Expects the agent's metrics and collision state to be current.
    ///
    /// # Components
    ///
    /// 1. **Vehicle collision**: `reward_vehicle_collision`, or
    ///    **offroad**: `reward_offroad_collision`. Either marks
    ///    `collided_before_goal` if the goal has not been reached yet.
    /// 2. **Goal**: inside `goal_radius`, `reward_goal` on a fresh life or
    ///    `reward_goal_post_respawn` after a respawn. A fresh reach also
    ///    requests a new goal and counts toward `num_goals_reached`.
    /// 3. **Displacement shaping**: `reward_ade × ADE` when both are nonzero.
    pub fn apply(agent: &mut Entity, config: &DriveConfig, log: &mut Log) -> f32 {
        let mut reward = 0.0;

        match agent.collision_state {
            CollisionState::Vehicle => {
                reward += config.reward_vehicle_collision;
                log.episode_return += config.reward_vehicle_collision;
                log.collision_rate = 1.0;
                log.avg_collisions_per_agent += 1.0;
            }
            CollisionState::Offroad => {
                reward += config.reward_offroad_collision;
                log.episode_return += config.reward_offroad_collision;
                log.offroad_rate = 1.0;
                log.avg_offroad_per_agent += 1.0;
            }
            CollisionState::None => {}
        }
        if agent.collision_state.is_collision() && !agent.reached_goal_this_episode {
            agent.collided_before_goal = true;
        }

        if agent.distance_to_goal() < config.goal_radius {
            if agent.is_respawning() {
                reward += config.reward_goal_post_respawn;
                log.episode_return += config.reward_goal_post_respawn;
            } else {
                reward += config.reward_goal;
                log.episode_return += config.reward_goal;
                agent.sampled_new_goal = true;
                agent.num_goals_reached += 1;
                log.num_goals_reached += 1.0;
            }
            agent.reached_goal_this_episode = true;
            agent.metrics.reached_goal = 1.0;
        }

        log.lane_alignment_rate = agent.metrics.lane_aligned;

        let ade = agent.metrics.avg_displacement_error;
        if ade > 0.0 && config.reward_ade != 0.0 {
            let shaping = config.reward_ade * ade;
            reward += shaping;
            log.episode_return += shaping;
        }
        log.avg_displacement_error = ade;

        reward
    }
}
