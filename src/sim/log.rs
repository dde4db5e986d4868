//! Episode statistics.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::selection::Roster;
use crate::entity::Entity;

/// Episode statistics.
///
/// Used twice: one accumulator per active agent filled during the episode,
/// and an aggregate that sums the per-agent logs at each episode boundary.
/// The aggregate's fields are totals over `n` agent-episodes until
/// [`Log::mean`] is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Log {
    pub episode_return: f32,
    pub episode_length: f32,
    /// Goal reached without colliding first.
    pub score: f32,
    pub offroad_rate: f32,
    pub collision_rate: f32,
    pub num_goals_reached: f32,
    pub completion_rate: f32,
    /// Neither collided, went offroad nor reached the goal.
    pub dnf_rate: f32,
    pub lane_alignment_rate: f32,
    pub avg_displacement_error: f32,
    pub avg_offroad_per_agent: f32,
    pub avg_collisions_per_agent: f32,
    pub active_agent_count: f32,
    pub expert_static_car_count: f32,
    pub static_car_count: f32,
    /// Agent-episodes folded into this log.
    pub n: f32,
}

impl Log {
    /// Folds one agent's episode into the aggregate.
    ///
    /// # Arguments
    ///
    /// * `agent_log` - The agent's per-episode accumulator
    /// * `agent` - The agent entity, for its episode flags
    /// * `roster` - Current roster, for the composition counts
    pub fn add_agent_episode(&mut self, agent_log: &Log, agent: &Entity, roster: &Roster) {
        let offroad = agent_log.offroad_rate > 0.0;
        let collided = agent_log.collision_rate > 0.0;
        let reached = agent.reached_goal_this_episode;

        if reached {
            self.completion_rate += 1.0;
        }
        if reached && !agent.collided_before_goal {
            self.score += 1.0;
        }
        if !offroad && !collided && !reached {
            self.dnf_rate += 1.0;
        }
        self.offroad_rate += f32::from(u8::from(offroad));
        self.collision_rate += f32::from(u8::from(collided));
        self.avg_offroad_per_agent += agent_log.avg_offroad_per_agent;
        self.avg_collisions_per_agent += agent_log.avg_collisions_per_agent;
        self.num_goals_reached += agent_log.num_goals_reached;
        self.lane_alignment_rate += agent_log.lane_alignment_rate.trunc();
        self.avg_displacement_error += agent_log.avg_displacement_error;
        self.episode_length += agent_log.episode_length;
        self.episode_return += agent_log.episode_return;

        self.active_agent_count += roster.active.len() as f32;
        self.expert_static_car_count += roster.experts.len() as f32;
        self.static_car_count += roster.statics.len() as f32;
        self.n += 1.0;
    }

    /// Sums another aggregate into this one.
    pub fn merge(&mut self, other: &Log) {
        self.episode_return += other.episode_return;
        self.episode_length += other.episode_length;
        self.score += other.score;
        self.offroad_rate += other.offroad_rate;
        self.collision_rate += other.collision_rate;
        self.num_goals_reached += other.num_goals_reached;
        self.completion_rate += other.completion_rate;
        self.dnf_rate += other.dnf_rate;
        self.lane_alignment_rate += other.lane_alignment_rate;
        self.avg_displacement_error += other.avg_displacement_error;
        self.avg_offroad_per_agent += other.avg_offroad_per_agent;
        self.avg_collisions_per_agent += other.avg_collisions_per_agent;
        self.active_agent_count += other.active_agent_count;
        self.expert_static_car_count += other.expert_static_car_count;
        self.static_car_count += other.static_car_count;
        self.n += other.n;
    }

    /// Per agent-episode means. `n` is kept as the sample count.
    ///
    /// An empty log stays empty.
    pub fn mean(&self) -> Log {
        if self.n <= 0.0 {
            return Log::default();
        }
        let n = self.n;
        Log {
            episode_return: self.episode_return / n,
            episode_length: self.episode_length / n,
            score: self.score / n,
            offroad_rate: self.offroad_rate / n,
            collision_rate: self.collision_rate / n,
            num_goals_reached: self.num_goals_reached / n,
            completion_rate: self.completion_rate / n,
            dnf_rate: self.dnf_rate / n,
            lane_alignment_rate: self.lane_alignment_rate / n,
            avg_displacement_error: self.avg_displacement_error / n,
            avg_offroad_per_agent: self.avg_offroad_per_agent / n,
            avg_collisions_per_agent: self.avg_collisions_per_agent / n,
            active_agent_count: self.active_agent_count / n,
            expert_static_car_count: self.expert_static_car_count / n,
            static_car_count: self.static_car_count / n,
            n,
        }
    }
}

impl fmt::Display for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Episode return:          {:.3}", self.episode_return)?;
        writeln!(f, "  Episode length:          {:.1}", self.episode_length)?;
        writeln!(f, "  Score:                   {:.3}", self.score)?;
        writeln!(f, "  Completion rate:         {:.3}", self.completion_rate)?;
        writeln!(f, "  Collision rate:          {:.3}", self.collision_rate)?;
        writeln!(f, "  Offroad rate:            {:.3}", self.offroad_rate)?;
        writeln!(f, "  DNF rate:                {:.3}", self.dnf_rate)?;
        writeln!(f, "  Goals reached:           {:.2}", self.num_goals_reached)?;
        writeln!(f, "  Lane alignment:          {:.3}", self.lane_alignment_rate)?;
        writeln!(f, "  Avg displacement error:  {:.3}", self.avg_displacement_error)?;
        writeln!(
            f,
            "  Agents (active/expert/static): {:.1}/{:.1}/{:.1}",
            self.active_agent_count, self.expert_static_car_count, self.static_car_count
        )?;
        write!(f, "  Samples:                 {}", self.n)
    }
}
