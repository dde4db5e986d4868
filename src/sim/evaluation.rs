//! Policy evaluation over full episodes.

use std::fmt;

use super::environment::Drive;
use super::error::DriveError;
use super::log::Log;
use super::policy::Policy;

/// Aggregated evaluation metrics over multiple episodes.
#[derive(Debug, Clone)]
pub struct EvaluationMetrics {
    /// Per agent-episode means of the aggregate log.
    pub mean: Log,
    /// Mean summed reward per episode, over all active agents.
    pub mean_episode_reward: f32,
    /// Number of episodes evaluated.
    pub n_episodes: usize,
}

impl EvaluationMetrics {
    /// Evaluates a policy over multiple episodes and returns aggregated
    /// metrics.
    ///
    /// Starts from a fresh episode; any aggregate log already held by
    /// `drive` is discarded.
    ///
    /// # Arguments
    ///
    /// * `drive` - The simulation to evaluate in
    /// * `policy` - The policy to evaluate
    /// * `n_episodes` - Number of episodes to run
    ///
    /// # Errors
    ///
    /// Propagates [`DriveError`] if the policy produces invalid actions.
    pub fn evaluate(
        drive: &mut Drive,
        policy: &mut dyn Policy,
        n_episodes: usize,
    ) -> Result<Self, DriveError> {
        drive.reset();
        drive.take_log();

        let mut total_reward = 0.0f32;
        for _ in 0..n_episodes {
            loop {
                let actions = policy.select_actions(drive.observations());
                let status = drive.step(&actions)?;
                total_reward += status.total_reward;
                if status.done {
                    break;
                }
            }
        }

        let mean_episode_reward = if n_episodes > 0 {
            total_reward / n_episodes as f32
        } else {
            0.0
        };
        Ok(Self {
            mean: drive.take_log().mean(),
            mean_episode_reward,
            n_episodes,
        })
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Evaluation Metrics ({} episodes) ===",
            self.n_episodes
        )?;
        writeln!(
            f,
            "  Mean episode reward:     {:.3}",
            self.mean_episode_reward
        )?;
        write!(f, "{}", self.mean)
    }
}
