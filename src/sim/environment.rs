//! The driving simulation.
//!
//! Each step replays the expert vehicles, integrates the policy-controlled
//! agents, evaluates collisions and rewards, then encodes observations.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use super::config::{ActionType, DriveConfig};
use super::dynamics::{replay_expert, step_classic, Action, ACCELERATION_VALUES, STEERING_VALUES};
use super::error::DriveError;
use super::goal::{compute_new_goal, respawn};
use super::log::Log;
use super::metrics;
use super::observation::ObservationBuilder;
use super::reward::RewardComputer;
use super::selection::{select_agents, Roster};
use crate::entity::{CollisionState, Entity, INVALID_POSITION};
use crate::grid::GridMap;
use crate::map::MapData;
use crate::topology::LaneGraph;

/// Outcome of a single [`Drive::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStatus {
    /// Step counter after the call. Back at `init_steps` when `done`.
    pub timestep: usize,
    /// The episode hit `scenario_length`; logs were aggregated and the
    /// simulation reset.
    pub done: bool,
    /// Sum of this step's rewards over active agents.
    pub total_reward: f32,
}

/// Multi-agent driving simulation over one map.
///
/// Owns the map entities, the road index, the roster and the flat per-agent
/// buffers (observations, rewards, terminals) a training loop reads.
///
/// # Lifecycle
///
/// 1. Call [`Drive::new`] with a configuration, a decoded map and a seed.
/// 2. Call [`Drive::step`] with one [`Action`] per active agent; read
///    [`observations`](Drive::observations), [`rewards`](Drive::rewards) and
///    [`terminals`](Drive::terminals) after each call.
/// 3. Episodes end on their own after `scenario_length` steps; collect the
///    aggregate with [`Drive::take_log`].
#[derive(Debug)]
pub struct Drive {
    config: DriveConfig,
    entities: Vec<Entity>,
    num_objects: usize,
    num_roads: usize,
    grid: GridMap,
    /// Built only when goal generation is enabled.
    lane_graph: Option<LaneGraph>,
    roster: Roster,
    /// Active agent count fixed by the first selection.
    logs_capacity: usize,
    agent_logs: Vec<Log>,
    log: Log,
    observations: Vec<f32>,
    rewards: Vec<f32>,
    terminals: Vec<bool>,
    timestep: usize,
    rng: StdRng,
}

impl Drive {
    /// Builds a simulation ready to step.
    ///
    /// Indexes the road geometry, selects agents, prunes static cars that
    /// the recorded agent paths would run into, places every agent at its
    /// start state and computes the first observations.
    ///
    /// # Arguments
    ///
    /// * `config` - Simulation options
    /// * `map` - Decoded map, already centered if desired
    /// * `seed` - Seed for agent selection
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::Config`] if the configuration does not validate.
    pub fn new(config: DriveConfig, map: MapData, seed: u64) -> Result<Self, DriveError> {
        config.validate()?;
        let MapData {
            mut entities,
            num_objects,
            num_roads,
        } = map;

        let grid = GridMap::build(&entities);
        let lane_graph = if config.use_goal_generation {
            LaneGraph::build(&entities)
        } else {
            None
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let roster = select_agents(&mut entities, num_objects, &config, &mut rng);
        let logs_capacity = roster.active_count();

        let mut drive = Self {
            config,
            entities,
            num_objects,
            num_roads,
            grid,
            lane_graph,
            roster,
            logs_capacity,
            agent_logs: Vec::new(),
            log: Log::default(),
            observations: Vec::new(),
            rewards: Vec::new(),
            terminals: Vec::new(),
            timestep: 0,
            rng,
        };
        drive.remove_bad_trajectories();
        drive.set_start_position();
        drive.snapshot_goals();
        drive.allocate_buffers();
        drive.reset();

        info!(
            map = drive.config.map_label(),
            entities = drive.entities.len(),
            objects = drive.num_objects,
            roads = drive.num_roads,
            active = drive.roster.active.len(),
            statics = drive.roster.statics.len(),
            experts = drive.roster.experts.len(),
            "drive simulation ready"
        );
        Ok(drive)
    }

    /// Starts a new episode at `init_steps`.
    ///
    /// Every agent returns to its recorded start state; per-agent logs,
    /// respawn state and episode flags are cleared; goals are restored when
    /// goal generation is on. Metrics and observations are recomputed. The
    /// aggregate log is kept.
    pub fn reset(&mut self) {
        self.timestep = self.config.init_steps;
        self.set_start_position();

        for (slot, &idx) in self.roster.active.iter().enumerate() {
            self.agent_logs[slot] = Log::default();
            let agent = &mut self.entities[idx];
            agent.respawn_timestep = None;
            agent.respawn_count = 0;
            agent.collided_before_goal = false;
            agent.reached_goal_this_episode = false;
            agent.num_goals_reached = 0;
            agent.reset_all_metrics();
            if self.config.use_goal_generation {
                agent.goal_position_x = agent.init_goal_x;
                agent.goal_position_y = agent.init_goal_y;
                agent.sampled_new_goal = false;
            }
            metrics::compute_agent_metrics(
                &mut self.entities,
                &self.grid,
                &self.roster,
                idx,
                self.timestep,
            );
        }
        self.write_observations();
    }

    /// Advances the simulation by one step.
    ///
    /// On the step that reaches `scenario_length`, per-agent logs are folded
    /// into the aggregate, terminals are raised and the simulation resets
    /// instead of moving.
    ///
    /// # Arguments
    ///
    /// * `actions` - One action per active agent, in roster order
    ///
    /// # Errors
    ///
    /// Fails without touching any state when the action count is wrong, an
    /// action does not match the configured [`ActionType`], or a discrete
    /// index is out of range.
    pub fn step(&mut self, actions: &[Action]) -> Result<StepStatus, DriveError> {
        self.validate_actions(actions)?;

        self.rewards.fill(0.0);
        self.terminals.fill(false);
        self.timestep += 1;

        if self.timestep >= self.config.scenario_length {
            self.add_log();
            self.terminals.fill(true);
            self.reset();
            debug!(episodes = self.log.n, "episode finished");
            return Ok(StepStatus {
                timestep: self.timestep,
                done: true,
                total_reward: 0.0,
            });
        }

        // 1. Replay experts
        for &idx in &self.roster.experts {
            let expert = &mut self.entities[idx];
            if !expert.is_off_map() {
                replay_expert(expert, self.timestep);
            }
        }

        // 2. Integrate active agents
        for (slot, (&idx, action)) in self.roster.active.iter().zip(actions).enumerate() {
            let log = &mut self.agent_logs[slot];
            log.score = 0.0;
            log.episode_length += 1.0;

            let agent = &mut self.entities[idx];
            agent.collision_state = CollisionState::None;
            if agent.is_off_map() {
                continue;
            }
            if let Some((acceleration, steering)) = action.controls() {
                step_classic(agent, acceleration, steering);
            }
        }

        // 3. Metrics, rewards and goal resampling
        for (slot, &idx) in self.roster.active.iter().enumerate() {
            metrics::compute_agent_metrics(
                &mut self.entities,
                &self.grid,
                &self.roster,
                idx,
                self.timestep,
            );
            self.rewards[slot] = RewardComputer::apply(
                &mut self.entities[idx],
                &self.config,
                &mut self.agent_logs[slot],
            );
            if self.config.use_goal_generation && self.entities[idx].sampled_new_goal {
                compute_new_goal(&mut self.entities, self.lane_graph.as_ref(), idx);
            }
        }

        // 4. Respawn agents that reached their goal
        if !self.config.use_goal_generation {
            for &idx in &self.roster.active {
                let agent = &mut self.entities[idx];
                if agent.metrics.reached_goal > 0.0 {
                    respawn(agent, self.timestep);
                    debug!(agent = idx, respawns = agent.respawn_count, "agent respawned");
                }
            }
        }

        // 5. Observations
        self.write_observations();

        Ok(StepStatus {
            timestep: self.timestep,
            done: false,
            total_reward: self.rewards.iter().sum(),
        })
    }

    /// Re-runs agent selection and starts a new episode with the result.
    ///
    /// # Errors
    ///
    /// Returns [`DriveError::LogCapacityExceeded`] when the new selection
    /// has more active agents than the first one; the current roster is
    /// kept in that case.
    pub fn set_active_agents(&mut self) -> Result<(), DriveError> {
        let mut entities = self.entities.clone();
        let roster = select_agents(&mut entities, self.num_objects, &self.config, &mut self.rng);
        if roster.active_count() > self.logs_capacity {
            warn!(
                requested = roster.active_count(),
                capacity = self.logs_capacity,
                "selection exceeds log capacity"
            );
            return Err(DriveError::LogCapacityExceeded {
                requested: roster.active_count(),
                capacity: self.logs_capacity,
            });
        }

        self.entities = entities;
        self.roster = roster;
        self.allocate_buffers();
        self.reset();
        Ok(())
    }

    /// Recomputes metrics and collision state for one entity.
    pub fn compute_agent_metrics(&mut self, agent_idx: usize) {
        metrics::compute_agent_metrics(
            &mut self.entities,
            &self.grid,
            &self.roster,
            agent_idx,
            self.timestep,
        );
    }

    /// First collision candidate overlapping `agent_idx`, if any.
    pub fn collision_check(&self, agent_idx: usize) -> Option<usize> {
        metrics::collision_check(&self.entities, &self.roster, agent_idx)
    }

    /// All observations, one [`DriveConfig::observation_dim`] row per
    /// active agent.
    pub fn observations(&self) -> &[f32] {
        &self.observations
    }

    /// Observation row of the active agent in `slot`.
    pub fn observation(&self, slot: usize) -> Option<&[f32]> {
        self.observations
            .chunks_exact(DriveConfig::observation_dim())
            .nth(slot)
    }

    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    pub fn terminals(&self) -> &[bool] {
        &self.terminals
    }

    /// Aggregate over finished episodes, not yet averaged.
    pub fn log(&self) -> &Log {
        &self.log
    }

    /// Returns the aggregate log and starts a fresh one.
    pub fn take_log(&mut self) -> Log {
        std::mem::take(&mut self.log)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    pub fn lane_graph(&self) -> Option<&LaneGraph> {
        self.lane_graph.as_ref()
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    pub fn active_agent_count(&self) -> usize {
        self.roster.active_count()
    }

    fn validate_actions(&self, actions: &[Action]) -> Result<(), DriveError> {
        if actions.len() != self.roster.active_count() {
            return Err(DriveError::ActionCount {
                expected: self.roster.active_count(),
                actual: actions.len(),
            });
        }
        let discrete = self.config.action_type == ActionType::Discrete;
        for (index, action) in actions.iter().enumerate() {
            if action.is_discrete() != discrete {
                return Err(DriveError::ActionTypeMismatch { index });
            }
            if let Action::Discrete {
                acceleration,
                steering,
            } = *action
            {
                if acceleration >= ACCELERATION_VALUES.len() || steering >= STEERING_VALUES.len() {
                    return Err(DriveError::InvalidAction {
                        index,
                        acceleration,
                        steering,
                    });
                }
            }
        }
        Ok(())
    }

    /// Places every entity at trajectory step `init_steps`, clamped to its
    /// recording, and clears agent state.
    ///
    /// Active agents take their recorded velocity; everything else starts
    /// at rest.
    fn set_start_position(&mut self) {
        let init_steps = self.config.init_steps;
        for entity in &mut self.entities {
            let Some(last) = entity.trajectory.len().checked_sub(1) else {
                continue;
            };
            let step = init_steps.min(last);
            let traj = &entity.trajectory;
            entity.x = traj.x[step];
            entity.y = traj.y[step];
            entity.z = traj.z.get(step).copied().unwrap_or(0.0);

            if !entity.entity_type.is_agent() {
                continue;
            }
            if entity.active_agent {
                entity.vx = traj.vx.get(step).copied().unwrap_or(0.0);
                entity.vy = traj.vy.get(step).copied().unwrap_or(0.0);
                entity.vz = traj.vz.get(step).copied().unwrap_or(0.0);
            } else {
                entity.vx = 0.0;
                entity.vy = 0.0;
                entity.vz = 0.0;
                entity.collided_before_goal = false;
            }
            let heading = traj.heading.get(step).copied().unwrap_or(0.0);
            entity.valid = traj.is_valid(step);
            entity.set_heading(heading);
            entity.collision_state = CollisionState::None;
            entity.reset_all_metrics();
            entity.respawn_timestep = None;
            entity.respawn_count = 0;
        }
    }

    /// Replays the recorded paths of active agents and experts for a whole
    /// scenario and moves every static car an agent would first hit off the
    /// map.
    fn remove_bad_trajectories(&mut self) {
        self.set_start_position();
        let mut first_hits: Vec<Option<usize>> = vec![None; self.roster.active.len()];

        for t in 0..self.config.scenario_length {
            self.timestep = t;
            for &idx in &self.roster.active {
                replay_expert(&mut self.entities[idx], t);
            }
            for &idx in &self.roster.experts {
                let expert = &mut self.entities[idx];
                if !expert.is_off_map() {
                    replay_expert(expert, t);
                }
            }
            for (slot, &idx) in self.roster.active.iter().enumerate() {
                self.entities[idx].collision_state = CollisionState::None;
                if first_hits[slot].is_none() {
                    first_hits[slot] = metrics::collision_check(&self.entities, &self.roster, idx);
                }
            }
        }

        let mut pruned = 0usize;
        for hit in first_hits.into_iter().flatten() {
            if !self.roster.statics.contains(&hit) {
                continue;
            }
            let traj = &mut self.entities[hit].trajectory;
            if let (Some(x), Some(y)) = (traj.x.first_mut(), traj.y.first_mut()) {
                *x = INVALID_POSITION;
                *y = INVALID_POSITION;
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!(pruned, "static cars moved off-map");
        }
        self.timestep = 0;
    }

    /// Records the current goals as the ones restored on reset.
    fn snapshot_goals(&mut self) {
        for &idx in &self.roster.active {
            let agent = &mut self.entities[idx];
            agent.init_goal_x = agent.goal_position_x;
            agent.init_goal_y = agent.goal_position_y;
        }
    }

    fn allocate_buffers(&mut self) {
        let n = self.roster.active_count();
        self.agent_logs = vec![Log::default(); n];
        self.observations = vec![0.0; n * DriveConfig::observation_dim()];
        self.rewards = vec![0.0; n];
        self.terminals = vec![false; n];
    }

    fn add_log(&mut self) {
        for (agent_log, &idx) in self.agent_logs.iter().zip(&self.roster.active) {
            self.log
                .add_agent_episode(agent_log, &self.entities[idx], &self.roster);
        }
    }

    fn write_observations(&mut self) {
        ObservationBuilder::write_all(
            &mut self.observations,
            &self.entities,
            &self.roster,
            &self.grid,
        );
    }
}
