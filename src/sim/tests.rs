//! Scenario tests for the driving simulation.

use super::*;
use crate::entity::{CollisionState, Entity, EntityType, Trajectory};
use crate::map::MapData;
use approx::assert_abs_diff_eq;
use std::f32::consts::PI;

/// Car recorded driving along +x at 10 m/s (1 unit per step) for `steps`.
fn cruising_car(start_x: f32, steps: usize, goal: (f32, f32)) -> Entity {
    let poses: Vec<_> = (0..steps)
        .map(|i| (start_x + i as f32, 0.0, 0.0, 10.0))
        .collect();
    Entity::agent(EntityType::Vehicle, Trajectory::from_poses(&poses), 4.0, 2.0, goal)
}

/// Car recorded standing still.
fn parked_car(x: f32, y: f32, heading: f32, goal: (f32, f32)) -> Entity {
    let poses = vec![(x, y, heading, 0.0); 10];
    Entity::agent(EntityType::Vehicle, Trajectory::from_poses(&poses), 4.0, 2.0, goal)
}

fn lane(points: &[(f32, f32)]) -> Entity {
    Entity::road(EntityType::RoadLane, points)
}

/// Lane along y = 0 with a point every 5 units.
fn straight_lane(from_x: f32, to_x: f32) -> Entity {
    let n = ((to_x - from_x) / 5.0) as usize;
    let points: Vec<_> = (0..=n).map(|i| (from_x + i as f32 * 5.0, 0.0)).collect();
    lane(&points)
}

fn edge(points: &[(f32, f32)]) -> Entity {
    Entity::road(EntityType::RoadEdge, points)
}

fn control_all() -> DriveConfig {
    DriveConfig {
        control_all_agents: true,
        deterministic_agent_selection: true,
        ..DriveConfig::default()
    }
}

fn noops(drive: &Drive) -> Vec<Action> {
    vec![Action::NOOP; drive.active_agent_count()]
}

#[cfg(test)]
mod construction {
    use super::*;

    #[test]
    fn invalid_config_is_rejected() {
        let config = DriveConfig {
            scenario_length: 0,
            ..DriveConfig::default()
        };
        let result = Drive::new(config, MapData::default(), 0);
        assert_eq!(
            result.unwrap_err(),
            DriveError::Config(ConfigError::ZeroScenarioLength)
        );
    }

    #[test]
    fn buffers_sized_for_roster() {
        let map = MapData::from_parts(
            vec![cruising_car(0.0, 10, (30.0, 0.0))],
            vec![straight_lane(-20.0, 100.0)],
        );
        let drive = Drive::new(DriveConfig::default(), map, 0).unwrap();
        assert_eq!(drive.active_agent_count(), 1);
        assert_eq!(drive.roster().mode, SelectionMode::Legacy);
        assert_eq!(drive.observations().len(), DriveConfig::observation_dim());
        assert_eq!(drive.rewards(), &[0.0]);
        assert_eq!(drive.terminals(), &[false]);
        assert_eq!(drive.timestep(), 0);
        assert!(drive.lane_graph().is_none());
        assert!(drive.observation(0).is_some());
        assert!(drive.observation(1).is_none());
    }

    #[test]
    fn lane_graph_only_with_goal_generation() {
        let map = MapData::from_parts(
            vec![cruising_car(0.0, 10, (30.0, 0.0))],
            vec![lane(&[(-20.0, 0.0), (0.0, 0.0)]), lane(&[(0.0, 0.0), (20.0, 0.0)])],
        );
        let config = DriveConfig {
            use_goal_generation: true,
            ..DriveConfig::default()
        };
        let drive = Drive::new(config, map, 0).unwrap();
        let graph = drive.lane_graph().unwrap();
        assert_eq!(graph.lane_count(), 2);
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn empty_map_runs() {
        let mut drive = Drive::new(DriveConfig::default(), MapData::default(), 0).unwrap();
        assert_eq!(drive.active_agent_count(), 0);
        assert!(drive.observations().is_empty());
        let status = drive.step(&[]).unwrap();
        assert!(!status.done);
        assert_eq!(status.timestep, 1);
    }

    #[test]
    fn decoded_map_drives() {
        let map = MapData::from_parts(
            vec![cruising_car(0.0, 10, (30.0, 0.0))],
            vec![straight_lane(-20.0, 100.0)],
        );
        let decoded = MapData::from_bytes(&map.to_bytes()).unwrap();
        let mut drive = Drive::new(DriveConfig::default(), decoded, 3).unwrap();
        assert_eq!(drive.active_agent_count(), 1);
        let actions = noops(&drive);
        assert!(drive.step(&actions).is_ok());
    }
}

#[cfg(test)]
mod stepping {
    use super::*;

    fn single_car() -> Drive {
        let map = MapData::from_parts(
            vec![cruising_car(0.0, 10, (80.0, 0.0))],
            vec![straight_lane(-20.0, 100.0)],
        );
        Drive::new(DriveConfig::default(), map, 0).unwrap()
    }

    #[test]
    fn noop_step_coasts_forward() {
        let mut drive = single_car();
        let idx = drive.roster().active[0];
        let actions = noops(&drive);
        let status = drive.step(&actions).unwrap();
        assert_eq!(status.timestep, 1);
        assert!(!status.done);
        assert_abs_diff_eq!(drive.entities()[idx].x, 1.0, epsilon = 1e-4);
        assert_eq!(drive.rewards(), &[0.0]);
        assert_eq!(drive.entities()[idx].metrics.lane_aligned, 1.0);
    }

    #[test]
    fn invalid_actions_leave_state_untouched() {
        let mut drive = single_car();
        let idx = drive.roster().active[0];

        assert_eq!(
            drive.step(&[]).unwrap_err(),
            DriveError::ActionCount {
                expected: 1,
                actual: 0
            }
        );
        assert_eq!(
            drive
                .step(&[Action::Discrete {
                    acceleration: 7,
                    steering: 0
                }])
                .unwrap_err(),
            DriveError::InvalidAction {
                index: 0,
                acceleration: 7,
                steering: 0
            }
        );
        assert_eq!(
            drive
                .step(&[Action::Continuous {
                    acceleration: 1.0,
                    steering: 0.0
                }])
                .unwrap_err(),
            DriveError::ActionTypeMismatch { index: 0 }
        );
        assert_eq!(drive.timestep(), 0);
        assert_eq!(drive.entities()[idx].x, 0.0);
    }

    #[test]
    fn continuous_actions_accepted_when_configured() {
        let map = MapData::from_parts(vec![cruising_car(0.0, 10, (80.0, 0.0))], vec![]);
        let config = DriveConfig {
            action_type: ActionType::Continuous,
            ..DriveConfig::default()
        };
        let mut drive = Drive::new(config, map, 0).unwrap();
        let idx = drive.roster().active[0];
        drive
            .step(&[Action::Continuous {
                acceleration: 4.0,
                steering: 0.0,
            }])
            .unwrap();
        assert_abs_diff_eq!(drive.entities()[idx].speed(), 10.2, epsilon = 1e-4);
    }

    #[test]
    fn episode_boundary_resets_and_logs() {
        let map = MapData::from_parts(
            vec![cruising_car(0.0, 10, (80.0, 0.0))],
            vec![straight_lane(-20.0, 100.0)],
        );
        let config = DriveConfig {
            scenario_length: 5,
            ..DriveConfig::default()
        };
        let mut drive = Drive::new(config, map, 0).unwrap();
        let idx = drive.roster().active[0];
        let actions = noops(&drive);

        for t in 1..5 {
            let status = drive.step(&actions).unwrap();
            assert_eq!(status.timestep, t);
            assert!(!status.done);
        }
        let status = drive.step(&actions).unwrap();
        assert!(status.done);
        assert_eq!(status.timestep, 0);
        assert_eq!(drive.terminals(), &[true]);
        assert_eq!(drive.entities()[idx].x, 0.0);

        let log = drive.take_log();
        assert_eq!(log.n, 1.0);
        assert_eq!(log.episode_length, 4.0);
        assert_eq!(log.dnf_rate, 1.0);
        assert_eq!(log.active_agent_count, 1.0);
        assert_eq!(drive.log().n, 0.0);

        drive.step(&actions).unwrap();
        assert_eq!(drive.terminals(), &[false]);
    }

    #[test]
    fn init_steps_offsets_start() {
        let map = MapData::from_parts(vec![cruising_car(0.0, 10, (80.0, 0.0))], vec![]);
        let config = DriveConfig {
            init_steps: 3,
            ..DriveConfig::default()
        };
        let drive = Drive::new(config, map, 0).unwrap();
        let idx = drive.roster().active[0];
        assert_eq!(drive.timestep(), 3);
        assert_eq!(drive.entities()[idx].x, 3.0);
        assert_abs_diff_eq!(drive.entities()[idx].vx, 10.0, epsilon = 1e-5);
    }
}

#[cfg(test)]
mod goals {
    use super::*;

    #[test]
    fn reaching_goal_respawns_agent() {
        let map = MapData::from_parts(vec![cruising_car(0.0, 10, (3.5, 0.0))], vec![]);
        let config = DriveConfig::default();
        let mut drive = Drive::new(config.clone(), map, 0).unwrap();
        let idx = drive.roster().active[0];
        let actions = noops(&drive);

        drive.step(&actions).unwrap();
        assert_eq!(drive.rewards(), &[0.0]);

        drive.step(&actions).unwrap();
        assert_abs_diff_eq!(drive.rewards()[0], config.reward_goal);
        let agent = &drive.entities()[idx];
        assert!(agent.reached_goal_this_episode);
        assert_eq!(agent.respawn_timestep, Some(2));
        assert_eq!(agent.respawn_count, 1);
        assert_eq!(agent.x, 0.0);
        assert_eq!(agent.metrics.reached_goal, 0.0);

        // Respawned: the ego flag is set and a second reach pays less.
        assert_eq!(drive.observation(0).unwrap()[6], 1.0);
        drive.step(&actions).unwrap();
        drive.step(&actions).unwrap();
        assert_abs_diff_eq!(drive.rewards()[0], config.reward_goal_post_respawn);
        assert_eq!(drive.entities()[idx].respawn_count, 2);
    }

    #[test]
    fn short_lane_respawn_lands_in_reaching_step() {
        let car = Entity::agent(
            EntityType::Vehicle,
            Trajectory::from_poses(&[(0.0, 0.0, 0.0, 10.0), (1.0, 0.0, 0.0, 10.0)]),
            4.0,
            2.0,
            (9.0, 0.0),
        );
        let map = MapData::from_parts(vec![car], vec![lane(&[(0.0, 0.0), (10.0, 0.0)])]);
        let config = DriveConfig {
            goal_radius: 2.0,
            ..DriveConfig::default()
        };
        let mut drive = Drive::new(config.clone(), map, 0).unwrap();
        let idx = drive.roster().active[0];
        let actions = noops(&drive);

        let mut reached_at = None;
        for _ in 0..12 {
            let status = drive.step(&actions).unwrap();
            if drive.rewards()[0] > 0.0 {
                reached_at = Some(status.timestep);
                break;
            }
            assert!(drive.entities()[idx].respawn_timestep.is_none());
        }
        let reached_at = reached_at.unwrap();
        assert!((7..=8).contains(&reached_at));
        assert_abs_diff_eq!(drive.rewards()[0], config.reward_goal);

        let agent = &drive.entities()[idx];
        assert_eq!((agent.x, agent.y), (0.0, 0.0));
        assert_eq!(agent.respawn_timestep, Some(reached_at));

        drive.step(&actions).unwrap();
        assert_abs_diff_eq!(drive.entities()[idx].x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn goal_generation_samples_along_lane() {
        let points: Vec<_> = (-1..=10).map(|i| (i as f32 * 10.0, 0.0)).collect();
        let map = MapData::from_parts(vec![cruising_car(0.0, 10, (3.5, 0.0))], vec![lane(&points)]);
        let config = DriveConfig {
            use_goal_generation: true,
            ..DriveConfig::default()
        };
        let mut drive = Drive::new(config.clone(), map, 0).unwrap();
        let idx = drive.roster().active[0];
        let actions = noops(&drive);

        drive.step(&actions).unwrap();
        drive.step(&actions).unwrap();
        assert_abs_diff_eq!(drive.rewards()[0], config.reward_goal);
        let agent = &drive.entities()[idx];
        assert!(agent.respawn_timestep.is_none());
        assert!(!agent.sampled_new_goal);
        assert_abs_diff_eq!(agent.x, 2.0, epsilon = 1e-4);
        // 40 units along the lane from the segment starting at x = 0.
        assert_eq!((agent.goal_position_x, agent.goal_position_y), (40.0, 0.0));

        drive.reset();
        let agent = &drive.entities()[idx];
        assert_eq!((agent.goal_position_x, agent.goal_position_y), (3.5, 0.0));
        assert!(!agent.reached_goal_this_episode);
    }

    #[test]
    fn goal_completion_is_scored() {
        let map = MapData::from_parts(vec![cruising_car(0.0, 10, (3.5, 0.0))], vec![]);
        let config = DriveConfig {
            scenario_length: 4,
            ..DriveConfig::default()
        };
        let mut drive = Drive::new(config, map, 0).unwrap();
        let actions = noops(&drive);
        for _ in 0..4 {
            drive.step(&actions).unwrap();
        }
        let log = drive.take_log().mean();
        assert_eq!(log.completion_rate, 1.0);
        assert_eq!(log.score, 1.0);
        assert_eq!(log.num_goals_reached, 1.0);
        assert_eq!(log.dnf_rate, 0.0);
    }
}

#[cfg(test)]
mod collisions {
    use super::*;

    #[test]
    fn overlapping_vehicles_collide() {
        let map = MapData::from_parts(
            vec![
                parked_car(0.0, 0.0, 0.0, (50.0, 0.0)),
                parked_car(3.0, 0.0, PI, (-50.0, 0.0)),
            ],
            vec![],
        );
        let mut drive = Drive::new(control_all(), map, 0).unwrap();
        assert_eq!(drive.roster().active, vec![0, 1]);
        assert_eq!(drive.collision_check(0), Some(1));
        assert_eq!(drive.entities()[0].collision_state, CollisionState::Vehicle);
        assert_eq!(drive.observation(0).unwrap()[5], 1.0);

        let actions = noops(&drive);
        drive.step(&actions).unwrap();
        let penalty = drive.config().reward_vehicle_collision;
        assert_eq!(drive.rewards(), &[penalty, penalty]);
        assert!(drive.entities()[0].collided_before_goal);
    }

    #[test]
    fn crossing_road_edge_is_offroad() {
        let map = MapData::from_parts(
            vec![parked_car(0.0, 0.0, 0.0, (50.0, 0.0))],
            vec![
                lane(&[(-20.0, 0.0), (20.0, 0.0)]),
                edge(&[(-20.0, 0.5), (20.0, 0.5)]),
            ],
        );
        let mut drive = Drive::new(DriveConfig::default(), map, 0).unwrap();
        let actions = noops(&drive);
        drive.step(&actions).unwrap();
        assert_eq!(drive.entities()[0].collision_state, CollisionState::Offroad);
        assert_abs_diff_eq!(drive.rewards()[0], drive.config().reward_offroad_collision);
    }

    #[test]
    fn compute_agent_metrics_on_demand() {
        let map = MapData::from_parts(
            vec![
                parked_car(0.0, 0.0, 0.0, (50.0, 0.0)),
                parked_car(30.0, 0.0, 0.0, (80.0, 0.0)),
            ],
            vec![],
        );
        let mut drive = Drive::new(control_all(), map, 0).unwrap();
        assert_eq!(drive.collision_check(0), None);
        drive.compute_agent_metrics(0);
        assert_eq!(drive.entities()[0].collision_state, CollisionState::None);
    }
}

#[cfg(test)]
mod pruning {
    use super::*;

    #[test]
    fn static_car_in_recorded_path_moves_off_map() {
        let map = MapData::from_parts(
            vec![
                parked_car(5.0, 0.0, 0.0, (5.5, 0.0)),
                parked_car(5.0, 20.0, 0.0, (5.5, 20.0)),
                cruising_car(0.0, 10, (30.0, 0.0)),
            ],
            vec![],
        );
        let drive = Drive::new(DriveConfig::default(), map, 0).unwrap();
        assert_eq!(drive.roster().active, vec![2]);
        assert_eq!(drive.roster().statics, vec![0, 1]);
        assert!(drive.entities()[0].is_off_map());
        assert!(!drive.entities()[1].is_off_map());
        assert_eq!(drive.collision_check(2), None);
    }
}

#[cfg(test)]
mod reselection {
    use super::*;

    #[test]
    fn reselection_restarts_episode() {
        let map = MapData::from_parts(vec![cruising_car(0.0, 10, (80.0, 0.0))], vec![]);
        let mut drive = Drive::new(DriveConfig::default(), map, 0).unwrap();
        let actions = noops(&drive);
        for _ in 0..3 {
            drive.step(&actions).unwrap();
        }
        drive.set_active_agents().unwrap();
        assert_eq!(drive.timestep(), 0);
        assert_eq!(drive.active_agent_count(), 1);
        assert_eq!(drive.entities()[0].x, 0.0);
    }

    #[test]
    fn growing_roster_exceeds_log_capacity() {
        // Pruning moves the parked car's first sample off-map, which makes it
        // eligible on the next selection.
        let map = MapData::from_parts(
            vec![
                parked_car(5.0, 0.0, 0.0, (5.5, 0.0)),
                cruising_car(0.0, 10, (30.0, 0.0)),
            ],
            vec![],
        );
        let mut drive = Drive::new(control_all(), map, 0).unwrap();
        assert_eq!(drive.roster().active, vec![1]);

        let result = drive.set_active_agents();
        assert_eq!(
            result.unwrap_err(),
            DriveError::LogCapacityExceeded {
                requested: 2,
                capacity: 1
            }
        );
        assert_eq!(drive.roster().active, vec![1]);
        assert_eq!(drive.rewards().len(), 1);
    }
}

#[cfg(test)]
mod observations {
    use super::*;

    #[test]
    fn rows_see_each_other() {
        let map = MapData::from_parts(
            vec![
                parked_car(0.0, 0.0, 0.0, (50.0, 0.0)),
                parked_car(10.0, 0.0, 0.0, (60.0, 0.0)),
            ],
            vec![],
        );
        let drive = Drive::new(control_all(), map, 0).unwrap();
        let first = drive.observation(0).unwrap();
        let second = drive.observation(1).unwrap();
        let slot = DriveConfig::EGO_FEATURE_DIM;
        assert_abs_diff_eq!(first[slot], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(second[slot], -0.2, epsilon = 1e-6);
        assert!(drive.observation(2).is_none());
    }

    #[test]
    fn goal_seeking_beats_standing_still() {
        let map = MapData::from_parts(
            vec![parked_car(0.0, 0.0, 0.0, (20.0, 0.0))],
            vec![lane(&[(-20.0, 0.0), (60.0, 0.0)])],
        );
        let mut drive = Drive::new(DriveConfig::default(), map, 0).unwrap();
        let mut noop = NoopPolicy::new(ActionType::Discrete);
        let idle = EvaluationMetrics::evaluate(&mut drive, &mut noop, 1).unwrap();
        let mut seeker = GoalSeekingPolicy::new(ActionType::Discrete);
        let driven = EvaluationMetrics::evaluate(&mut drive, &mut seeker, 1).unwrap();
        assert_eq!(idle.mean.completion_rate, 0.0);
        assert_eq!(driven.mean.completion_rate, 1.0);
    }
}
