// Demonstration: evaluate a baseline policy on a map.
//
// Build/run from this repo root:
//   cargo run --example drive_demo -- --policy goal --episodes 20
//   cargo run --example drive_demo -- --policy random --seed 7
//
// Set RUST_LOG=drivesim=debug for per-episode traces.

use std::env;
use std::process::ExitCode;

use drivesim::sim::{GoalSeekingPolicy, NoopPolicy, RandomPolicy};
use drivesim::{
    ActionType, Drive, DriveConfig, Entity, EntityType, EvaluationMetrics, MapData, Policy,
    Trajectory,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let policy_name = arg_value(&args, "--policy").unwrap_or("goal");
    let episodes: usize = arg_value(&args, "--episodes")
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);

    let mut map = synthetic_map();
    map.center_on_world_mean();

    let config = DriveConfig {
        control_all_agents: true,
        map_name: Some("synthetic-highway".to_string()),
        ..DriveConfig::default()
    };
    let mut drive = match Drive::new(config, map, seed) {
        Ok(drive) => drive,
        Err(e) => {
            eprintln!("Failed to build simulation: {}", e);
            return ExitCode::from(1);
        }
    };

    let mut policy: Box<dyn Policy> = match policy_name {
        "goal" => Box::new(GoalSeekingPolicy::new(ActionType::Discrete)),
        "random" => Box::new(RandomPolicy::new(ActionType::Discrete, seed)),
        "noop" => Box::new(NoopPolicy::new(ActionType::Discrete)),
        other => {
            eprintln!(
                "Unknown --policy '{}'; expected 'goal', 'random' or 'noop'.",
                other
            );
            return ExitCode::from(2);
        }
    };

    match EvaluationMetrics::evaluate(&mut drive, policy.as_mut(), episodes) {
        Ok(metrics) => {
            println!("Policy: {}", policy.name());
            println!("Active agents: {}", drive.active_agent_count());
            println!("{}", metrics);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Evaluation failed: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Two parallel lanes bounded by road edges, with four cars heading east.
fn synthetic_map() -> MapData {
    let cars = [(0.0, 0.0, 8.0), (20.0, 0.0, 6.0), (5.0, 4.0, 10.0), (30.0, 4.0, 5.0)]
        .iter()
        .map(|&(x, y, speed): &(f32, f32, f32)| {
            let poses: Vec<_> = (0..91)
                .map(|t| (x + speed * 0.1 * t as f32, y, 0.0, speed))
                .collect();
            Entity::agent(
                EntityType::Vehicle,
                Trajectory::from_poses(&poses),
                4.5,
                1.8,
                (x + 60.0, y),
            )
        })
        .collect();

    let lane = |y: f32| {
        let points: Vec<_> = (0..=30).map(|i| (-20.0 + i as f32 * 5.0, y)).collect();
        Entity::road(EntityType::RoadLane, &points)
    };
    let edge = |y: f32| Entity::road(EntityType::RoadEdge, &[(-20.0, y), (130.0, y)]);
    MapData::from_parts(cars, vec![lane(0.0), lane(4.0), edge(-2.0), edge(6.0)])
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
