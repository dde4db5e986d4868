//! Partitioning map objects into policy agents, replayed experts and statics.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::config::{DriveConfig, MAX_AGENTS};
use crate::entity::{Entity, EntityType, MIN_DISTANCE_TO_GOAL};

/// Footprint scale applied by the legacy selection.
pub const LEGACY_FOOTPRINT_SCALE: f32 = 0.7;

/// Which selection path produced a roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    ControlAll,
    PolicyAgents,
    /// Requested policy agents were unattainable; one valid vehicle is driven.
    SingleFallback,
    #[default]
    Legacy,
}

/// Role assignment for one episode setup.
///
/// `active` and `statics` are disjoint. `experts` is a subset of `statics`
/// whose members are replayed from their recordings every step; the other
/// statics stay parked at their start pose.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub mode: SelectionMode,
    pub active: Vec<usize>,
    pub statics: Vec<usize>,
    pub experts: Vec<usize>,
    /// Controllable objects considered by the legacy scan.
    pub num_controllable: usize,
}

impl Roster {
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Entities checked for vehicle collisions and encoded as partners:
    /// active agents then statics, at most [`MAX_AGENTS`].
    pub fn collision_candidates(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .chain(&self.statics)
            .copied()
            .take(MAX_AGENTS)
    }

    /// Position of `entity_idx` in the active list.
    pub fn active_slot(&self, entity_idx: usize) -> Option<usize> {
        self.active.iter().position(|&i| i == entity_idx)
    }
}

#[derive(Debug, Default)]
struct Buckets {
    candidates: Vec<usize>,
    forced_experts: Vec<usize>,
    statics: Vec<usize>,
}

fn push_capped(list: &mut Vec<usize>, idx: usize) {
    if list.len() < MAX_AGENTS {
        list.push(idx);
    }
}

fn is_controllable(entity: &Entity, config: &DriveConfig) -> bool {
    entity.entity_type == EntityType::Vehicle
        || (config.control_non_vehicles && entity.entity_type.is_agent())
}

/// Buckets controllable objects by eligibility.
///
/// With `separate_experts`, eligible objects flagged as experts are kept
/// apart from the candidates.
fn scan(entities: &[Entity], num_objects: usize, config: &DriveConfig, separate_experts: bool) -> Buckets {
    let mut b = Buckets::default();
    for (i, e) in entities.iter().enumerate().take(num_objects) {
        if !is_controllable(e, config) {
            continue;
        }
        if !e.eligible_at_start() {
            push_capped(&mut b.statics, i);
        } else if separate_experts && e.mark_as_expert {
            push_capped(&mut b.forced_experts, i);
        } else {
            push_capped(&mut b.candidates, i);
        }
    }
    b
}

/// Chooses the roster for a map and flags the chosen entities.
///
/// Modes, in priority order:
/// 1. `control_all_agents`: every eligible object up to capacity; the
///    overflow is replayed as experts.
/// 2. `policy_agents_per_env > 0`: that many eligible objects; the rest of
///    the pool and flagged experts are replayed. Falls back to one valid
///    vehicle when no candidate exists.
/// 3. Legacy: the last object first, then every other valid object, with
///    footprints scaled by [`LEGACY_FOOTPRINT_SCALE`].
///
/// Candidate order is shuffled with `rng` unless
/// `deterministic_agent_selection` is set.
///
/// # Arguments
///
/// * `entities` - Full entity list; `active_agent`, `mark_as_expert` and (legacy) footprints are updated
/// * `num_objects` - Number of leading object records
/// * `config` - Selection options
/// * `rng` - The simulation's generator
pub fn select_agents(
    entities: &mut [Entity],
    num_objects: usize,
    config: &DriveConfig,
    rng: &mut StdRng,
) -> Roster {
    let num_objects = num_objects.min(entities.len());
    let capacity = config.max_agents.min(MAX_AGENTS);
    for e in entities.iter_mut() {
        e.active_agent = false;
    }

    let roster = if config.control_all_agents {
        select_control_all(entities, num_objects, config, capacity, rng)
    } else if config.policy_agents_per_env > 0 {
        select_policy_agents(entities, num_objects, config, capacity, rng)
    } else {
        None
    };
    let roster = roster.unwrap_or_else(|| select_legacy(entities, num_objects, config, capacity));

    for &i in &roster.active {
        entities[i].active_agent = true;
    }
    for &i in &roster.experts {
        entities[i].mark_as_expert = true;
    }

    debug!(
        mode = ?roster.mode,
        active = roster.active.len(),
        statics = roster.statics.len(),
        experts = roster.experts.len(),
        "agents selected"
    );
    roster
}

fn select_control_all(
    entities: &[Entity],
    num_objects: usize,
    config: &DriveConfig,
    capacity: usize,
    rng: &mut StdRng,
) -> Option<Roster> {
    let mut b = scan(entities, num_objects, config, false);
    let desired = b.candidates.len().min(capacity);
    if desired == 0 {
        return None;
    }
    if !config.deterministic_agent_selection {
        b.candidates.shuffle(rng);
    }

    let mut roster = Roster {
        mode: SelectionMode::ControlAll,
        active: b.candidates[..desired].to_vec(),
        ..Roster::default()
    };
    for &i in &b.statics {
        push_capped(&mut roster.statics, i);
    }
    for &i in &b.candidates[desired..] {
        if roster.statics.len() < MAX_AGENTS {
            roster.statics.push(i);
            roster.experts.push(i);
        }
    }
    roster.num_controllable = roster.active.len() + roster.statics.len();
    Some(roster)
}

fn select_policy_agents(
    entities: &[Entity],
    num_objects: usize,
    config: &DriveConfig,
    capacity: usize,
    rng: &mut StdRng,
) -> Option<Roster> {
    let mut b = scan(entities, num_objects, config, true);
    let desired = config
        .policy_agents_per_env
        .min(MAX_AGENTS)
        .min(b.candidates.len())
        .min(capacity);
    if !config.deterministic_agent_selection {
        b.candidates.shuffle(rng);
    }

    if desired == 0 {
        return select_single_fallback(entities, num_objects, config);
    }

    let mut roster = Roster {
        mode: SelectionMode::PolicyAgents,
        active: b.candidates[..desired].to_vec(),
        ..Roster::default()
    };
    for &i in b.candidates[desired..].iter().chain(&b.forced_experts) {
        push_capped(&mut roster.experts, i);
        push_capped(&mut roster.statics, i);
    }
    for &i in &b.statics {
        push_capped(&mut roster.statics, i);
    }
    roster.num_controllable = roster.active.len() + roster.statics.len();
    Some(roster)
}

fn select_single_fallback(
    entities: &[Entity],
    num_objects: usize,
    config: &DriveConfig,
) -> Option<Roster> {
    let objects = &entities[..num_objects];
    let vehicles = || {
        objects
            .iter()
            .enumerate()
            .filter(|(_, e)| e.entity_type == EntityType::Vehicle)
    };
    let picked = vehicles()
        .find(|(_, e)| e.trajectory.is_valid(config.init_steps))
        .or_else(|| vehicles().next())
        .map(|(i, _)| i)?;

    let mut roster = Roster {
        mode: SelectionMode::SingleFallback,
        active: vec![picked],
        ..Roster::default()
    };
    for (i, _) in vehicles().filter(|&(i, _)| i != picked) {
        push_capped(&mut roster.statics, i);
        push_capped(&mut roster.experts, i);
    }
    roster.num_controllable = roster.active.len() + roster.statics.len();
    Some(roster)
}

/// Legacy scan. Objects are considered by their validity at `init_steps`,
/// not at t=0 as in the other modes.
fn select_legacy(
    entities: &mut [Entity],
    num_objects: usize,
    config: &DriveConfig,
    capacity: usize,
) -> Roster {
    let mut roster = Roster::default();
    let Some(first) = num_objects.checked_sub(1) else {
        return roster;
    };

    let considered = |e: &Entity| is_controllable(e, config) && e.trajectory.is_valid(config.init_steps);
    let shrink = |e: &mut Entity| {
        e.width *= LEGACY_FOOTPRINT_SCALE;
        e.length *= LEGACY_FOOTPRINT_SCALE;
    };

    if considered(&entities[first]) {
        shrink(&mut entities[first]);
        let e = &entities[first];
        if !e.mark_as_expert && e.ego_goal_distance_t0() >= MIN_DISTANCE_TO_GOAL {
            roster.active.push(first);
        }
    }
    roster.num_controllable = roster.active.len();

    for i in 0..first {
        if roster.num_controllable >= MAX_AGENTS {
            break;
        }
        if !considered(&entities[i]) {
            continue;
        }
        roster.num_controllable += 1;
        shrink(&mut entities[i]);

        let e = &entities[i];
        let far_enough = e.ego_goal_distance_t0() >= MIN_DISTANCE_TO_GOAL;
        if far_enough && !e.mark_as_expert && roster.active.len() < capacity {
            roster.active.push(i);
            continue;
        }
        roster.statics.push(i);
        if e.mark_as_expert || (far_enough && roster.active.len() == capacity) {
            roster.experts.push(i);
        }
    }
    roster
}
