//! Map data: the entity list a simulation is built from.

mod binary;
pub mod error;

pub use error::MapError;

use crate::entity::{Entity, INVALID_POSITION};

/// Entities of one scenario, objects first and road geometry after.
#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub entities: Vec<Entity>,
    /// Number of leading object records (vehicles, pedestrians, cyclists).
    pub num_objects: usize,
    pub num_roads: usize,
}

impl MapData {
    /// Assembles a map from separate object and road lists.
    pub fn from_parts(objects: Vec<Entity>, roads: Vec<Entity>) -> Self {
        let num_objects = objects.len();
        let num_roads = roads.len();
        let mut entities = objects;
        entities.extend(roads);
        Self {
            entities,
            num_objects,
            num_roads,
        }
    }

    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    /// Translates the map so the mean of its points sits at the origin.
    ///
    /// The mean runs over every valid agent trajectory point and every road
    /// point. Sentinel points are left in place; goals are shifted too.
    /// Returns the subtracted mean.
    pub fn center_on_world_mean(&mut self) -> (f32, f32) {
        let mut mean_x = 0.0f32;
        let mut mean_y = 0.0f32;
        let mut count = 0u64;

        for e in &self.entities {
            let t = &e.trajectory;
            let include_all = e.entity_type.is_road();
            if !include_all && !e.entity_type.is_agent() {
                continue;
            }
            for i in 0..t.len() {
                if !include_all && !t.is_valid(i) {
                    continue;
                }
                count += 1;
                mean_x += (t.x[i] - mean_x) / count as f32;
                mean_y += (t.y[i] - mean_y) / count as f32;
            }
        }

        for e in &mut self.entities {
            if !e.entity_type.is_agent() && !e.entity_type.is_road() {
                continue;
            }
            let t = &mut e.trajectory;
            for (x, y) in t.x.iter_mut().zip(t.y.iter_mut()) {
                if *x == INVALID_POSITION {
                    continue;
                }
                *x -= mean_x;
                *y -= mean_y;
            }
            e.goal_position_x -= mean_x;
            e.goal_position_y -= mean_y;
            e.init_goal_x -= mean_x;
            e.init_goal_y -= mean_y;
            if !e.is_off_map() {
                e.x -= mean_x;
                e.y -= mean_y;
            }
        }

        (mean_x, mean_y)
    }
}
