//! Little-endian map stream decoder.
//!
//! Layout:
//! ```text
//! i32 num_objects, i32 num_roads
//! repeated (num_objects + num_roads) times:
//!   i32 type, i32 array_size
//!   f32 x[n], f32 y[n], f32 z[n]
//!   agents only: f32 vx[n], f32 vy[n], f32 vz[n], f32 heading[n], i32 valid[n]
//!   f32 width, length, height, goal_x, goal_y, goal_z
//!   i32 mark_as_expert
//! ```

use std::io::Read;

use tracing::info;

use super::error::MapError;
use super::MapData;
use crate::entity::{Entity, EntityType, Trajectory};

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, MapError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32, MapError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_f32_vec<R: Read>(reader: &mut R, n: usize) -> Result<Vec<f32>, MapError> {
    (0..n).map(|_| read_f32(reader)).collect()
}

fn read_count<R: Read>(reader: &mut R, field: &'static str) -> Result<usize, MapError> {
    let value = read_i32(reader)?;
    usize::try_from(value).map_err(|_| MapError::NegativeCount { field, value })
}

fn read_entity<R: Read>(reader: &mut R, record: usize) -> Result<Entity, MapError> {
    let code = read_i32(reader)?;
    let entity_type =
        EntityType::from_code(code).ok_or(MapError::UnknownEntityType { record, code })?;
    let len = read_i32(reader)?;
    let n = match usize::try_from(len) {
        Ok(n) if n > 0 => n,
        _ => return Err(MapError::InvalidTrajectoryLength { record, len }),
    };

    let mut trajectory = Trajectory {
        x: read_f32_vec(reader, n)?,
        y: read_f32_vec(reader, n)?,
        z: read_f32_vec(reader, n)?,
        ..Trajectory::default()
    };
    if entity_type.is_agent() {
        trajectory.vx = read_f32_vec(reader, n)?;
        trajectory.vy = read_f32_vec(reader, n)?;
        trajectory.vz = read_f32_vec(reader, n)?;
        trajectory.heading = read_f32_vec(reader, n)?;
        trajectory.valid = (0..n)
            .map(|_| read_i32(reader).map(|v| v == 1))
            .collect::<Result<_, _>>()?;
    }

    let mut entity = Entity::new(entity_type, trajectory);
    entity.width = read_f32(reader)?;
    entity.length = read_f32(reader)?;
    entity.height = read_f32(reader)?;
    entity.goal_position_x = read_f32(reader)?;
    entity.goal_position_y = read_f32(reader)?;
    entity.goal_position_z = read_f32(reader)?;
    entity.init_goal_x = entity.goal_position_x;
    entity.init_goal_y = entity.goal_position_y;
    entity.mark_as_expert = read_i32(reader)? == 1;
    Ok(entity)
}

impl MapData {
    /// Decodes a map from any byte stream.
    ///
    /// # Errors
    ///
    /// - `Io` if the stream ends early or fails
    /// - `NegativeCount` if a header count is negative
    /// - `UnknownEntityType` / `InvalidTrajectoryLength` for malformed records
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, MapError> {
        let num_objects = read_count(&mut reader, "num_objects")?;
        let num_roads = read_count(&mut reader, "num_roads")?;

        let entities = (0..num_objects + num_roads)
            .map(|record| read_entity(&mut reader, record))
            .collect::<Result<Vec<_>, _>>()?;

        info!(num_objects, num_roads, "map decoded");
        Ok(Self {
            entities,
            num_objects,
            num_roads,
        })
    }

    /// Decodes a map held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MapError> {
        Self::from_reader(bytes)
    }

    /// Encodes the map in the same layout [`from_reader`](Self::from_reader) reads.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let push_i32 = |out: &mut Vec<u8>, v: i32| out.extend_from_slice(&v.to_le_bytes());
        let push_f32s = |out: &mut Vec<u8>, vs: &[f32]| {
            for v in vs {
                out.extend_from_slice(&v.to_le_bytes());
            }
        };

        push_i32(&mut out, self.num_objects as i32);
        push_i32(&mut out, self.num_roads as i32);
        for e in &self.entities {
            let t = &e.trajectory;
            push_i32(&mut out, e.entity_type.code());
            push_i32(&mut out, t.len() as i32);
            push_f32s(&mut out, &t.x);
            push_f32s(&mut out, &t.y);
            push_f32s(&mut out, &t.z);
            if e.entity_type.is_agent() {
                push_f32s(&mut out, &t.vx);
                push_f32s(&mut out, &t.vy);
                push_f32s(&mut out, &t.vz);
                push_f32s(&mut out, &t.heading);
                for &v in &t.valid {
                    push_i32(&mut out, i32::from(v));
                }
            }
            push_f32s(
                &mut out,
                &[
                    e.width,
                    e.length,
                    e.height,
                    e.goal_position_x,
                    e.goal_position_y,
                    e.goal_position_z,
                ],
            );
            push_i32(&mut out, i32::from(e.mark_as_expert));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MapData {
        let car = Entity::agent(
            EntityType::Vehicle,
            Trajectory::from_poses(&[(1.0, 2.0, 0.5, 3.0), (1.3, 2.1, 0.5, 3.0)]),
            4.5,
            2.0,
            (20.0, 5.0),
        );
        let lane = Entity::road(EntityType::RoadLane, &[(0.0, 0.0), (10.0, 0.0)]);
        MapData::from_parts(vec![car], vec![lane])
    }

    #[test]
    fn decodes_written_map() {
        let map = sample();
        let decoded = MapData::from_bytes(&map.to_bytes()).unwrap();
        assert_eq!(decoded.num_objects, 1);
        assert_eq!(decoded.num_roads, 1);

        let car = &decoded.entities[0];
        assert_eq!(car.entity_type, EntityType::Vehicle);
        assert_eq!(car.trajectory.len(), 2);
        assert_eq!(car.trajectory.valid, vec![true, true]);
        assert_eq!(car.length, 4.5);
        assert_eq!((car.goal_position_x, car.goal_position_y), (20.0, 5.0));
        assert_eq!((car.init_goal_x, car.init_goal_y), (20.0, 5.0));

        let lane = &decoded.entities[1];
        assert_eq!(lane.entity_type, EntityType::RoadLane);
        assert!(lane.trajectory.heading.is_empty());
        assert_eq!(lane.trajectory.x, vec![0.0, 10.0]);
    }

    #[test]
    fn truncated_stream_is_io_error() {
        let bytes = sample().to_bytes();
        let err = MapData::from_bytes(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, MapError::Io(_)));
    }

    #[test]
    fn negative_header_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let err = MapData::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            MapError::NegativeCount {
                field: "num_objects",
                value: -1
            }
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&42i32.to_le_bytes());
        let err = MapData::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            MapError::UnknownEntityType { record: 0, code: 42 }
        ));
    }

    #[test]
    fn empty_trajectory_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let err = MapData::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            MapError::InvalidTrajectoryLength { record: 0, len: 0 }
        ));
    }
}
