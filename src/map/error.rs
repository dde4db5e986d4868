use thiserror::Error;

/// Errors that can occur while decoding a map stream.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("I/O error while reading map: {0}")]
    Io(#[from] std::io::Error),

    #[error("Negative {field} in map header: {value}")]
    NegativeCount { field: &'static str, value: i32 },

    #[error("Record {record} has unknown entity type code {code}")]
    UnknownEntityType { record: usize, code: i32 },

    #[error("Record {record} has invalid trajectory length {len}")]
    InvalidTrajectoryLength { record: usize, len: i32 },
}
