use thiserror::Error;

use crate::world::types::{Coordinate, EntityKind, Id};

/// Errors that can arise while reading, mutating or persisting world entities.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("world database error: {0}")]
    Sled(#[from] sled::Error),

    /// A stored record could not be encoded or decoded.
    #[error("record encoding error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Creating the data directory failed.
    #[error("world storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// No record under that id, name or location.
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The record was written by an incompatible build.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// A stored record claims to be a different kind of entity than requested.
    #[error("record {id} is a {found:?}, expected {expected:?}")]
    KindMismatch {
        id: Id,
        expected: EntityKind,
        found: EntityKind,
    },

    /// An extra field holds a value of a different type than its key declares.
    #[error("field '{field}' holds {found}, expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// Another room already occupies the location inside the zone.
    #[error("location {location} in zone {zone} is already occupied")]
    LocationTaken { zone: Id, location: Coordinate },

    /// Character names are unique, ignoring case.
    #[error("character name already in use: {0}")]
    NameTaken(String),

    /// A container cannot pay out more cash than it holds.
    #[error("insufficient funds: have {available}, need {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    /// Index and record disagree.
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorldError {
    pub fn not_found(kind: EntityKind, key: impl ToString) -> Self {
        WorldError::NotFound {
            kind: kind.label(),
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WorldError::NotFound { .. })
    }
}
