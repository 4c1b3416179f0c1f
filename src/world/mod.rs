//! World model: lock-protected entities, their containers and the sled-backed store.

pub mod character;
pub mod container;
pub mod entity;
pub mod errors;
pub mod map;
pub mod room;
pub mod store;
pub mod types;
pub mod zone;

pub use character::Character;
pub use container::{Container, Holdings};
pub use entity::{Entity, EntityCell, EntityRecord, FieldKey, FieldMap, FieldValue};
pub use errors::WorldError;
pub use map::render_map;
pub use room::Room;
pub use store::{MoveOutcome, StoreStats, WorldStore, WorldStoreBuilder, DEFAULT_ZONE_NAME};
pub use types::{Coordinate, Direction, EntityKind, Exit, Id};
pub use zone::Zone;
