use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::world::container::{Container, Holdings};
use crate::world::entity::{Entity, EntityCell, FieldMap};
use crate::world::errors::WorldError;
use crate::world::types::{Coordinate, Direction, EntityKind, Exit, Id};

pub const DEFAULT_ROOM_TITLE: &str = "The Void";
pub const DEFAULT_ROOM_DESCRIPTION: &str = "You are floating in the blackness of space. \
Complete darkness surrounds you in all directions. There is no escape, there is no hope, just \
the emptiness. You are likely to be eaten by a grue.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomData {
    pub zone_id: Id,
    #[serde(default)]
    pub area_id: Option<Id>,
    pub title: String,
    pub description: String,
    pub location: Coordinate,
    #[serde(default)]
    pub exits: BTreeMap<Direction, Exit>,
    #[serde(default)]
    pub links: BTreeMap<String, Id>,
    #[serde(default)]
    pub holdings: Holdings,
}

/// A location in a zone. Every accessor holds the room's lock for its whole body.
#[derive(Debug)]
pub struct Room {
    cell: EntityCell<RoomData>,
}

impl Entity for Room {
    type Body = RoomData;
    const KIND: EntityKind = EntityKind::Room;

    fn cell(&self) -> &EntityCell<RoomData> {
        &self.cell
    }

    fn from_cell(cell: EntityCell<RoomData>) -> Self {
        Self { cell }
    }
}

impl Room {
    pub fn new(zone_id: Id, location: Coordinate) -> Self {
        let body = RoomData {
            zone_id,
            area_id: None,
            title: DEFAULT_ROOM_TITLE.to_string(),
            description: DEFAULT_ROOM_DESCRIPTION.to_string(),
            location,
            exits: BTreeMap::new(),
            links: BTreeMap::new(),
            holdings: Holdings::default(),
        };
        Self {
            cell: EntityCell::new(EntityKind::Room, body, FieldMap::new()),
        }
    }

    pub fn title(&self) -> String {
        self.cell.read_lock().title.clone()
    }

    pub fn set_title(&self, title: &str) {
        self.cell.write_lock().set(|r| &mut r.title, title.to_string());
    }

    pub fn description(&self) -> String {
        self.cell.read_lock().description.clone()
    }

    pub fn set_description(&self, description: &str) {
        self.cell
            .write_lock()
            .set(|r| &mut r.description, description.to_string());
    }

    pub fn location(&self) -> Coordinate {
        self.cell.read_lock().location
    }

    /// Moves the room inside its zone. Uniqueness of the location is checked when committing.
    pub fn set_location(&self, location: Coordinate) {
        self.cell.write_lock().set(|r| &mut r.location, location);
    }

    pub fn zone_id(&self) -> Id {
        self.cell.read_lock().zone_id
    }

    pub fn set_zone_id(&self, zone_id: Id) {
        self.cell.write_lock().set(|r| &mut r.zone_id, zone_id);
    }

    pub fn area_id(&self) -> Option<Id> {
        self.cell.read_lock().area_id
    }

    pub fn set_area_id(&self, area_id: Option<Id>) {
        self.cell.write_lock().set(|r| &mut r.area_id, area_id);
    }

    pub fn next_location(&self, direction: Direction) -> Coordinate {
        self.location().next(direction)
    }

    pub fn has_exit(&self, direction: Direction) -> bool {
        self.cell.read_lock().exits.contains_key(&direction)
    }

    /// Enabling always installs a fresh, unlocked exit; disabling removes the direction.
    pub fn set_exit_enabled(&self, direction: Direction, enabled: bool) {
        self.cell.write_lock().update(|r| {
            if enabled {
                r.exits.insert(direction, Exit::default()) != Some(Exit::default())
            } else {
                r.exits.remove(&direction).is_some()
            }
        });
    }

    /// Enabled exit directions in a stable order.
    pub fn exits(&self) -> Vec<Direction> {
        self.cell.read_lock().exits.keys().copied().collect()
    }

    /// No-op when there is no exit in that direction.
    pub fn set_locked(&self, direction: Direction, locked: bool) {
        self.cell.write_lock().update(|r| match r.exits.get_mut(&direction) {
            Some(exit) if exit.locked != locked => {
                exit.locked = locked;
                true
            }
            _ => false,
        });
    }

    pub fn is_locked(&self, direction: Direction) -> bool {
        self.cell
            .read_lock()
            .exits
            .get(&direction)
            .map(|exit| exit.locked)
            .unwrap_or(false)
    }

    pub fn set_link(&self, name: &str, room_id: Id) {
        self.cell
            .write_lock()
            .update(|r| r.links.insert(name.to_string(), room_id) != Some(room_id));
    }

    pub fn remove_link(&self, name: &str) {
        self.cell
            .write_lock()
            .update(|r| r.links.remove(name).is_some());
    }

    pub fn link(&self, name: &str) -> Option<Id> {
        self.cell.read_lock().links.get(name).copied()
    }

    pub fn links(&self) -> BTreeMap<String, Id> {
        self.cell.read_lock().links.clone()
    }

    pub fn link_names(&self) -> Vec<String> {
        self.cell.read_lock().links.keys().cloned().collect()
    }
}

impl Container for Room {
    fn cash(&self) -> Result<u64, WorldError> {
        Ok(self.cell.read_lock().holdings.cash)
    }

    fn set_cash(&self, cash: u64) -> Result<(), WorldError> {
        self.cell.write_lock().update(|r| r.holdings.set_cash(cash));
        Ok(())
    }

    fn add_cash(&self, amount: u64) -> Result<(), WorldError> {
        self.cell.write_lock().update(|r| r.holdings.deposit(amount));
        Ok(())
    }

    fn remove_cash(&self, amount: u64) -> Result<(), WorldError> {
        let mut guard = self.cell.write_lock();
        let mut outcome = Ok(());
        guard.update(|r| match r.holdings.withdraw(amount) {
            Ok(changed) => changed,
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    fn add_item(&self, id: Id) -> Result<(), WorldError> {
        self.cell.write_lock().update(|r| r.holdings.add_item(id));
        Ok(())
    }

    fn remove_item(&self, id: Id) -> Result<bool, WorldError> {
        Ok(self.cell.write_lock().update(|r| r.holdings.remove_item(id)))
    }

    fn item_ids(&self) -> Result<Vec<Id>, WorldError> {
        Ok(self.cell.read_lock().holdings.items.iter().copied().collect())
    }
}
