use serde::{Deserialize, Serialize};

use crate::world::entity::{Entity, EntityCell, FieldMap};
use crate::world::types::EntityKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneData {
    pub name: String,
}

/// Grouping key for rooms; room locations are unique per zone.
pub struct Zone {
    cell: EntityCell<ZoneData>,
}

impl Entity for Zone {
    type Body = ZoneData;
    const KIND: EntityKind = EntityKind::Zone;

    fn cell(&self) -> &EntityCell<ZoneData> {
        &self.cell
    }

    fn from_cell(cell: EntityCell<ZoneData>) -> Self {
        Self { cell }
    }
}

impl Zone {
    pub fn new(name: &str) -> Self {
        let body = ZoneData {
            name: name.to_string(),
        };
        Self {
            cell: EntityCell::new(EntityKind::Zone, body, FieldMap::new()),
        }
    }

    pub fn name(&self) -> String {
        self.cell.read_lock().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.cell.write_lock().set(|z| &mut z.name, name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renaming_to_same_name_is_clean() {
        let zone = Zone::new("Default");
        zone.cell().take_commit_snapshot();
        zone.set_name("Default");
        assert!(!zone.is_dirty());
        zone.set_name("Wilds");
        assert!(zone.is_dirty());
        assert_eq!(zone.name(), "Wilds");
    }
}
