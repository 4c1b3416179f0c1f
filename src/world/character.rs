use serde::{Deserialize, Serialize};

use crate::world::container::Container;
use crate::world::entity::{Entity, EntityCell, FieldKey, FieldMap};
use crate::world::errors::WorldError;
use crate::world::types::{EntityKind, Id};

const ROOM_ID: FieldKey<Id> = FieldKey::new("roomid");
const USER_ID: FieldKey<Option<Id>> = FieldKey::new("userid");
const CASH: FieldKey<u64> = FieldKey::new("cash");
const INVENTORY: FieldKey<Vec<Id>> = FieldKey::new("inventory");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterData {
    pub name: String,
    /// Process-local presence flag.
    #[serde(skip)]
    pub online: bool,
}

/// A player or non-player character. Less common attributes live in typed extra fields.
#[derive(Debug)]
pub struct Character {
    cell: EntityCell<CharacterData>,
}

impl Entity for Character {
    type Body = CharacterData;
    const KIND: EntityKind = EntityKind::Character;

    fn cell(&self) -> &EntityCell<CharacterData> {
        &self.cell
    }

    fn from_cell(cell: EntityCell<CharacterData>) -> Self {
        Self { cell }
    }
}

impl Character {
    /// A character owned by `user_id`, or an NPC when `user_id` is `None`. Starts offline, with
    /// no cash and an empty inventory.
    pub fn new(name: &str, user_id: Option<Id>, room_id: Id) -> Result<Self, WorldError> {
        let mut fields = FieldMap::new();
        fields.set(ROOM_ID, room_id)?;
        fields.set(USER_ID, user_id)?;
        fields.set(CASH, 0)?;
        let body = CharacterData {
            name: name.to_string(),
            online: false,
        };
        Ok(Self {
            cell: EntityCell::new(EntityKind::Character, body, fields),
        })
    }

    pub fn new_npc(name: &str, room_id: Id) -> Result<Self, WorldError> {
        Self::new(name, None, room_id)
    }

    pub fn name(&self) -> String {
        self.cell.read_lock().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.cell.write_lock().set(|c| &mut c.name, name.to_string());
    }

    pub fn is_online(&self) -> bool {
        self.cell.read_lock().online
    }

    pub fn set_online(&self, online: bool) {
        self.cell.write_lock().set_transient(|c| &mut c.online, online);
    }

    /// Atomically flip offline → online. Returns false when the character was already online.
    pub fn try_set_online(&self) -> bool {
        let mut guard = self.cell.write_lock();
        if guard.online {
            return false;
        }
        guard.set_transient(|c| &mut c.online, true);
        true
    }

    pub fn room_id(&self) -> Result<Id, WorldError> {
        self.cell
            .read_lock()
            .field(ROOM_ID)?
            .ok_or(WorldError::FieldType {
                field: ROOM_ID.name(),
                expected: "id",
                found: "nothing",
            })
    }

    pub fn set_room(&self, room_id: Id) -> Result<(), WorldError> {
        self.cell.write_lock().set_field(ROOM_ID, room_id)?;
        Ok(())
    }

    pub fn user_id(&self) -> Result<Option<Id>, WorldError> {
        self.cell.read_lock().field_or(USER_ID, None)
    }

    pub fn set_user(&self, user_id: Option<Id>) -> Result<(), WorldError> {
        self.cell.write_lock().set_field(USER_ID, user_id)?;
        Ok(())
    }

    pub fn is_npc(&self) -> Result<bool, WorldError> {
        Ok(self.user_id()?.is_none())
    }
}

impl Container for Character {
    fn cash(&self) -> Result<u64, WorldError> {
        self.cell.read_lock().field_or(CASH, 0)
    }

    fn set_cash(&self, cash: u64) -> Result<(), WorldError> {
        self.cell.write_lock().set_field(CASH, cash)?;
        Ok(())
    }

    fn add_cash(&self, amount: u64) -> Result<(), WorldError> {
        let mut guard = self.cell.write_lock();
        let cash = guard.field_or(CASH, 0)?;
        guard.set_field(CASH, cash.saturating_add(amount))?;
        Ok(())
    }

    fn remove_cash(&self, amount: u64) -> Result<(), WorldError> {
        let mut guard = self.cell.write_lock();
        let cash = guard.field_or(CASH, 0)?;
        let remaining = cash
            .checked_sub(amount)
            .ok_or(WorldError::InsufficientFunds {
                available: cash,
                requested: amount,
            })?;
        guard.set_field(CASH, remaining)?;
        Ok(())
    }

    /// Appends; the same id may be carried more than once.
    fn add_item(&self, id: Id) -> Result<(), WorldError> {
        let mut guard = self.cell.write_lock();
        let mut items = guard.field_or(INVENTORY, Vec::new())?;
        items.push(id);
        guard.set_field(INVENTORY, items)?;
        Ok(())
    }

    /// Removes the first matching entry only.
    fn remove_item(&self, id: Id) -> Result<bool, WorldError> {
        let mut guard = self.cell.write_lock();
        let mut items = guard.field_or(INVENTORY, Vec::new())?;
        let Some(index) = items.iter().position(|item| *item == id) else {
            return Ok(false);
        };
        items.remove(index);
        guard.set_field(INVENTORY, items)?;
        Ok(true)
    }

    fn item_ids(&self) -> Result<Vec<Id>, WorldError> {
        self.cell.read_lock().field_or(INVENTORY, Vec::new())
    }
}
