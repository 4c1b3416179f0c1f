//! Cash and item holdings shared by rooms and characters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::world::errors::WorldError;
use crate::world::types::Id;

/// Plain holdings stored inside a room body. Every mutator reports whether it changed anything so
/// the owning entity can mark itself modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    pub cash: u64,
    pub items: BTreeSet<Id>,
}

impl Holdings {
    pub fn set_cash(&mut self, cash: u64) -> bool {
        if self.cash == cash {
            return false;
        }
        self.cash = cash;
        true
    }

    pub fn deposit(&mut self, amount: u64) -> bool {
        self.set_cash(self.cash.saturating_add(amount))
    }

    pub fn withdraw(&mut self, amount: u64) -> Result<bool, WorldError> {
        let remaining = self
            .cash
            .checked_sub(amount)
            .ok_or(WorldError::InsufficientFunds {
                available: self.cash,
                requested: amount,
            })?;
        Ok(self.set_cash(remaining))
    }

    pub fn add_item(&mut self, id: Id) -> bool {
        self.items.insert(id)
    }

    pub fn remove_item(&mut self, id: Id) -> bool {
        self.items.remove(&id)
    }
}

/// Capability to hold cash and items. Mutators dirty the owning entity only when they change the
/// stored value.
pub trait Container {
    fn cash(&self) -> Result<u64, WorldError>;
    fn set_cash(&self, cash: u64) -> Result<(), WorldError>;
    fn add_cash(&self, amount: u64) -> Result<(), WorldError>;
    /// Fails with [`WorldError::InsufficientFunds`] rather than going negative.
    fn remove_cash(&self, amount: u64) -> Result<(), WorldError>;
    fn add_item(&self, id: Id) -> Result<(), WorldError>;
    /// Returns whether an item was removed; removing an absent id is a silent no-op.
    fn remove_item(&self, id: Id) -> Result<bool, WorldError>;
    fn item_ids(&self) -> Result<Vec<Id>, WorldError>;

    fn has_item(&self, id: Id) -> Result<bool, WorldError> {
        Ok(self.item_ids()?.contains(&id))
    }
}
