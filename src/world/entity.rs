//! Shared locking, dirty-tracking and identity behaviour for every world entity.
//!
//! Each entity owns exactly one [`EntityCell`]: a reader/writer lock around the entity body, its
//! extra named fields and its dirty flag. All access goes through scoped guards, so the lock is
//! released on every exit path, including early returns with `?`.
//!
//! ```text
//!  EntityCell<T>
//!  ├── id / kind           (immutable, readable without the lock)
//!  └── RwLock
//!      ├── body: T         (first-class fields: title, location, ...)
//!      ├── fields          (schema-light extras behind typed keys)
//!      └── dirty           (set by modified(), cleared by a commit snapshot)
//! ```
//!
//! Guards wrap `std::sync` guards and are `!Send`; they cannot be held across an `.await` in a
//! spawned task. Never perform I/O while holding one.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::world::errors::WorldError;
use crate::world::types::{EntityKind, Id, ENTITY_SCHEMA_VERSION};

/// Stored value of an extra field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Id(Id),
    OptionalId(Option<Id>),
    Count(u64),
    Text(String),
    Ids(Vec<Id>),
    Flag(bool),
}

impl FieldValue {
    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Id(_) => "id",
            FieldValue::OptionalId(_) => "optional id",
            FieldValue::Count(_) => "count",
            FieldValue::Text(_) => "text",
            FieldValue::Ids(_) => "id list",
            FieldValue::Flag(_) => "flag",
        }
    }
}

/// Rust types that can live in a [`FieldMap`].
pub trait FieldType: Sized + Clone + PartialEq {
    const TYPE_NAME: &'static str;
    fn into_value(self) -> FieldValue;
    fn from_value(value: &FieldValue) -> Option<Self>;
}

macro_rules! field_type {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FieldType for $ty {
            const TYPE_NAME: &'static str = $name;

            fn into_value(self) -> FieldValue {
                FieldValue::$variant(self)
            }

            fn from_value(value: &FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

field_type!(Id, Id, "id");
field_type!(Option<Id>, OptionalId, "optional id");
field_type!(u64, Count, "count");
field_type!(String, Text, "text");
field_type!(Vec<Id>, Ids, "id list");
field_type!(bool, Flag, "flag");

/// Name of an extra field together with the type it must hold.
pub struct FieldKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> FieldKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for FieldKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FieldKey<T> {}

/// Schema-light named fields. Values are written only through [`FieldKey`]s, so a type mismatch
/// on read means the stored data was produced by something that broke the key's contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMap(BTreeMap<String, FieldValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: FieldType>(&self, key: FieldKey<T>) -> Result<Option<T>, WorldError> {
        match self.0.get(key.name) {
            None => Ok(None),
            Some(value) => T::from_value(value).map(Some).ok_or(WorldError::FieldType {
                field: key.name,
                expected: T::TYPE_NAME,
                found: value.type_name(),
            }),
        }
    }

    pub fn get_or<T: FieldType>(&self, key: FieldKey<T>, default: T) -> Result<T, WorldError> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Store `value` unless it equals the current one. Returns whether anything changed.
    pub fn set<T: FieldType>(&mut self, key: FieldKey<T>, value: T) -> Result<bool, WorldError> {
        if self.get(key)?.as_ref() == Some(&value) {
            return Ok(false);
        }
        self.0.insert(key.name.to_string(), value.into_value());
        Ok(true)
    }

    pub fn remove<T: FieldType>(&mut self, key: FieldKey<T>) -> bool {
        self.0.remove(key.name).is_some()
    }

    pub fn contains<T>(&self, key: FieldKey<T>) -> bool {
        self.0.contains_key(key.name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// On-disk form of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord<T> {
    pub schema_version: u8,
    pub id: Id,
    pub kind: EntityKind,
    pub fields: FieldMap,
    pub body: T,
}

#[derive(Debug)]
struct EntityState<T> {
    body: T,
    fields: FieldMap,
    dirty: bool,
}

/// Lock-protected state shared by Room, Character and Zone.
#[derive(Debug)]
pub struct EntityCell<T> {
    id: Id,
    kind: EntityKind,
    state: RwLock<EntityState<T>>,
}

impl<T> EntityCell<T> {
    /// A brand-new entity. It starts dirty because it has never been written.
    pub fn new(kind: EntityKind, body: T, fields: FieldMap) -> Self {
        Self {
            id: Id::new(),
            kind,
            state: RwLock::new(EntityState {
                body,
                fields,
                dirty: true,
            }),
        }
    }

    /// An entity loaded from storage; clean until mutated.
    pub fn restored(record: EntityRecord<T>) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            state: RwLock::new(EntityState {
                body: record.body,
                fields: record.fields,
                dirty: false,
            }),
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Shared access. Readers never block each other.
    pub fn read_lock(&self) -> ReadGuard<'_, T> {
        ReadGuard {
            inner: self.state.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Exclusive access for the duration of the guard.
    pub fn write_lock(&self) -> WriteGuard<'_, T> {
        WriteGuard {
            inner: self.state.write().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.read_lock().inner.dirty
    }

    /// Mark the entity dirty again after a failed commit.
    pub fn restore_dirty(&self) {
        self.write_lock().modified();
    }
}

impl<T: Clone> EntityCell<T> {
    /// Copy of the current state, leaving the dirty flag untouched.
    pub fn snapshot(&self) -> EntityRecord<T> {
        let guard = self.read_lock();
        EntityRecord {
            schema_version: ENTITY_SCHEMA_VERSION,
            id: self.id,
            kind: self.kind,
            fields: guard.inner.fields.clone(),
            body: guard.inner.body.clone(),
        }
    }

    /// When dirty, copy the state and clear the flag in one critical section. The caller must
    /// call [`EntityCell::restore_dirty`] if writing the snapshot fails.
    pub fn take_commit_snapshot(&self) -> Option<EntityRecord<T>> {
        let mut guard = self.write_lock();
        if !guard.inner.dirty {
            return None;
        }
        guard.inner.dirty = false;
        Some(EntityRecord {
            schema_version: ENTITY_SCHEMA_VERSION,
            id: self.id,
            kind: self.kind,
            fields: guard.inner.fields.clone(),
            body: guard.inner.body.clone(),
        })
    }
}

pub struct ReadGuard<'a, T> {
    inner: RwLockReadGuard<'a, EntityState<T>>,
}

impl<T> ReadGuard<'_, T> {
    pub fn fields(&self) -> &FieldMap {
        &self.inner.fields
    }

    pub fn field<V: FieldType>(&self, key: FieldKey<V>) -> Result<Option<V>, WorldError> {
        self.inner.fields.get(key)
    }

    pub fn field_or<V: FieldType>(&self, key: FieldKey<V>, default: V) -> Result<V, WorldError> {
        self.inner.fields.get_or(key, default)
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.body
    }
}

pub struct WriteGuard<'a, T> {
    inner: RwLockWriteGuard<'a, EntityState<T>>,
}

impl<T> WriteGuard<'_, T> {
    /// Flag the entity as having unpersisted changes.
    pub fn modified(&mut self) {
        self.inner.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty
    }

    /// Replace the selected field when `value` differs from it. Equal values are a no-op and
    /// leave the dirty flag alone.
    pub fn set<V: PartialEq>(&mut self, select: impl FnOnce(&mut T) -> &mut V, value: V) -> bool {
        let slot = select(&mut self.inner.body);
        if *slot == value {
            return false;
        }
        *slot = value;
        self.inner.dirty = true;
        true
    }

    /// Run an arbitrary mutation. `apply` reports whether it changed anything.
    pub fn update(&mut self, apply: impl FnOnce(&mut T) -> bool) -> bool {
        let changed = apply(&mut self.inner.body);
        if changed {
            self.inner.dirty = true;
        }
        changed
    }

    /// Change process-local state that is never persisted and never dirties the entity.
    pub fn set_transient<V>(&mut self, select: impl FnOnce(&mut T) -> &mut V, value: V) {
        *select(&mut self.inner.body) = value;
    }

    pub fn field<V: FieldType>(&self, key: FieldKey<V>) -> Result<Option<V>, WorldError> {
        self.inner.fields.get(key)
    }

    pub fn field_or<V: FieldType>(&self, key: FieldKey<V>, default: V) -> Result<V, WorldError> {
        self.inner.fields.get_or(key, default)
    }

    pub fn set_field<V: FieldType>(&mut self, key: FieldKey<V>, value: V) -> Result<bool, WorldError> {
        let changed = self.inner.fields.set(key, value)?;
        if changed {
            self.inner.dirty = true;
        }
        Ok(changed)
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.body
    }
}

/// A persisted world object built on an [`EntityCell`].
pub trait Entity: Send + Sync + Sized + 'static {
    type Body: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;
    const KIND: EntityKind;

    fn cell(&self) -> &EntityCell<Self::Body>;
    fn from_cell(cell: EntityCell<Self::Body>) -> Self;

    fn id(&self) -> Id {
        self.cell().id()
    }

    fn is_dirty(&self) -> bool {
        self.cell().is_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const COUNT: FieldKey<u64> = FieldKey::new("count");
    const LABEL: FieldKey<String> = FieldKey::new("label");

    #[derive(Debug, Clone, PartialEq)]
    struct Body {
        title: String,
        hits: u32,
    }

    fn restored_cell() -> EntityCell<Body> {
        EntityCell::restored(EntityRecord {
            schema_version: ENTITY_SCHEMA_VERSION,
            id: Id::new(),
            kind: EntityKind::Zone,
            fields: FieldMap::new(),
            body: Body {
                title: "start".into(),
                hits: 0,
            },
        })
    }

    #[test]
    fn new_cells_are_dirty_and_restored_cells_are_clean() {
        let fresh = EntityCell::new(
            EntityKind::Room,
            Body {
                title: "x".into(),
                hits: 0,
            },
            FieldMap::new(),
        );
        assert!(fresh.is_dirty());
        assert!(!restored_cell().is_dirty());
    }

    #[test]
    fn setting_an_equal_value_does_not_dirty() {
        let cell = restored_cell();
        assert!(!cell.write_lock().set(|b| &mut b.title, "start".to_string()));
        assert!(!cell.is_dirty());
        assert!(cell.write_lock().set(|b| &mut b.title, "changed".to_string()));
        assert!(cell.is_dirty());
        assert_eq!(cell.read_lock().title, "changed");
    }

    #[test]
    fn commit_snapshot_clears_dirty_once() {
        let cell = restored_cell();
        assert!(cell.take_commit_snapshot().is_none());
        cell.write_lock().update(|b| {
            b.hits += 1;
            true
        });
        let snapshot = cell.take_commit_snapshot().expect("dirty snapshot");
        assert_eq!(snapshot.body.hits, 1);
        assert!(!cell.is_dirty());
        assert!(cell.take_commit_snapshot().is_none());
        cell.restore_dirty();
        assert!(cell.is_dirty());
    }

    #[test]
    fn transient_changes_never_dirty() {
        let cell = restored_cell();
        cell.write_lock().set_transient(|b| &mut b.hits, 9);
        assert_eq!(cell.read_lock().hits, 9);
        assert!(!cell.is_dirty());
    }

    #[test]
    fn typed_fields_enforce_their_type() {
        let mut fields = FieldMap::new();
        assert_eq!(fields.get(COUNT).unwrap(), None);
        assert!(fields.set(COUNT, 5).unwrap());
        assert!(!fields.set(COUNT, 5).unwrap());
        assert_eq!(fields.get_or(COUNT, 0).unwrap(), 5);

        // A key reusing the name with another type sees the stored value as corrupt.
        let clash: FieldKey<String> = FieldKey::new("count");
        let err = fields.get(clash).unwrap_err();
        assert!(matches!(err, WorldError::FieldType { field: "count", .. }));
        assert!(fields.set(LABEL, "tag".to_string()).unwrap());
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn field_writes_through_guard_track_dirty() {
        let cell = restored_cell();
        assert!(cell.write_lock().set_field(COUNT, 3).unwrap());
        assert!(cell.take_commit_snapshot().is_some());
        assert!(!cell.write_lock().set_field(COUNT, 3).unwrap());
        assert!(!cell.is_dirty());
        assert_eq!(cell.read_lock().field(COUNT).unwrap(), Some(3));
    }

    #[test]
    fn concurrent_writers_are_serialised() {
        let cell = Arc::new(restored_cell());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..250 {
                        cell.write_lock().update(|b| {
                            b.hits += 1;
                            true
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.read_lock().hits, 2000);
    }
}
