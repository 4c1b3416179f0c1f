//! Sled-backed persistence for zones, rooms and characters.
//!
//! The store doubles as an identity map: every live entity id resolves to one shared
//! `Arc<Entity>`, so sessions see each other's mutations through the entity locks and only the
//! commit step touches disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{IVec, Transactional};

use crate::world::character::Character;
use crate::world::entity::{Entity, EntityCell, EntityRecord};
use crate::world::errors::WorldError;
use crate::world::room::{Room, RoomData};
use crate::world::types::{Coordinate, Direction, EntityKind, Id, ENTITY_SCHEMA_VERSION};
use crate::world::zone::Zone;
use crate::world::character::CharacterData;

const TREE_ZONES: &str = "zones";
const TREE_ROOMS: &str = "rooms";
const TREE_CHARACTERS: &str = "characters";
const TREE_LOCATIONS: &str = "room_locations";
const TREE_NAMES: &str = "character_names";
/// Ids of deleted rooms; a stale handle must not write its room back.
const TREE_ROOM_TOMBSTONES: &str = "room_tombstones";

pub const DEFAULT_ZONE_NAME: &str = "Default";
/// Half the side of the square grid laid out by [`WorldStore::rebuild_zone`].
const DEFAULT_MAP_RADIUS: i32 = 2;

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct WorldStoreBuilder {
    path: PathBuf,
    default_zone: Option<String>,
}

impl WorldStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_zone: Some(DEFAULT_ZONE_NAME.to_string()),
        }
    }

    /// Name of the zone created (with its default map) when the store has none.
    pub fn default_zone(mut self, name: &str) -> Self {
        self.default_zone = Some(name.to_string());
        self
    }

    /// Opt out of seeding the default world during initialization (useful for targeted tests).
    pub fn without_world_seed(mut self) -> Self {
        self.default_zone = None;
        self
    }

    pub fn open(self) -> Result<WorldStore, WorldError> {
        let store = WorldStore::open_tree_set(&self.path)?;
        if let Some(name) = self.default_zone {
            store.ensure_default_world(&name)?;
        }
        Ok(store)
    }
}

/// One shared instance per live entity id.
pub struct EntityCache<E> {
    entries: RwLock<HashMap<Id, Arc<E>>>,
}

impl<E> EntityCache<E> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, id: Id) -> Option<Arc<E>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Insert unless another loader won the race, in which case its instance is returned.
    fn insert_or_existing(&self, id: Id, entity: Arc<E>) -> Arc<E> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert(entity)
            .clone()
    }

    fn remove(&self, id: Id) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn values(&self) -> Vec<Arc<E>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// Where a kind of entity lives inside the store.
trait Stored: Entity {
    fn tree(store: &WorldStore) -> &sled::Tree;
    fn cache(store: &WorldStore) -> &EntityCache<Self>;
}

impl Stored for Zone {
    fn tree(store: &WorldStore) -> &sled::Tree {
        &store.zones
    }

    fn cache(store: &WorldStore) -> &EntityCache<Self> {
        &store.zone_cache
    }
}

impl Stored for Room {
    fn tree(store: &WorldStore) -> &sled::Tree {
        &store.rooms
    }

    fn cache(store: &WorldStore) -> &EntityCache<Self> {
        &store.room_cache
    }
}

impl Stored for Character {
    fn tree(store: &WorldStore) -> &sled::Tree {
        &store.characters
    }

    fn cache(store: &WorldStore) -> &EntityCache<Self> {
        &store.character_cache
    }
}

/// Result of trying to walk a character through an exit.
pub enum MoveOutcome {
    Moved { from: Arc<Room>, to: Arc<Room> },
    NoExit,
    Locked,
    /// The exit exists but no room occupies the next location.
    NoRoom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub zones: usize,
    pub rooms: usize,
    pub characters: usize,
    pub commits: u64,
}

pub struct WorldStore {
    db: sled::Db,
    zones: sled::Tree,
    rooms: sled::Tree,
    characters: sled::Tree,
    locations: sled::Tree,
    names: sled::Tree,
    tombstones: sled::Tree,
    zone_cache: EntityCache<Zone>,
    room_cache: EntityCache<Room>,
    character_cache: EntityCache<Character>,
    commits: AtomicU64,
}

impl WorldStore {
    /// Open (or create) the store rooted at `path`, seeding the default zone if it is missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WorldError> {
        WorldStoreBuilder::new(path.as_ref()).open()
    }

    fn open_tree_set(path: &Path) -> Result<Self, WorldError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Ok(Self {
            zones: db.open_tree(TREE_ZONES)?,
            rooms: db.open_tree(TREE_ROOMS)?,
            characters: db.open_tree(TREE_CHARACTERS)?,
            locations: db.open_tree(TREE_LOCATIONS)?,
            names: db.open_tree(TREE_NAMES)?,
            tombstones: db.open_tree(TREE_ROOM_TOMBSTONES)?,
            db,
            zone_cache: EntityCache::new(),
            room_cache: EntityCache::new(),
            character_cache: EntityCache::new(),
            commits: AtomicU64::new(0),
        })
    }

    fn location_key(zone_id: Id, location: Coordinate) -> Vec<u8> {
        let mut key = Vec::with_capacity(28);
        key.extend_from_slice(zone_id.as_bytes());
        for axis in [location.x, location.y, location.z] {
            key.extend_from_slice(&axis.to_be_bytes());
        }
        key
    }

    fn name_key(name: &str) -> Vec<u8> {
        name.to_lowercase().into_bytes()
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, WorldError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, WorldError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    fn abort(err: impl Into<WorldError>) -> ConflictableTransactionError<WorldError> {
        ConflictableTransactionError::Abort(err.into())
    }

    fn from_transaction(err: TransactionError<WorldError>) -> WorldError {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => WorldError::Sled(e),
        }
    }

    fn id_from(bytes: &IVec) -> Result<Id, WorldError> {
        Id::from_slice(bytes).ok_or_else(|| WorldError::Internal("malformed id in index".into()))
    }

    fn decode_record<E: Entity>(bytes: &[u8]) -> Result<EntityRecord<E::Body>, WorldError> {
        let record: EntityRecord<E::Body> = Self::deserialize(bytes)?;
        if record.schema_version != ENTITY_SCHEMA_VERSION {
            return Err(WorldError::SchemaMismatch {
                entity: E::KIND.label(),
                expected: ENTITY_SCHEMA_VERSION,
                found: record.schema_version,
            });
        }
        if record.kind != E::KIND {
            return Err(WorldError::KindMismatch {
                id: record.id,
                expected: E::KIND,
                found: record.kind,
            });
        }
        Ok(record)
    }

    fn load<E: Stored>(&self, id: Id) -> Result<Arc<E>, WorldError> {
        if let Some(entity) = E::cache(self).get(id) {
            return Ok(entity);
        }
        let Some(bytes) = E::tree(self).get(id.as_bytes())? else {
            return Err(WorldError::not_found(E::KIND, id));
        };
        let record = Self::decode_record::<E>(&bytes)?;
        let entity = Arc::new(E::from_cell(EntityCell::restored(record)));
        Ok(E::cache(self).insert_or_existing(id, entity))
    }

    fn load_all<E: Stored>(&self) -> Result<Vec<Arc<E>>, WorldError> {
        let mut out = Vec::new();
        for entry in E::tree(self).iter() {
            let (key, _) = entry?;
            out.push(self.load::<E>(Self::id_from(&key)?)?);
        }
        Ok(out)
    }

    /// Write the entity when dirty. The dirty flag is cleared only if `persist` succeeds.
    fn commit_with<E: Entity>(
        &self,
        entity: &E,
        persist: impl FnOnce(&EntityRecord<E::Body>) -> Result<(), WorldError>,
    ) -> Result<bool, WorldError> {
        let Some(record) = entity.cell().take_commit_snapshot() else {
            return Ok(false);
        };
        match persist(&record) {
            Ok(()) => {
                self.commits.fetch_add(1, Ordering::Relaxed);
                debug!("committed {} {}", E::KIND.label(), record.id);
                Ok(true)
            }
            Err(e) => {
                entity.cell().restore_dirty();
                Err(e)
            }
        }
    }

    /// Number of entity records actually written since the store was opened.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Block until every write so far is durable on disk.
    pub fn flush(&self) -> Result<(), WorldError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            zones: self.zones.len(),
            rooms: self.rooms.len(),
            characters: self.characters.len(),
            commits: self.commit_count(),
        }
    }

    // ---------------------------------------------------------------- zones

    pub fn create_zone(&self, name: &str) -> Result<Arc<Zone>, WorldError> {
        let zone = Arc::new(Zone::new(name));
        self.commit_zone(&zone)?;
        Ok(self.zone_cache.insert_or_existing(zone.id(), zone))
    }

    pub fn get_zone(&self, id: Id) -> Result<Arc<Zone>, WorldError> {
        self.load(id)
    }

    pub fn find_zone_by_name(&self, name: &str) -> Result<Arc<Zone>, WorldError> {
        self.zones()?
            .into_iter()
            .find(|zone| zone.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| WorldError::not_found(EntityKind::Zone, name))
    }

    pub fn zones(&self) -> Result<Vec<Arc<Zone>>, WorldError> {
        self.load_all()
    }

    pub fn commit_zone(&self, zone: &Zone) -> Result<bool, WorldError> {
        self.commit_with(zone, |record| {
            self.zones
                .insert(record.id.as_bytes(), Self::serialize(record)?)?;
            self.zones.flush()?;
            Ok(())
        })
    }

    // ---------------------------------------------------------------- rooms

    /// Create and persist a room. Fails with [`WorldError::LocationTaken`] when another room of
    /// the zone already sits at `location`.
    pub fn create_room(&self, zone_id: Id, location: Coordinate) -> Result<Arc<Room>, WorldError> {
        if self.has_room_at(zone_id, location)? {
            return Err(WorldError::LocationTaken {
                zone: zone_id,
                location,
            });
        }
        let room = Arc::new(Room::new(zone_id, location));
        self.commit_room(&room)?;
        Ok(self.room_cache.insert_or_existing(room.id(), room))
    }

    pub fn get_room(&self, id: Id) -> Result<Arc<Room>, WorldError> {
        self.load(id)
    }

    pub fn get_room_by_location(
        &self,
        zone_id: Id,
        location: Coordinate,
    ) -> Result<Arc<Room>, WorldError> {
        match self.locations.get(Self::location_key(zone_id, location))? {
            Some(id) => self.get_room(Self::id_from(&id)?),
            None => Err(WorldError::not_found(
                EntityKind::Room,
                format!("{} in zone {}", location, zone_id),
            )),
        }
    }

    /// Index-only probe; does not load the room.
    pub fn has_room_at(&self, zone_id: Id, location: Coordinate) -> Result<bool, WorldError> {
        Ok(self
            .locations
            .contains_key(Self::location_key(zone_id, location))?)
    }

    pub fn rooms_in_zone(&self, zone_id: Id) -> Result<Vec<Arc<Room>>, WorldError> {
        let mut rooms = Vec::new();
        for entry in self.locations.scan_prefix(zone_id.as_bytes()) {
            let (_, id) = entry?;
            rooms.push(self.get_room(Self::id_from(&id)?)?);
        }
        Ok(rooms)
    }

    /// Persist the room together with its location index entry. A room deleted since the
    /// caller fetched it fails with [`WorldError::NotFound`] and stays deleted.
    pub fn commit_room(&self, room: &Room) -> Result<bool, WorldError> {
        self.commit_with(room, |record| {
            let bytes = Self::serialize(record)?;
            let id = record.id;
            let id_key = id.as_bytes().to_vec();
            let zone = record.body.zone_id;
            let location = record.body.location;
            let location_key = Self::location_key(zone, location);

            (&self.rooms, &self.locations, &self.tombstones)
                .transaction(|(rooms, locations, tombstones)| {
                    if tombstones.get(id_key.as_slice())?.is_some() {
                        return Err(Self::abort(WorldError::not_found(EntityKind::Room, id)));
                    }
                    if let Some(owner) = locations.get(location_key.as_slice())? {
                        if owner.as_ref() != id_key.as_slice() {
                            return Err(Self::abort(WorldError::LocationTaken { zone, location }));
                        }
                    }
                    if let Some(previous) = rooms.get(id_key.as_slice())? {
                        let previous: EntityRecord<RoomData> =
                            bincode::deserialize(&previous).map_err(Self::abort)?;
                        let previous_key =
                            Self::location_key(previous.body.zone_id, previous.body.location);
                        if previous_key != location_key {
                            locations.remove(previous_key)?;
                        }
                    }
                    locations.insert(location_key.clone(), id_key.clone())?;
                    rooms.insert(id_key.clone(), bytes.clone())?;
                    Ok(())
                })
                .map_err(Self::from_transaction)?;
            self.rooms.flush()?;
            self.locations.flush()?;
            Ok(())
        })
    }

    pub fn delete_room(&self, id: Id) -> Result<(), WorldError> {
        let id_key = id.as_bytes().to_vec();
        (&self.rooms, &self.locations, &self.tombstones)
            .transaction(|(rooms, locations, tombstones)| {
                let Some(bytes) = rooms.remove(id_key.clone())? else {
                    return Err(Self::abort(WorldError::not_found(EntityKind::Room, id)));
                };
                let record: EntityRecord<RoomData> =
                    bincode::deserialize(&bytes).map_err(Self::abort)?;
                locations.remove(Self::location_key(record.body.zone_id, record.body.location))?;
                tombstones.insert(id_key.clone(), &[] as &[u8])?;
                Ok(())
            })
            .map_err(Self::from_transaction)?;
        self.rooms.flush()?;
        self.locations.flush()?;
        self.tombstones.flush()?;
        self.room_cache.remove(id);
        debug!("deleted room {}", id);
        Ok(())
    }

    pub fn delete_room_at(&self, zone_id: Id, location: Coordinate) -> Result<(), WorldError> {
        let room = self.get_room_by_location(zone_id, location)?;
        self.delete_room(room.id())
    }

    // ---------------------------------------------------------------- characters

    pub fn create_character(
        &self,
        name: &str,
        user_id: Option<Id>,
        room_id: Id,
    ) -> Result<Arc<Character>, WorldError> {
        // A character must always stand in an existing room.
        self.get_room(room_id)?;
        if self.names.contains_key(Self::name_key(name))? {
            return Err(WorldError::NameTaken(name.to_string()));
        }
        let character = Arc::new(Character::new(name, user_id, room_id)?);
        self.commit_character(&character)?;
        Ok(self
            .character_cache
            .insert_or_existing(character.id(), character))
    }

    pub fn create_npc(&self, name: &str, room_id: Id) -> Result<Arc<Character>, WorldError> {
        self.create_character(name, None, room_id)
    }

    pub fn get_character(&self, id: Id) -> Result<Arc<Character>, WorldError> {
        self.load(id)
    }

    pub fn find_character_by_name(&self, name: &str) -> Result<Arc<Character>, WorldError> {
        match self.names.get(Self::name_key(name))? {
            Some(id) => self.get_character(Self::id_from(&id)?),
            None => Err(WorldError::not_found(EntityKind::Character, name)),
        }
    }

    pub fn characters(&self) -> Result<Vec<Arc<Character>>, WorldError> {
        self.load_all()
    }

    /// Characters currently flagged online in this process.
    pub fn online_characters(&self) -> Vec<Arc<Character>> {
        let mut online: Vec<_> = self
            .character_cache
            .values()
            .into_iter()
            .filter(|c| c.is_online())
            .collect();
        online.sort_by_key(|c| c.name().to_lowercase());
        online
    }

    /// Persist the character and keep the case-insensitive name index in step.
    pub fn commit_character(&self, character: &Character) -> Result<bool, WorldError> {
        self.commit_with(character, |record| {
            let bytes = Self::serialize(record)?;
            let id_key = record.id.as_bytes().to_vec();
            let name_key = Self::name_key(&record.body.name);

            (&self.characters, &self.names)
                .transaction(|(characters, names)| {
                    if let Some(owner) = names.get(name_key.as_slice())? {
                        if owner.as_ref() != id_key.as_slice() {
                            return Err(Self::abort(WorldError::NameTaken(
                                record.body.name.clone(),
                            )));
                        }
                    }
                    if let Some(previous) = characters.get(id_key.as_slice())? {
                        let previous: EntityRecord<CharacterData> =
                            bincode::deserialize(&previous).map_err(Self::abort)?;
                        let previous_key = Self::name_key(&previous.body.name);
                        if previous_key != name_key {
                            names.remove(previous_key)?;
                        }
                    }
                    names.insert(name_key.clone(), id_key.clone())?;
                    characters.insert(id_key.clone(), bytes.clone())?;
                    Ok(())
                })
                .map_err(Self::from_transaction)?;
            self.characters.flush()?;
            self.names.flush()?;
            Ok(())
        })
    }

    /// Walk `character` one step. Each entity is locked on its own; the move is not atomic
    /// across the two rooms.
    pub fn move_character(
        &self,
        character: &Character,
        direction: Direction,
    ) -> Result<MoveOutcome, WorldError> {
        let from = self.get_room(character.room_id()?)?;
        if !from.has_exit(direction) {
            return Ok(MoveOutcome::NoExit);
        }
        if from.is_locked(direction) {
            return Ok(MoveOutcome::Locked);
        }
        let to = match self.get_room_by_location(from.zone_id(), from.next_location(direction)) {
            Ok(room) => room,
            Err(e) if e.is_not_found() => return Ok(MoveOutcome::NoRoom),
            Err(e) => return Err(e),
        };
        self.teleport_character(character, &to)?;
        Ok(MoveOutcome::Moved { from, to })
    }

    /// Place `character` in `room` and persist the change.
    pub fn teleport_character(&self, character: &Character, room: &Room) -> Result<(), WorldError> {
        character.set_room(room.id())?;
        self.commit_character(character)?;
        Ok(())
    }

    // ---------------------------------------------------------------- world layout

    /// Destroy every room of the zone and lay out the default map: a square grid on z=0 around
    /// the origin, orthogonal neighbours connected. Characters left without a room are moved to
    /// the origin, which is returned.
    pub fn rebuild_zone(&self, zone_id: Id) -> Result<Arc<Room>, WorldError> {
        let doomed = self.rooms_in_zone(zone_id)?;
        info!(
            "rebuilding zone {}: removing {} rooms",
            zone_id,
            doomed.len()
        );
        for room in doomed {
            self.delete_room(room.id())?;
        }

        let span = -DEFAULT_MAP_RADIUS..=DEFAULT_MAP_RADIUS;
        let mut created = Vec::new();
        for y in span.clone() {
            for x in span.clone() {
                let room = self.create_room(zone_id, Coordinate::new(x, y, 0))?;
                created.push(room);
            }
        }
        for room in &created {
            let here = room.location();
            for direction in [
                Direction::North,
                Direction::East,
                Direction::South,
                Direction::West,
            ] {
                let there = here.next(direction);
                if span.contains(&there.x) && span.contains(&there.y) {
                    room.set_exit_enabled(direction, true);
                }
            }
            if here == Coordinate::ORIGIN {
                room.set_title("The Crossroads");
                room.set_description(
                    "Four dusty roads meet under an enormous sky. Open fields stretch away in \
                     every direction.",
                );
            } else {
                room.set_title("Open Field");
                room.set_description("Tall grass sways around you. The crossroads are not far.");
            }
            self.commit_room(room)?;
        }

        let origin = self.get_room_by_location(zone_id, Coordinate::ORIGIN)?;
        for character in self.characters()? {
            let room_id = character.room_id()?;
            match self.get_room(room_id) {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    warn!(
                        "character {} lost room {}; moving to origin",
                        character.name(),
                        room_id
                    );
                    self.teleport_character(&character, &origin)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(origin)
    }

    /// Make sure a zone named `zone_name` exists and has a room at its origin.
    pub fn ensure_default_world(&self, zone_name: &str) -> Result<(Arc<Zone>, Arc<Room>), WorldError> {
        let zone = match self.find_zone_by_name(zone_name) {
            Ok(zone) => zone,
            Err(e) if e.is_not_found() => {
                info!("creating zone '{}'", zone_name);
                self.create_zone(zone_name)?
            }
            Err(e) => return Err(e),
        };
        let origin = match self.get_room_by_location(zone.id(), Coordinate::ORIGIN) {
            Ok(room) => room,
            Err(e) if e.is_not_found() => self.rebuild_zone(zone.id())?,
            Err(e) => return Err(e),
        };
        Ok((zone, origin))
    }
}
