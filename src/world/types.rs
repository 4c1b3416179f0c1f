use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const ENTITY_SCHEMA_VERSION: u8 = 1;

/// Opaque unique identity of a persisted world entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok().map(Self)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Zone,
    Room,
    Character,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Zone => "zone",
            EntityKind::Room => "room",
            EntityKind::Character => "character",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
        Direction::Up,
        Direction::Down,
        Direction::Northeast,
        Direction::Northwest,
        Direction::Southeast,
        Direction::Southwest,
    ];

    /// Parse a full direction name or its abbreviation, ignoring case.
    pub fn parse(input: &str) -> Option<Direction> {
        match input.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Some(Direction::North),
            "e" | "east" => Some(Direction::East),
            "s" | "south" => Some(Direction::South),
            "w" | "west" => Some(Direction::West),
            "u" | "up" => Some(Direction::Up),
            "d" | "down" => Some(Direction::Down),
            "ne" | "northeast" => Some(Direction::Northeast),
            "nw" | "northwest" => Some(Direction::Northwest),
            "se" | "southeast" => Some(Direction::Southeast),
            "sw" | "southwest" => Some(Direction::Southwest),
            _ => None,
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::East => "e",
            Direction::South => "s",
            Direction::West => "w",
            Direction::Up => "u",
            Direction::Down => "d",
            Direction::Northeast => "ne",
            Direction::Northwest => "nw",
            Direction::Southeast => "se",
            Direction::Southwest => "sw",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Northeast => "northeast",
            Direction::Northwest => "northwest",
            Direction::Southeast => "southeast",
            Direction::Southwest => "southwest",
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Northeast => Direction::Southwest,
            Direction::Northwest => Direction::Southeast,
            Direction::Southeast => Direction::Northwest,
            Direction::Southwest => Direction::Northeast,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Integer grid position of a room. Unique within a zone.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The neighbouring coordinate one step in `direction`. North is -y, up is -z.
    pub fn next(self, direction: Direction) -> Coordinate {
        let Coordinate { x, y, z } = self;
        match direction {
            Direction::North => Coordinate::new(x, y - 1, z),
            Direction::East => Coordinate::new(x + 1, y, z),
            Direction::South => Coordinate::new(x, y + 1, z),
            Direction::West => Coordinate::new(x - 1, y, z),
            Direction::Up => Coordinate::new(x, y, z - 1),
            Direction::Down => Coordinate::new(x, y, z + 1),
            Direction::Northeast => Coordinate::new(x + 1, y - 1, z),
            Direction::Northwest => Coordinate::new(x - 1, y - 1, z),
            Direction::Southeast => Coordinate::new(x + 1, y + 1, z),
            Direction::Southwest => Coordinate::new(x - 1, y + 1, z),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A passage out of a room. Absence of an `Exit` means the direction is impassable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exit {
    pub locked: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_abbreviations_and_names() {
        assert_eq!(Direction::parse("N"), Some(Direction::North));
        assert_eq!(Direction::parse("southwest"), Some(Direction::Southwest));
        assert_eq!(Direction::parse(" up "), Some(Direction::Up));
        assert_eq!(Direction::parse("sideways"), None);
        for dir in Direction::ALL {
            assert_eq!(Direction::parse(dir.abbreviation()), Some(dir));
            assert_eq!(Direction::parse(dir.name()), Some(dir));
        }
    }

    #[test]
    fn next_and_opposite_cancel_out() {
        let start = Coordinate::new(3, -2, 1);
        for dir in Direction::ALL {
            assert_eq!(start.next(dir).next(dir.opposite()), start);
        }
        assert_eq!(start.next(Direction::North), Coordinate::new(3, -3, 1));
    }

    #[test]
    fn id_round_trips_through_bytes() {
        let id = Id::new();
        assert_eq!(Id::from_slice(id.as_bytes()), Some(id));
        assert_eq!(Id::from_slice(b"short"), None);
    }
}
