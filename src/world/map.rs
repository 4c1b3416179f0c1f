//! Top-down text map of the rooms around a character.

use crate::world::errors::WorldError;
use crate::world::room::Room;
use crate::world::store::WorldStore;
use crate::world::types::Coordinate;

const HERE: char = '*';
const ROOM: char = '#';
const EMPTY: char = ' ';

/// Render a `(width + 1)`-square slice of the room's level centred on the room. Row order is
/// north to south, matching [`Coordinate::next`] (north is `y - 1`).
pub fn render_map(store: &WorldStore, room: &Room, width: u32) -> Result<Vec<String>, WorldError> {
    let centre = room.location();
    let zone_id = room.zone_id();
    let half = (width / 2) as i32;
    let span = width as i32 + 1;

    let mut rows = Vec::with_capacity(span as usize);
    for dy in 0..span {
        let y = centre.y - half + dy;
        let mut row = String::with_capacity(span as usize);
        for dx in 0..span {
            let here = Coordinate::new(centre.x - half + dx, y, centre.z);
            let glyph = if here == centre {
                HERE
            } else if store.has_room_at(zone_id, here)? {
                ROOM
            } else {
                EMPTY
            };
            row.push(glyph);
        }
        rows.push(row);
    }
    Ok(rows)
}
