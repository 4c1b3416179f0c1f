//! Plain-text views of world entities.

use crate::world::Room;

/// Upper-case the first character.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn exit_list(room: &Room) -> String {
    let exits: Vec<String> = room
        .exits()
        .into_iter()
        .map(|direction| {
            if room.is_locked(direction) {
                format!("{} (locked)", direction.name())
            } else {
                direction.name().to_string()
            }
        })
        .collect();
    if exits.is_empty() {
        "none".to_string()
    } else {
        exits.join(", ")
    }
}

/// What a player sees when looking at `room`. `others` are the names of other characters there.
pub fn describe_room(room: &Room, others: &[String]) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        room.title(),
        String::new(),
        room.description(),
        String::new(),
        format!("Exits: {}", exit_list(room)),
    ];
    let links = room.link_names();
    if !links.is_empty() {
        lines.push(format!("Links: {}", links.join(", ")));
    }
    if !others.is_empty() {
        lines.push(format!("Also here: {}", others.join(", ")));
    }
    lines
}

/// The room editor's section list.
pub fn editor_view(room: &Room) -> Vec<String> {
    let links = room.link_names();
    vec![
        String::new(),
        format!("[1] Title: {}", room.title()),
        format!("[2] Description: {}", room.description()),
        format!("[3] Exits: {}", exit_list(room)),
        format!(
            "[4] Links: {}",
            if links.is_empty() {
                "none".to_string()
            } else {
                links.join(", ")
            }
        ),
        String::new(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Coordinate, Direction, Id};

    #[test]
    fn room_view_lists_exits_links_and_company() {
        let room = Room::new(Id::new(), Coordinate::ORIGIN);
        room.set_title("Hall");
        room.set_exit_enabled(Direction::North, true);
        room.set_exit_enabled(Direction::Up, true);
        room.set_locked(Direction::Up, true);
        room.set_link("attic", Id::new());

        let lines = describe_room(&room, &["Bob".to_string()]);
        assert_eq!(lines[1], "Hall");
        assert!(lines.contains(&"Exits: north, up (locked)".to_string()));
        assert!(lines.contains(&"Links: attic".to_string()));
        assert_eq!(lines.last().map(String::as_str), Some("Also here: Bob"));
    }

    #[test]
    fn rooms_without_exits_say_so() {
        let room = Room::new(Id::new(), Coordinate::ORIGIN);
        assert!(describe_room(&room, &[]).contains(&"Exits: none".to_string()));
        assert!(editor_view(&room).contains(&"[4] Links: none".to_string()));
    }

    #[test]
    fn capitalize_first_letter_only() {
        assert_eq!(capitalize("alice"), "Alice");
        assert_eq!(capitalize("mcKay"), "McKay");
        assert_eq!(capitalize(""), "");
    }
}
