//! In-world actions: anything typed without the command prefix.

use crate::session::errors::SessionError;
use crate::session::events::WorldEvent;
use crate::session::game::{Flow, Player};
use crate::session::render::capitalize;
use crate::session::terminal::Terminal;
use crate::world::{Container, Direction, Entity, MoveOutcome};

impl Player<'_> {
    pub(crate) async fn process_action<T>(
        &self,
        io: &mut T,
        input: &str,
    ) -> Result<Flow, SessionError>
    where
        T: Terminal + ?Sized,
    {
        let input = input.trim();
        let mut words = input.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Flow::Logout);
        };
        let args: Vec<&str> = words.collect();
        let rest = input
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim())
            .unwrap_or("");

        match verb.to_lowercase().as_str() {
            "l" | "look" => self.look(io, &args).await?,
            "i" | "inventory" => self.inventory(io).await?,
            "go" => self.follow_link(io, rest).await?,
            "say" => self.say(io, rest).await?,
            "logout" => return Ok(Flow::Logout),
            "quit" | "exit" => {
                io.write_line("Take luck!").await?;
                return Ok(Flow::Quit);
            }
            _ => match Direction::parse(input) {
                Some(direction) => self.walk(io, direction).await?,
                None => io.write_line("You can't do that").await?,
            },
        }
        Ok(Flow::Continue)
    }

    async fn look<T>(&self, io: &mut T, args: &[&str]) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let room = self.current_room()?;
        let direction = match args {
            [] => return self.print_room(io, &room).await,
            [word] => Direction::parse(word),
            _ => None,
        };
        let Some(direction) = direction else {
            return io.write_line("Nothing to see").await;
        };
        match self
            .store()
            .get_room_by_location(room.zone_id(), room.next_location(direction))
        {
            Ok(other) => self.print_room(io, &other).await,
            Err(e) if e.is_not_found() => io.write_line("Nothing to see").await,
            Err(e) => Err(e.into()),
        }
    }

    async fn inventory<T>(&self, io: &mut T) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let items = self.character.item_ids()?;
        let summary = match items.len() {
            0 => "You aren't carrying anything".to_string(),
            1 => "You are carrying 1 item".to_string(),
            n => format!("You are carrying {} items", n),
        };
        io.write_line(&summary).await?;
        io.write_line(&format!("Cash: {}", self.character.cash()?))
            .await
    }

    async fn walk<T>(&self, io: &mut T, direction: Direction) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        // Resolve first so a character in a vanished room is rescued before moving.
        self.current_room()?;
        match self.store().move_character(&self.character, direction)? {
            MoveOutcome::Moved { from, to } => {
                self.publish(self.departed(from.id(), Some(direction)));
                self.publish(self.arrived(to.id(), Some(direction.opposite())));
                self.print_room(io, &to).await
            }
            MoveOutcome::Locked => io.write_line("That way is locked.").await,
            MoveOutcome::NoExit => io.write_line("You can't go that way").await,
            MoveOutcome::NoRoom => io.write_line("The passage leads nowhere.").await,
        }
    }

    async fn follow_link<T>(&self, io: &mut T, name: &str) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        if name.is_empty() {
            return io.write_line("Go where?").await;
        }
        let room = self.current_room()?;
        let Some(target_id) = room.link(name) else {
            return io.write_line("You can't go that way").await;
        };
        let target = match self.store().get_room(target_id) {
            Ok(target) => target,
            Err(e) if e.is_not_found() => {
                return io.write_line("The passage leads nowhere.").await;
            }
            Err(e) => return Err(e.into()),
        };
        self.store().teleport_character(&self.character, &target)?;
        self.publish(self.departed(room.id(), None));
        self.publish(self.arrived(target.id(), None));
        self.print_room(io, &target).await
    }

    async fn say<T>(&self, io: &mut T, text: &str) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        if text.is_empty() {
            return io.write_line("Say what?").await;
        }
        let room = self.current_room()?;
        io.write_line(&format!("You say, \"{}\"", text)).await?;
        self.publish(WorldEvent::Said {
            character: self.character.id(),
            name: capitalize(&self.character.name()),
            room: room.id(),
            text: text.to_string(),
        });
        Ok(())
    }
}
