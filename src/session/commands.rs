//! Out-of-character commands: lines starting with the command prefix.

use log::info;

use crate::session::errors::SessionError;
use crate::session::events::WorldEvent;
use crate::session::game::{Flow, Player};
use crate::session::menu::{exec_menu, MenuChoice};
use crate::session::render::{capitalize, editor_view};
use crate::session::terminal::Terminal;
use crate::world::{render_map, Direction, Entity, Room};

const REBUILD_PROMPT: &str = "Are you sure (delete all rooms and starts from scratch)? ";

fn on_off(flag: bool) -> &'static str {
    if flag {
        "On"
    } else {
        "Off"
    }
}

/// `y...` or exactly `yes`. Anything else, including an empty line, is a no.
fn confirmed(answer: &str) -> bool {
    answer.starts_with('y') || answer == "yes"
}

impl Player<'_> {
    pub(crate) async fn process_command<T>(
        &self,
        io: &mut T,
        input: &str,
    ) -> Result<Flow, SessionError>
    where
        T: Terminal + ?Sized,
    {
        let input = input.trim();
        let (command, arg) = match input.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (input, ""),
        };

        match command.to_lowercase().as_str() {
            "?" | "help" => self.help(io).await?,
            "edit" => self.edit_room(io).await?,
            "dig" => self.dig(io, arg).await?,
            "rebuild" => self.rebuild(io).await?,
            "loc" | "location" => {
                let room = self.current_room()?;
                io.write_line(&room.location().to_string()).await?;
            }
            "map" => {
                let room = self.current_room()?;
                for row in render_map(self.store(), &room, self.ctx.settings.map_width)? {
                    io.write_line(&row).await?;
                }
            }
            "who" => self.who(io).await?,
            _ => io.write_line("Unrecognized command").await?,
        }
        Ok(Flow::Continue)
    }

    async fn help<T>(&self, io: &mut T) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let p = self.ctx.settings.command_prefix;
        let lines = [
            "Actions:".to_string(),
            "  n, e, s, w, u, d, ne, nw, se, sw   walk".to_string(),
            "  look [direction]                   look around".to_string(),
            "  inventory                          what you carry".to_string(),
            "  go <link>                          follow a named link".to_string(),
            "  say <text>                         speak to the room".to_string(),
            "  logout                             back to the name prompt".to_string(),
            "  quit                               disconnect".to_string(),
            "Commands:".to_string(),
            format!("  {}edit                              edit this room", p),
            format!("  {}dig <direction>                   make a room next door", p),
            format!("  {}rebuild                           start the zone over", p),
            format!("  {}loc                               your coordinates", p),
            format!("  {}map                               rooms around you", p),
            format!("  {}who                               who is online", p),
        ];
        for line in lines {
            io.write_line(&line).await?;
        }
        Ok(())
    }

    async fn who<T>(&self, io: &mut T) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let online = self.store().online_characters();
        io.write_line(&format!("Online now ({}):", online.len()))
            .await?;
        for character in online {
            io.write_line(&format!("  {}", capitalize(&character.name())))
                .await?;
        }
        Ok(())
    }

    async fn dig<T>(&self, io: &mut T, arg: &str) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let Some(direction) = Direction::parse(arg) else {
            return io.write_line("Dig in which direction?").await;
        };
        let room = self.current_room()?;
        let location = room.next_location(direction);
        let target = match self.store().get_room_by_location(room.zone_id(), location) {
            Ok(existing) => existing,
            Err(e) if e.is_not_found() => self.store().create_room(room.zone_id(), location)?,
            Err(e) => return Err(e.into()),
        };

        // Existing exits keep their locks.
        if !room.has_exit(direction) {
            room.set_exit_enabled(direction, true);
        }
        if !target.has_exit(direction.opposite()) {
            target.set_exit_enabled(direction.opposite(), true);
        }
        self.store().commit_room(&room)?;
        self.store().commit_room(&target)?;
        io.write_line(&format!("You dig {}.", direction.name())).await
    }

    async fn rebuild<T>(&self, io: &mut T) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let answer = io.get_input(REBUILD_PROMPT).await?;
        if confirmed(&answer) {
            let zone_id = self.current_room()?.zone_id();
            info!("{} rebuilt zone {}", self.character.name(), zone_id);
            self.store().rebuild_zone(zone_id)?;
            self.publish(WorldEvent::Announcement {
                text: "The world shifts around you.".to_string(),
            });
        }
        let room = self.current_room()?;
        self.print_room(io, &room).await
    }

    async fn print_editor<T>(&self, io: &mut T, room: &Room) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        for line in editor_view(room) {
            io.write_line(&line).await?;
        }
        Ok(())
    }

    async fn edit_room<T>(&self, io: &mut T) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let room = self.current_room()?;
        self.print_editor(io, &room).await?;
        loop {
            let selection = io.get_input("Select a section to edit> ").await?;
            match selection.as_str() {
                "" => return self.print_room(io, &room).await,
                "1" => {
                    let title = io.get_input("Enter new title: ").await?;
                    if !title.is_empty() {
                        room.set_title(&title);
                        self.store().commit_room(&room)?;
                    }
                }
                "2" => {
                    let description = io.get_input("Enter new description: ").await?;
                    if !description.is_empty() {
                        room.set_description(&description);
                        self.store().commit_room(&room)?;
                    }
                }
                "3" => self.edit_exits(io, &room).await?,
                "4" => self.edit_links(io, &room).await?,
                _ => {
                    io.write_line("Invalid selection").await?;
                    continue;
                }
            }
            self.print_editor(io, &room).await?;
        }
    }

    async fn edit_exits<T>(&self, io: &mut T, room: &Room) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let store = self.store();
        exec_menu("Edit Exits", io, |menu| {
            for direction in Direction::ALL {
                let enabled = room.has_exit(direction);
                let text = format!("{}: {}", capitalize(direction.name()), on_off(enabled));
                menu.add_action(direction.abbreviation(), &text, move |_| {
                    room.set_exit_enabled(direction, !enabled);
                    store.commit_room(room)?;
                    Ok(())
                })?;
            }
            for direction in room.exits() {
                let locked = room.is_locked(direction);
                let key = format!("l{}", direction.abbreviation());
                let text = format!("Lock {}: {}", direction.name(), on_off(locked));
                menu.add_action(&key, &text, move |_| {
                    room.set_locked(direction, !locked);
                    store.commit_room(room)?;
                    Ok(())
                })?;
            }
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn edit_links<T>(&self, io: &mut T, room: &Room) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let store = self.store();
        loop {
            let choice = exec_menu("Edit Links", io, |menu| {
                menu.add_action("a", "Add a link", |control| {
                    control.exit();
                    Ok(())
                })?;
                for (index, name) in room.link_names().into_iter().enumerate() {
                    let text = format!("Remove link '{}'", name);
                    menu.add_action_indexed(index, &text, move |_| {
                        room.remove_link(&name);
                        store.commit_room(room)?;
                        Ok(())
                    })?;
                }
                Ok(())
            })
            .await?;

            match choice {
                Some(choice) if choice.key == "a" => self.add_link(io, room).await?,
                _ => return Ok(()),
            }
        }
    }

    /// Ask for a link name, then pick the destination from the rooms of the same zone.
    async fn add_link<T>(&self, io: &mut T, room: &Room) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        let name = io.get_input("Link name: ").await?;
        if name.is_empty() {
            return Ok(());
        }
        let mut rooms = self.store().rooms_in_zone(room.zone_id())?;
        rooms.sort_by_key(|candidate| {
            let at = candidate.location();
            (at.z, at.y, at.x)
        });

        let choice = exec_menu("Link Destination", io, |menu| {
            for (index, candidate) in rooms.iter().enumerate() {
                let text = format!("{} {}", candidate.title(), candidate.location());
                menu.add_data_action(&(index + 1).to_string(), &text, candidate.id(), |control| {
                    control.exit();
                    Ok(())
                })?;
            }
            Ok(())
        })
        .await?;

        if let Some(MenuChoice {
            data: Some(target), ..
        }) = choice
        {
            room.set_link(&name, target);
            self.store().commit_room(room)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::game::{login, SessionSettings, WorldContext};
    use crate::session::testing::ScriptedTerminal;
    use crate::world::{Coordinate, WorldStoreBuilder};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn context() -> (WorldContext, TempDir) {
        let dir = TempDir::new().expect("tempdir");
        let store = WorldStoreBuilder::new(dir.path()).open().expect("store");
        (
            WorldContext::new(Arc::new(store), SessionSettings::default()),
            dir,
        )
    }

    async fn builder(ctx: &WorldContext) -> Player<'_> {
        let mut term = ScriptedTerminal::new(&["builder"]);
        let character = login(&mut term, ctx).await.unwrap().unwrap();
        Player::new(ctx, character)
    }

    async fn run(player: &Player<'_>, line: &str, inputs: &[&str]) -> ScriptedTerminal {
        let mut term = ScriptedTerminal::new(inputs);
        let flow = player.dispatch(&mut term, line).await.unwrap();
        assert_eq!(flow, Flow::Continue);
        term
    }

    #[test]
    fn rebuild_needs_a_yes() {
        assert!(confirmed("y"));
        assert!(confirmed("yes"));
        assert!(confirmed("yep"));
        assert!(!confirmed(""));
        assert!(!confirmed("Yes"));
        assert!(!confirmed("no"));
    }

    #[tokio::test]
    async fn unknown_commands_and_location() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        assert_eq!(
            run(&player, "/fly", &[]).await.output(),
            "Unrecognized command\r\n"
        );
        assert_eq!(run(&player, "/loc", &[]).await.output(), "(0, 0, 0)\r\n");
        assert_eq!(run(&player, "/LOCATION", &[]).await.output(), "(0, 0, 0)\r\n");
        assert!(run(&player, "/?", &[]).await.output().contains("/dig <direction>"));
    }

    #[tokio::test]
    async fn editor_changes_title_and_ignores_empty_input() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        let before = ctx.store.commit_count();

        let term = run(
            &player,
            "/edit",
            &["1", "Town Square", "2", "", "9", ""],
        )
        .await;
        let origin = ctx.origin().unwrap();
        assert_eq!(origin.title(), "Town Square");
        assert!(origin.description().starts_with("Four dusty roads"));
        assert_eq!(ctx.store.commit_count(), before + 1);
        assert!(!origin.is_dirty());
        assert_eq!(
            term.prompts,
            vec![
                "Select a section to edit> ",
                "Enter new title: ",
                "Select a section to edit> ",
                "Enter new description: ",
                "Select a section to edit> ",
                "Select a section to edit> ",
            ]
        );
        assert!(term.output().contains("[1] Title: Town Square"));
        assert!(term.output().contains("Invalid selection"));
    }

    #[tokio::test]
    async fn exits_menu_toggles_and_locks() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        let origin = ctx.origin().unwrap();

        let term = run(&player, "/edit", &["3", "u", "ln", "n", "", ""]).await;
        assert!(origin.has_exit(Direction::Up));
        assert!(!origin.has_exit(Direction::North));
        assert!(!origin.is_dirty());
        let out = term.output();
        assert!(out.contains("-=-=- Edit Exits -=-=-"));
        assert!(out.contains("[U]p: Off"));
        assert!(out.contains("[U]p: On"));
        assert!(out.contains("[LN]Lock north: Off"));
        assert!(out.contains("[LN]Lock north: On"));
    }

    #[tokio::test]
    async fn links_menu_adds_and_removes() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        let origin = ctx.origin().unwrap();
        let corner = ctx
            .store
            .get_room_by_location(origin.zone_id(), Coordinate::new(-2, -2, 0))
            .unwrap();

        // Destinations are ordered by (z, y, x), so the north-west corner comes first.
        run(&player, "/edit", &["4", "a", "corner", "1", "", ""]).await;
        assert_eq!(origin.link("corner"), Some(corner.id()));

        run(&player, "/edit", &["4", "1", "", ""]).await;
        assert!(origin.link_names().is_empty());
        assert!(!origin.is_dirty());
    }

    #[tokio::test]
    async fn dig_opens_exits_both_ways() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        let origin = ctx.origin().unwrap();

        assert_eq!(
            run(&player, "/dig", &[]).await.output(),
            "Dig in which direction?\r\n"
        );
        assert_eq!(run(&player, "/dig up", &[]).await.output(), "You dig up.\r\n");
        let above = ctx
            .store
            .get_room_by_location(origin.zone_id(), Coordinate::new(0, 0, -1))
            .unwrap();
        assert!(origin.has_exit(Direction::Up));
        assert!(above.has_exit(Direction::Down));

        origin.set_locked(Direction::East, true);
        run(&player, "/dig e", &[]).await;
        assert!(origin.is_locked(Direction::East));
    }

    #[tokio::test]
    async fn rebuild_only_after_confirmation() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        let origin = ctx.origin().unwrap();
        origin.set_title("Renamed");
        ctx.store.commit_room(&origin).unwrap();

        let term = run(&player, "/rebuild", &[""]).await;
        assert_eq!(term.prompts, vec![REBUILD_PROMPT]);
        assert!(term.output().contains("Renamed"));

        let mut bus = ctx.bus.subscribe();
        let term = run(&player, "/rebuild", &["yes"]).await;
        assert!(term.output().contains("The Crossroads"));
        assert_ne!(player.character().room_id().unwrap(), origin.id());
        assert_eq!(
            bus.recv().await.unwrap(),
            WorldEvent::Announcement {
                text: "The world shifts around you.".into()
            }
        );
    }

    #[tokio::test]
    async fn map_and_who() {
        let (ctx, _dir) = context();
        let player = builder(&ctx).await;
        let term = run(&player, "/map", &[]).await;
        let rows: Vec<&str> = term.output().split("\r\n").filter(|r| !r.is_empty()).collect();
        assert_eq!(rows.len(), 21);
        assert_eq!(term.output().matches('*').count(), 1);

        assert_eq!(
            run(&player, "/who", &[]).await.output(),
            "Online now (1):\r\n  Builder\r\n"
        );
    }
}
