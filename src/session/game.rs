//! Per-connection session: login, the event loop and command routing.
//!
//! The consumer loop waits on two sources at once: the line answering the outstanding main
//! prompt, and the session's event queue. A line is dispatched to completion (nested dialogs
//! read through the same rendezvous with their own prompts) and then exactly one new main prompt
//! is requested. Events arriving while the main prompt is outstanding are printed followed by a
//! fresh copy of the prompt; events arriving during a dialog wait in the queue.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::logutil::escape_log;
use crate::metrics;
use crate::session::errors::SessionError;
use crate::session::events::{run_event_producer, EventBus, TickSource, WorldEvent};
use crate::session::io::{SessionIo, SharedWriter};
use crate::session::render::{capitalize, describe_room};
use crate::session::terminal::Terminal;
use crate::world::{Character, Direction, Entity, Id, Room, WorldError, WorldStore};

pub const PROMPT: &str = "> ";
pub const GENERIC_FAILURE: &str = "Something went wrong.";
const MAX_NAME_LEN: usize = 20;

/// Session behaviour derived from [`Config`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub welcome_message: String,
    pub command_prefix: char,
    pub default_zone: String,
    pub map_width: u32,
    pub window: (usize, usize),
    pub tick: Option<TickSource>,
    pub event_queue_depth: usize,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let tick = config.session.tick_interval().map(|period| TickSource {
            period,
            messages: config.session.tick_messages.clone(),
        });
        Self {
            welcome_message: config.server.welcome_message.clone(),
            command_prefix: config.server.command_prefix(),
            default_zone: config.world.default_zone.clone(),
            map_width: config.world.map_width,
            window: (config.session.window_width, config.session.window_height),
            tick,
            event_queue_depth: config.session.event_queue_depth.max(1),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// State shared by every session of a server.
pub struct WorldContext {
    pub store: Arc<WorldStore>,
    pub bus: EventBus,
    pub settings: SessionSettings,
}

impl WorldContext {
    pub fn new(store: Arc<WorldStore>, settings: SessionSettings) -> Self {
        Self {
            store,
            bus: EventBus::new(),
            settings,
        }
    }

    /// The origin room of the default zone, creating the default world if needed.
    pub fn origin(&self) -> Result<Arc<Room>, WorldError> {
        let (_, origin) = self.store.ensure_default_world(&self.settings.default_zone)?;
        Ok(origin)
    }
}

/// What the session does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Back to the login prompt on the same connection.
    Logout,
    /// Close the connection.
    Quit,
}

/// A logged-in character and the world it acts on.
pub struct Player<'c> {
    pub(crate) ctx: &'c WorldContext,
    pub(crate) character: Arc<Character>,
}

impl<'c> Player<'c> {
    pub fn new(ctx: &'c WorldContext, character: Arc<Character>) -> Self {
        Self { ctx, character }
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub(crate) fn store(&self) -> &'c WorldStore {
        &self.ctx.store
    }

    /// The room the character stands in. A character whose room has vanished is moved to the
    /// origin of the default zone.
    pub(crate) fn current_room(&self) -> Result<Arc<Room>, WorldError> {
        let room_id = self.character.room_id()?;
        match self.store().get_room(room_id) {
            Ok(room) => Ok(room),
            Err(e) if e.is_not_found() => {
                warn!(
                    "{} stood in missing room {}; moving to origin",
                    self.character.name(),
                    room_id
                );
                let origin = self.ctx.origin()?;
                self.store().teleport_character(&self.character, &origin)?;
                Ok(origin)
            }
            Err(e) => Err(e),
        }
    }

    /// Names of the other online characters in `room`.
    pub(crate) fn others_in(&self, room: &Room) -> Vec<String> {
        self.store()
            .online_characters()
            .into_iter()
            .filter(|c| c.id() != self.character.id())
            .filter(|c| c.room_id().map(|id| id == room.id()).unwrap_or(false))
            .map(|c| capitalize(&c.name()))
            .collect()
    }

    pub(crate) async fn print_room<T>(&self, io: &mut T, room: &Room) -> Result<(), SessionError>
    where
        T: Terminal + ?Sized,
    {
        for line in describe_room(room, &self.others_in(room)) {
            io.write_line(&line).await?;
        }
        Ok(())
    }

    pub(crate) fn publish(&self, event: WorldEvent) {
        self.ctx.bus.publish(event);
    }

    pub(crate) fn arrived(&self, room: Id, from: Option<Direction>) -> WorldEvent {
        WorldEvent::Arrived {
            character: self.character.id(),
            name: capitalize(&self.character.name()),
            room,
            from,
        }
    }

    pub(crate) fn departed(&self, room: Id, toward: Option<Direction>) -> WorldEvent {
        WorldEvent::Departed {
            character: self.character.id(),
            name: capitalize(&self.character.name()),
            room,
            toward,
        }
    }

    /// Route one line: prefixed lines are out-of-character commands, the rest are actions.
    pub async fn dispatch<T>(&self, io: &mut T, line: &str) -> Result<Flow, SessionError>
    where
        T: Terminal + ?Sized,
    {
        metrics::inc_commands_dispatched();
        debug!("{}: {}", self.character.name(), escape_log(line));
        match line.strip_prefix(self.ctx.settings.command_prefix) {
            Some(command) => self.process_command(io, command).await,
            None => self.process_action(io, line).await,
        }
    }

    /// Like [`Player::dispatch`], but internal failures are logged and reported to the player
    /// as a generic notice instead of ending the session.
    pub async fn dispatch_guarded<T>(&self, io: &mut T, line: &str) -> Result<Flow, SessionError>
    where
        T: Terminal + ?Sized,
    {
        match self.dispatch(io, line).await {
            Err(e) if !e.is_fatal() => {
                error!(
                    "{}: '{}' failed: {}",
                    self.character.name(),
                    escape_log(line),
                    e
                );
                io.write_line(GENERIC_FAILURE).await?;
                Ok(Flow::Continue)
            }
            other => other,
        }
    }

    /// Run the game until the player logs out, quits or disconnects.
    pub async fn play(&self, io: &mut SessionIo) -> Result<Flow, SessionError> {
        let (event_tx, mut events) = mpsc::channel(self.ctx.settings.event_queue_depth);
        let producer = tokio::spawn(run_event_producer(
            self.ctx.bus.subscribe(),
            event_tx,
            self.ctx.settings.tick.clone(),
        ));

        let outcome = self.event_loop(io, &mut events).await;

        producer.abort();
        self.leave();
        outcome
    }

    async fn enter(&self, io: &mut SessionIo) -> Result<(), SessionError> {
        let room = self.current_room()?;
        io.write_line(&format!("Welcome, {}", capitalize(&self.character.name())))
            .await?;
        self.print_room(io, &room).await?;
        self.publish(self.arrived(room.id(), None));
        Ok(())
    }

    fn leave(&self) {
        self.character.set_online(false);
        match self.character.room_id() {
            Ok(room) => self.publish(self.departed(room, None)),
            Err(e) => warn!("{}: no room on leave: {}", self.character.name(), e),
        }
        if let Err(e) = self.store().commit_character(&self.character) {
            error!("{}: commit on leave failed: {}", self.character.name(), e);
        }
    }

    /// Text this player should see for `event`. A prompt is outstanding while events are shown,
    /// so failures here are logged and the event skipped rather than ending the loop.
    fn render_event(&self, event: &WorldEvent) -> Option<String> {
        match self.character.room_id() {
            Ok(room) => event.render_for(self.character.id(), room),
            Err(e) => {
                warn!("{}: dropping event: {}", self.character.name(), e);
                None
            }
        }
    }

    async fn event_loop(
        &self,
        io: &mut SessionIo,
        events: &mut mpsc::Receiver<WorldEvent>,
    ) -> Result<Flow, SessionError> {
        self.enter(io).await?;
        io.arm(PROMPT).await?;

        loop {
            tokio::select! {
                line = io.next_line() => {
                    let line = line?;
                    let flow = self.dispatch_guarded(io, &line).await?;
                    if flow != Flow::Continue {
                        return Ok(flow);
                    }
                    io.arm(PROMPT).await?;
                }
                Some(event) = events.recv() => {
                    if let Some(text) = self.render_event(&event) {
                        io.write(&format!("\r\n{}\r\n{}", text, PROMPT)).await?;
                    }
                }
            }
        }
    }
}

fn valid_name(name: &str) -> bool {
    let len = name.chars().count();
    (2..=MAX_NAME_LEN).contains(&len) && name.chars().all(char::is_alphanumeric)
}

/// Ask for a character name until one can be played. `None` means the player left.
pub async fn login<T>(io: &mut T, ctx: &WorldContext) -> Result<Option<Arc<Character>>, SessionError>
where
    T: Terminal + ?Sized,
{
    loop {
        let name = io.get_input("Name: ").await?;
        if name.is_empty() {
            return Ok(None);
        }
        if !valid_name(&name) {
            io.write_line(&format!(
                "Names are 2 to {} letters or digits.",
                MAX_NAME_LEN
            ))
            .await?;
            continue;
        }

        let character = match ctx.store.find_character_by_name(&name) {
            Ok(character) if character.is_npc()? => {
                io.write_line("That name belongs to someone else.").await?;
                continue;
            }
            Ok(character) => character,
            Err(e) if e.is_not_found() => {
                let origin = ctx.origin()?;
                match ctx.store.create_character(&name, Some(Id::new()), origin.id()) {
                    Ok(character) => {
                        info!("created character {}", escape_log(&name));
                        character
                    }
                    Err(WorldError::NameTaken(_)) => {
                        io.write_line("That name was just taken.").await?;
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if !character.try_set_online() {
            io.write_line(&format!(
                "{} is already playing.",
                capitalize(&character.name())
            ))
            .await?;
            continue;
        }
        info!("{} logged in", character.name());
        return Ok(Some(character));
    }
}

async fn serve(io: &mut SessionIo, ctx: &WorldContext, peer: &str) -> Result<(), SessionError> {
    io.write_line(&ctx.settings.welcome_message).await?;
    loop {
        let character = match login(io, ctx).await {
            Ok(Some(character)) => character,
            Ok(None) => {
                io.write_line("Take luck!").await?;
                return Ok(());
            }
            Err(e) if !e.is_fatal() => {
                error!("{}: login failed: {}", peer, e);
                io.write_line(GENERIC_FAILURE).await?;
                continue;
            }
            Err(e) => return Err(e),
        };

        let player = Player::new(ctx, character);
        match player.play(io).await {
            Ok(Flow::Quit) => {
                info!("{}: {} quit", peer, player.character.name());
                return Ok(());
            }
            Ok(_) => info!("{}: {} logged out", peer, player.character.name()),
            Err(e) if !e.is_fatal() => {
                error!("{}: session for {} failed: {}", peer, player.character.name(), e);
                io.write_line(GENERIC_FAILURE).await?;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Drive one client connection from welcome banner to close.
pub async fn serve_connection<S>(
    stream: S,
    ctx: Arc<WorldContext>,
    peer: &str,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut io = SessionIo::spawn(reader, SharedWriter::new(writer), ctx.settings.window);
    let _open = metrics::SessionGuard::open();
    info!("{}: connected", peer);

    let result = serve(&mut io, &ctx, peer).await;
    let _ = io.close().await;

    match result {
        Err(SessionError::Disconnected) => {
            info!("{}: disconnected", peer);
            Ok(())
        }
        Ok(()) => {
            info!("{}: closed", peer);
            Ok(())
        }
        Err(e) => Err(e),
    }
}
