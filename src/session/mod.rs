//! Player sessions: connection I/O, the event loop, dispatch and menus.
//!
//! - [`io`]: input producer and the prompt rendezvous ([`SessionIo`])
//! - [`game`]: login, the per-session event loop and command routing
//! - [`actions`] / [`commands`]: in-world actions and prefixed commands
//! - [`menu`]: paginated keyed-action dialogs
//! - [`events`]: world event bus and per-session delivery

mod actions;
mod commands;
pub mod errors;
pub mod events;
pub mod game;
pub mod io;
pub mod menu;
pub mod render;
pub mod terminal;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{MenuError, SessionError};
pub use events::{EventBus, TickSource, WorldEvent};
pub use game::{
    login, serve_connection, Flow, Player, SessionSettings, WorldContext, GENERIC_FAILURE, PROMPT,
};
pub use io::{SessionIo, SharedWriter};
pub use menu::{exec_menu, Menu, MenuChoice, MenuControl};
pub use terminal::Terminal;
