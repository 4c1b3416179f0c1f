use thiserror::Error;

use crate::world::WorldError;

/// Menu misconfiguration. Raised while building a menu, never by player input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MenuError {
    #[error("duplicate menu action key '{key}' ({text})")]
    DuplicateKey { key: String, text: String },
}

/// Failures that end or interrupt a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The peer went away; the input producer has stopped.
    #[error("connection closed")]
    Disconnected,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Menu(#[from] MenuError),
}

impl SessionError {
    /// Transport failures end the connection; everything else is reported to the player as a
    /// generic failure and the session carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Disconnected | SessionError::Io(_))
    }
}
