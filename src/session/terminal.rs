use async_trait::async_trait;

use crate::session::errors::SessionError;

/// Line-oriented I/O capability of a connected player.
///
/// Every read goes through [`Terminal::get_input`], which issues exactly one prompt and then
/// waits for exactly one line.
#[async_trait]
pub trait Terminal: Send {
    /// Show `prompt` and wait for the next line, trimmed of surrounding whitespace.
    async fn get_input(&mut self, prompt: &str) -> Result<String, SessionError>;

    /// Write `line` followed by CRLF.
    async fn write_line(&mut self, line: &str) -> Result<(), SessionError>;

    /// Write raw text with no line ending added.
    async fn write(&mut self, text: &str) -> Result<(), SessionError>;

    /// `(width, height)` in characters.
    fn window_size(&self) -> (usize, usize);
}
