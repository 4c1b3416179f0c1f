//! Logging helpers for player-supplied text so one log record stays on one line.

use std::fmt;

const MAX_PREVIEW: usize = 200;

/// Player text rendered lazily for a log record. Line breaks, tabs and backslashes are escaped
/// C-style, other control characters (telnet clients send a few) become `\xNN`, and anything past
/// `MAX_PREVIEW` characters is replaced by an ellipsis.
pub struct LogText<'a>(&'a str);

impl fmt::Display for LogText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.0.chars();
        for ch in chars.by_ref().take(MAX_PREVIEW) {
            match ch {
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c if c.is_control() => write!(f, "\\x{:02X}", c as u32)?,
                c => fmt::Write::write_char(f, c)?,
            }
        }
        if chars.next().is_some() {
            f.write_str("…")?;
        }
        Ok(())
    }
}

/// Wrap `s` for logging. Nothing is formatted unless the record is actually emitted.
pub fn escape_log(s: &str) -> LogText<'_> {
    LogText(s)
}
