//! In-memory terminal double for unit tests.

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::session::errors::SessionError;
use crate::session::terminal::Terminal;

/// Replays scripted input lines and records everything written, prompts included.
pub(crate) struct ScriptedTerminal {
    inputs: VecDeque<String>,
    pub prompts: Vec<String>,
    transcript: String,
    pub window: (usize, usize),
}

impl ScriptedTerminal {
    pub fn new(inputs: &[&str]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            prompts: Vec::new(),
            transcript: String::new(),
            window: (80, 24),
        }
    }

    /// Everything written, prompts included, in order.
    pub fn output(&self) -> &str {
        &self.transcript
    }
}

#[async_trait]
impl Terminal for ScriptedTerminal {
    async fn get_input(&mut self, prompt: &str) -> Result<String, SessionError> {
        self.prompts.push(prompt.to_string());
        self.transcript.push_str(prompt);
        self.inputs.pop_front().ok_or(SessionError::Disconnected)
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SessionError> {
        self.transcript.push_str(line);
        self.transcript.push_str("\r\n");
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), SessionError> {
        self.transcript.push_str(text);
        Ok(())
    }

    fn window_size(&self) -> (usize, usize) {
        self.window
    }
}
