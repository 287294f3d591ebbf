//! Operator commands: trigger codes and the exit code.

use std::collections::VecDeque;
use std::io::{BufRead, ErrorKind, Write};

use tracing::warn;

use crate::error::{SensorError, SensorResult};

/// Operator code that ends the run.
pub const EXIT_CODE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Trigger(i64),
    Exit,
}

impl Command {
    pub fn parse(input: &str) -> SensorResult<Self> {
        let trimmed = input.trim();
        let code = trimmed
            .parse::<i64>()
            .map_err(|_| SensorError::MalformedCommand { input: trimmed.to_string() })?;
        Ok(if code == EXIT_CODE { Command::Exit } else { Command::Trigger(code) })
    }
}

/// Blocking source of operator commands.
pub trait TriggerSource {
    /// `Err(MalformedCommand)` is recoverable; the caller keeps reading.
    fn read_command(&mut self) -> SensorResult<Command>;
}

/// Reads one integer per line. End of input counts as the exit command.
pub struct LineTriggerSource<R, W> {
    input: R,
    prompt: Option<W>,
}

impl<R: BufRead> LineTriggerSource<R, std::io::Sink> {
    pub fn new(input: R) -> Self {
        Self { input, prompt: None }
    }
}

impl<R: BufRead, W: Write> LineTriggerSource<R, W> {
    /// Print "Enter '-1' for exit:" to `prompt` before every read.
    pub fn with_prompt(input: R, prompt: W) -> Self {
        Self { input, prompt: Some(prompt) }
    }
}

impl<R: BufRead, W: Write> TriggerSource for LineTriggerSource<R, W> {
    fn read_command(&mut self) -> SensorResult<Command> {
        if let Some(out) = self.prompt.as_mut() {
            // Prompt is best-effort; a closed terminal still lets us read input.
            let _ = write!(out, "\nEnter '{}' for exit:\n", EXIT_CODE).and_then(|_| out.flush());
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Ok(Command::Exit),
            Ok(_) => Command::parse(&line),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                Err(SensorError::MalformedCommand { input: e.to_string() })
            }
            Err(e) => {
                warn!(error = %e, "command input failed, treating as exit");
                Ok(Command::Exit)
            }
        }
    }
}

/// Replays a fixed list of raw inputs, then exits.
#[derive(Debug, Default)]
pub struct ScriptedTriggerSource {
    inputs: VecDeque<String>,
}

impl ScriptedTriggerSource {
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { inputs: inputs.into_iter().map(Into::into).collect() }
    }
}

impl TriggerSource for ScriptedTriggerSource {
    fn read_command(&mut self) -> SensorResult<Command> {
        match self.inputs.pop_front() {
            Some(input) => Command::parse(&input),
            None => Ok(Command::Exit),
        }
    }
}
