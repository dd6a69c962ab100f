//! Where `agentdock run` gets its task text from.

use std::io::{self, BufRead, Write};

/// Prompt printed before an interactive read.
pub const INTERACTIVE_PROMPT: &str = "Enter your prompt: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSource {
    /// Given on the command line.
    Flag(String),
    /// Read one line from the terminal.
    Interactive,
}

impl TaskSource {
    /// A missing or empty `--prompt` falls back to an interactive read.
    pub fn from_flag(flag: Option<String>) -> Self {
        match flag {
            Some(text) if !text.is_empty() => TaskSource::Flag(text),
            _ => TaskSource::Interactive,
        }
    }

    /// Produce the raw task text. End of input yields an empty string.
    pub fn obtain<R, W>(self, mut input: R, mut output: W) -> io::Result<String>
    where
        R: BufRead,
        W: Write,
    {
        match self {
            TaskSource::Flag(text) => Ok(text),
            TaskSource::Interactive => {
                output.write_all(INTERACTIVE_PROMPT.as_bytes())?;
                output.flush()?;
                let mut line = String::new();
                input.read_line(&mut line)?;
                Ok(line.trim_end_matches(['\r', '\n']).to_string())
            }
        }
    }
}
