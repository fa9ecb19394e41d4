//! Classification of user input.
//!
//! This module defines the [`Command`] enum, which says what a single line typed at
//! the prompt means for the session. The same text means different things depending
//! on the session [`Mode`]: outside a copy it is a command for the service, inside
//! a copy it is row data, and the sentinel `\.` closes the copy.
//!
//! # Example
//! ```rust
//! use revterm::{Command, Mode};
//!
//! let cmd = Command::parse("select * from animals", Mode::Normal).unwrap();
//! assert_eq!(cmd, Command::Execute("select * from animals".into()));
//!
//! let cmd = Command::parse("\\.", Mode::Copy).unwrap();
//! assert_eq!(cmd, Command::EndCopy);
//! ```
use thiserror::Error;

use crate::{Mode, protocol::COPY_SENTINEL};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("no command provided")]
    Empty,
}

/// What a line of user input asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Leave the client (`exit` or `quit`).
    Exit,
    /// Send a command to the service and wait for its answer.
    Execute(String),
    /// Forward one line of copy data.
    CopyRow(String),
    /// Close the copy and wait for its result.
    EndCopy,
}

impl Command {
    pub fn parse(line: &str, mode: Mode) -> Result<Command, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }

        match mode {
            Mode::Normal => match line {
                "exit" | "quit" => Ok(Command::Exit),
                s => Ok(Command::Execute(s.to_string())),
            },
            Mode::Copy => match line {
                COPY_SENTINEL => Ok(Command::EndCopy),
                s => Ok(Command::CopyRow(s.to_string())),
            },
        }
    }
}
