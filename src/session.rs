//! Session state and the read-eval loop.
//!
//! A [`Session`] is a plain value: the loop hands it to [`step`] together with one
//! line of input and gets the updated session back. Nothing else keeps state
//! between lines.
//!
//! The session has two modes. In [`Mode::Normal`] every line is a command and is
//! answered by exactly one response. A [`Message::CopySuccess`] answer moves the
//! session into [`Mode::Copy`], where lines are forwarded as row data without
//! waiting for anything; the sentinel `\.` is answered once with the copy's
//! result and returns the session to normal.
use std::{
    fmt,
    io::{Read, Write},
};

use colored::Colorize;
use log::{debug, info};
use thiserror::Error;

use crate::{
    Command,
    cli::{InputError, LineSource, next_line},
    output::Output,
    protocol::{Message, ProtocolTransport, Request, TransportError},
};

/// Database shown before the user picks one.
pub const NO_DATABASE: &str = "<none>";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Input(#[from] InputError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub database: String,
    pub command_count: u64,
    pub mode: Mode,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            database: String::from(NO_DATABASE),
            command_count: 0,
            mode: Mode::Normal,
        }
    }
}

impl Session {
    pub fn in_copy(&self) -> bool {
        self.mode == Mode::Copy
    }

    /// Applies the answer to a command sent in normal mode.
    pub fn record(mut self, message: &Message) -> Self {
        self.command_count += 1;
        if let Some(database) = message.database() {
            self.database = database.to_string();
        }
        if message.copy_context() {
            self.mode = Mode::Copy;
        }
        self
    }

    /// Leaves copy mode once the sentinel has been answered.
    pub fn finish_copy(mut self) -> Self {
        self.mode = Mode::Normal;
        self
    }

    /// Prompt text, colored for the terminal.
    pub fn prompt(&self) -> String {
        self.to_string().blue().to_string()
    }
}

/// `<database> [<count>] > `, with `|` instead of `>` during a copy.
impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.mode {
            Mode::Normal => '>',
            Mode::Copy => '|',
        };
        write!(f, "{} [{}] {} ", self.database, self.command_count, marker)
    }
}

/// What the loop should do after a line was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue(Session),
    Exit(Session),
}

/// Handles one line of user input.
pub fn step<T, O>(
    session: Session,
    line: &str,
    transport: &mut ProtocolTransport<T>,
    output: &mut O,
) -> Result<Step, TransportError>
where
    T: Read + Write,
    O: Output,
{
    let Ok(command) = Command::parse(line, session.mode) else {
        return Ok(Step::Continue(session));
    };

    let session = match command {
        Command::Exit => return Ok(Step::Exit(session)),
        Command::Execute(text) => {
            let message = transport.exchange(&Request::Execute(text))?;
            present(&message, output);

            let session = session.record(&message);
            if session.in_copy() {
                debug!("entered copy mode");
            }
            session
        }
        Command::CopyRow(row) => {
            transport.send(&Request::CopyRow(row))?;
            session
        }
        Command::EndCopy => {
            let message = transport.exchange(&Request::EndCopy)?;
            debug!("left copy mode");
            present(&message, output);
            session.finish_copy()
        }
    };

    Ok(Step::Continue(session))
}

fn present<O: Output>(message: &Message, output: &mut O) {
    if let Message::RowSet(set) = message {
        for token in &set.violations {
            output.warning(&format!("No row found (unexpected token {token:#x})."));
        }
    }
    output.show(message.code(), &message.to_string());
}

/// Reads lines until the user leaves, returning the final session.
///
/// Transport and input failures end the loop with an error; the caller reports
/// it and closes the connection.
pub fn run<S, T, O>(
    source: &mut S,
    transport: &mut ProtocolTransport<T>,
    output: &mut O,
) -> Result<Session, SessionError>
where
    S: LineSource,
    T: Read + Write,
    O: Output,
{
    let mut session = Session::default();

    loop {
        let Some(line) = next_line(source, &session.prompt())? else {
            info!("exit confirmed");
            return Ok(session);
        };
        if !line.trim().is_empty() {
            source.remember(&line);
        }

        session = match step(session, &line, transport, output)? {
            Step::Continue(session) => session,
            Step::Exit(session) => return Ok(session),
        };
    }
}
