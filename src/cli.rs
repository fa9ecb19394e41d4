//! Terminal input for the client.
//!
//! The session reads user input through the [`LineSource`] trait so the read-eval
//! loop can be driven by a real terminal ([`Terminal`]) or by a script in tests.
//! [`next_line`] layers the exit confirmation on top: end-of-input at the prompt
//! asks whether to leave instead of quitting outright. Tab completion is answered
//! by the service through [`ServiceCompleter`].
use std::{
    cell::RefCell,
    fs::OpenOptions,
    io::{self, Read, Write},
    net::TcpStream,
    path::{Path, PathBuf},
};

use log::{debug, warn};
use rustyline::{
    Config, Context, Editor, Helper, completion::Completer, error::ReadlineError,
    highlight::Highlighter, hint::Hinter, history::DefaultHistory, validate::Validator,
};
use thiserror::Error;

use crate::protocol::ProtocolTransport;

/// Question asked when input ends at the prompt.
pub const CONFIRM_EXIT: &str = "\nDo you really want to exit? ([y]/n) ";

/// Entries kept in the history file.
pub const HISTORY_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read input: {0}")]
    Readline(#[from] ReadlineError),
    #[error("input IO error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a single read from the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// The user pressed Ctrl-C.
    Interrupted,
    /// The user pressed Ctrl-D, or input ran out.
    Eof,
}

/// Something that can prompt for and return one line at a time.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line, InputError>;

    /// Hands a line the user typed to the history; sources without one ignore it.
    fn remember(&mut self, _line: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptState {
    Reading,
    Confirming,
}

/// Prompts until the user enters a line, or confirms they want to leave.
///
/// Returns `Ok(None)` once exit is confirmed. An interrupt re-issues whichever
/// prompt was showing. While confirming, an empty answer or another end-of-input
/// means yes; an answer starting with `n` goes back to the normal prompt, and
/// anything else repeats the question.
pub fn next_line<S: LineSource>(
    source: &mut S,
    prompt: &str,
) -> Result<Option<String>, InputError> {
    let mut state = PromptState::Reading;

    loop {
        state = match state {
            PromptState::Reading => match source.read_line(prompt)? {
                Line::Text(text) => return Ok(Some(text)),
                Line::Interrupted => PromptState::Reading,
                Line::Eof => PromptState::Confirming,
            },
            PromptState::Confirming => match source.read_line(CONFIRM_EXIT)? {
                Line::Eof => return Ok(None),
                Line::Interrupted => PromptState::Confirming,
                Line::Text(answer) => match answer.trim_start().chars().next() {
                    None | Some('y') => return Ok(None),
                    Some('n') => PromptState::Reading,
                    Some(_) => PromptState::Confirming,
                },
            },
        };
    }
}

/// Completes the word under the cursor with candidates from the service.
///
/// The first failed exchange turns completion off for the rest of the session.
pub struct ServiceCompleter<T: Read + Write> {
    transport: RefCell<Option<ProtocolTransport<T>>>,
}

impl<T: Read + Write> ServiceCompleter<T> {
    pub fn new(transport: ProtocolTransport<T>) -> Self {
        Self {
            transport: RefCell::new(Some(transport)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.borrow().is_some()
    }

    /// Start of the word being completed, and what the service offers for it.
    pub fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let start = line[..pos]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(0, |(i, c)| i + c.len_utf8());

        let mut slot = self.transport.borrow_mut();
        let Some(transport) = slot.as_mut() else {
            return (start, Vec::new());
        };
        match transport.complete(line) {
            Ok(candidates) => (start, candidates),
            Err(e) => {
                warn!("completion disabled: {e}");
                *slot = None;
                (start, Vec::new())
            }
        }
    }
}

impl<T: Read + Write> Completer for ServiceCompleter<T> {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(self.candidates(line, pos))
    }
}

impl<T: Read + Write> Hinter for ServiceCompleter<T> {
    type Hint = String;
}

impl<T: Read + Write> Highlighter for ServiceCompleter<T> {}

impl<T: Read + Write> Validator for ServiceCompleter<T> {}

impl<T: Read + Write> Helper for ServiceCompleter<T> {}

/// Interactive terminal backed by `rustyline`, with a persistent history file.
pub struct Terminal {
    editor: Editor<ServiceCompleter<TcpStream>, DefaultHistory>,
    history: Option<PathBuf>,
}

impl Terminal {
    pub fn open(history: Option<PathBuf>) -> Result<Self, InputError> {
        let config = Config::builder()
            .max_history_size(HISTORY_SIZE)?
            .auto_add_history(false)
            .build();
        let mut editor: Editor<ServiceCompleter<TcpStream>, DefaultHistory> =
            Editor::with_config(config)?;

        if let Some(path) = &history {
            prepare_history(path)?;
            if let Err(e) = editor.load_history(path) {
                warn!("failed to load history from {path:?}: {e}");
            }
        }

        Ok(Self { editor, history })
    }

    /// Turns on tab completion over `transport`.
    pub fn complete_with(&mut self, transport: ProtocolTransport<TcpStream>) {
        self.editor.set_helper(Some(ServiceCompleter::new(transport)));
    }

    /// Writes the history back to disk.
    pub fn save(&mut self) {
        if let Some(path) = &self.history {
            match self.editor.save_history(path) {
                Ok(()) => debug!("saved history to {path:?}"),
                Err(e) => warn!("failed to save history to {path:?}: {e}"),
            }
        }
    }
}

impl LineSource for Terminal {
    fn read_line(&mut self, prompt: &str) -> Result<Line, InputError> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Line::Text(line)),
            Err(ReadlineError::Interrupted) => {
                println!();
                Ok(Line::Interrupted)
            }
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn remember(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            warn!("failed to record history entry: {e}");
        }
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.save();
    }
}

/// Creates the history file if it does not exist yet.
pub fn prepare_history(path: &Path) -> io::Result<()> {
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

/// `~/.revterm_history`, or a file in the working directory without `$HOME`.
pub fn default_history_path() -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(".revterm_history"))
        .unwrap_or_else(|_| ".revterm_history".into())
}
