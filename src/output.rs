//! Console output.
//!
//! The session hands every response to an [`Output`] as a `(code, text)` pair and
//! leaves presentation to it. [`Console`] prints short output in color and sends
//! anything longer than the configured line budget through a pager.
use std::{
    io::{self, Write},
    process::{Command, Stdio},
};

use colored::{ColoredString, Colorize};
use log::warn;

/// Where the session sends what the user should see.
pub trait Output {
    /// A rendered response; `code` is the response variant code (0-4).
    fn show(&mut self, code: u8, text: &str);

    /// A recoverable problem worth telling the user about.
    fn warning(&mut self, text: &str);

    /// An error that ends the session.
    fn fatal(&mut self, text: &str);
}

/// Colors a response by its code.
pub fn paint(code: u8, text: &str) -> ColoredString {
    match code {
        0..=3 => text.green(),
        _ => text.bright_magenta(),
    }
}

pub struct Console<W: Write> {
    writer: W,
    max_lines: usize,
    pager: Option<String>,
}

impl Console<io::Stdout> {
    /// Console on stdout, paging through `$PAGER` (or `less`).
    pub fn stdout(max_lines: usize) -> Self {
        let pager = std::env::var("PAGER").unwrap_or_else(|_| String::from("less"));
        Self {
            writer: io::stdout(),
            max_lines,
            pager: Some(pager),
        }
    }
}

impl<W: Write> Console<W> {
    /// Console that never pages; long output is written inline.
    pub fn new(writer: W, max_lines: usize) -> Self {
        Self {
            writer,
            max_lines,
            pager: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Whether `text` fits on screen without paging.
    pub fn fits(&self, text: &str) -> bool {
        self.max_lines > 0 && text.matches('\n').count() < self.max_lines
    }

    fn inline(&mut self, code: u8, text: &str) {
        let res = writeln!(self.writer, "{}", paint(code, text)).and_then(|_| self.writer.flush());
        if let Err(e) = res {
            warn!("failed to write output: {e}");
        }
    }
}

impl<W: Write> Output for Console<W> {
    fn show(&mut self, code: u8, text: &str) {
        if self.fits(text) {
            return self.inline(code, text);
        }

        let paged = match &self.pager {
            Some(pager) => page(pager, text)
                .map_err(|e| warn!("failed to run pager '{pager}': {e}"))
                .is_ok(),
            None => false,
        };
        if !paged {
            self.inline(code, text);
        }
    }

    fn warning(&mut self, text: &str) {
        eprintln!("{}", text.yellow());
    }

    fn fatal(&mut self, text: &str) {
        eprintln!("{}", "Client encountered fatal error. Exiting...".red());
        eprintln!("{text}");
    }
}

/// Splits a `$PAGER` value such as `less -R` into the program and its arguments.
fn pager_command(pager: &str) -> Option<Command> {
    let mut words = pager.split_whitespace();
    let mut command = Command::new(words.next()?);
    command.args(words);
    Some(command)
}

fn page(pager: &str, text: &str) -> io::Result<()> {
    let mut command = pager_command(pager)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty pager command"))?;
    let mut child = command.stdin(Stdio::piped()).spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(text.as_bytes()) {
            // The user quit the pager before reading everything.
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
            res => res?,
        }
    }
    child.wait()?;
    Ok(())
}
