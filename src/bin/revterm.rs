use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{debug, info, warn};
use revterm::{
    Console, Output, ProtocolTransport, Terminal,
    cli::default_history_path,
    run,
};

#[derive(Debug, Parser)]
#[command(version, about = "CLI interface for Revori", long_about = None)]
struct Cli {
    /// Host running the Revori SQL service
    #[arg(short = 'H', long, default_value = "localhost", env = "REVTERM_HOST")]
    host: String,
    /// Port the service listens on
    #[arg(short, long, default_value_t = 8017, env = "REVTERM_PORT")]
    port: u16,
    /// Maximum number of lines to display before paging
    #[arg(short = 'n', long, default_value_t = 25, env = "REVTERM_LINES")]
    lines: usize,
    /// History file [default: ~/.revterm_history]
    #[arg(long, env = "REVTERM_HISTORY")]
    history: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Initialize env_logger; For logging to STDERR
    env_logger::init();

    let cli = Cli::parse();

    // A Ctrl-C while a response is in flight must not kill the process before
    // the response is read. At the prompt the terminal reports it instead.
    if let Err(e) = ctrlc::set_handler(|| debug!("interrupt ignored while awaiting the service")) {
        warn!("failed to install interrupt handler: {e}");
    }

    let mut console = Console::stdout(cli.lines);
    let mut transport = match ProtocolTransport::connect(&cli.host, cli.port) {
        Ok(transport) => transport,
        Err(e) => {
            console.fatal(&format!("unable to connect to {}:{}: {e}", cli.host, cli.port));
            return ExitCode::FAILURE;
        }
    };
    let history = cli.history.unwrap_or_else(default_history_path);
    let mut terminal = match Terminal::open(Some(history)) {
        Ok(terminal) => terminal,
        Err(e) => {
            console.fatal(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    match transport.try_clone() {
        Ok(completion) => terminal.complete_with(completion),
        Err(e) => warn!("tab completion unavailable: {e}"),
    }

    println!("Welcome to the Revori SQL client interface.");
    println!("Type \"help\" to get started.\n");

    let res = run(&mut terminal, &mut transport, &mut console);
    if let Err(e) = &res {
        console.fatal(&e.to_string());
    }

    transport.close();
    drop(terminal);

    match res {
        Ok(session) => {
            info!("leaving after {} command(s)", session.command_count);
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
