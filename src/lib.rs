pub mod cli;
pub mod command;
pub mod output;
pub mod protocol;
pub mod session;

pub use cli::{Line, LineSource, ServiceCompleter, Terminal, next_line};
pub use command::{Command, CommandError};
pub use output::{Console, Output};
pub use protocol::{Message, ProtocolTransport, Request, TransportError};
pub use session::{Mode, Session, SessionError, Step, run, step};
