//! Client side of the service's command protocol.
//!
//! This module defines how lines typed by the user travel to the service and how
//! the service's answers come back as typed [`Message`] values. It is the only
//! part of the crate that touches the network.
//!
//! # Overview
//!
//! The client writes one request frame per line of input and, for every line
//! that expects an answer, reads exactly one response frame back. Request and
//! response strictly alternate, except during a bulk copy where row lines are
//! written back-to-back and only the closing sentinel is answered.
//!
//! # Key Components
//!
//! - [`Request`]: A line bound for the service, tagged with whether it is answered.
//! - [`Message`]: A decoded response, one variant per response tag.
//! - [`RowSet`]: Query results as an ordered list of inserted/deleted rows.
//! - [`ProtocolTransport`]: Owns the stream; sends requests, receives messages.
//!
//! # Binary Format
//!
//! - Request: `[u8 tag][u32 length][UTF-8 text]`, tag `0` for typed lines and
//!   `1` for completion.
//! - Response: `[u8 tag][body]`, where the tag selects the body layout:
//!   `0` row set, `1` new database (two strings), `2` copy started, `3` success,
//!   `4` error (one string each).
//! - Row-set bodies are a token stream, see [`rowset`].
//! - All integers are big-endian; strings carry a `u32` byte length.
//!
//! A completion request is answered with `3` followed by a `u32` count and that
//! many strings, or with `4` and an error text.
//!
//! Unknown response tags are not fatal; they decode to [`Message::InternalError`].
//!
//! # See Also
//!
//! - [`session`](crate::session): Drives the transport from user input.
mod request;
mod response;
pub mod rowset;
mod transport;
mod wire;

pub use request::{COMPLETE_TAG, COPY_SENTINEL, EXECUTE_TAG, Request};
pub use response::{Message, ResponseTag};
pub use rowset::{RowChange, RowKind, RowSet};
pub use transport::{ProtocolTransport, TransportError};
pub use wire::MAX_FRAME_SIZE;

#[cfg(test)]
pub(crate) use transport::tests as test_support;
