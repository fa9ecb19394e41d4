use std::{
    io::{self, Read, Write},
    net::TcpStream,
};

use bincode::{decode_from_std_read, encode_into_std_write};
use log::{debug, info, warn};
use thiserror::Error;

use super::{
    Message, Request, ResponseTag,
    response::{Completions, NewDatabase, Text},
    rowset::RowSet,
    wire::{WireConfig, config},
};

/// Bytes drained after an unrecognized response tag.
const UNKNOWN_DRAIN_SIZE: usize = 4096;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Serialize(#[from] bincode::error::EncodeError),
    #[error("failed to decode message: {0}")]
    Deserialize(#[from] bincode::error::DecodeError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("connection already closed")]
    Closed,
    #[error("unexpected response type {0}")]
    Unexpected(u8),
}

/// Owns the connection to the service and moves whole frames across it.
pub struct ProtocolTransport<T: Read + Write> {
    stream: Option<T>,
    config: WireConfig,
    /// Responses the service still owes us.
    pending: usize,
}

impl ProtocolTransport<TcpStream> {
    pub fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))?;
        info!("connected to {host}:{port}");
        Ok(Self::new(stream))
    }

    /// A second handle on the same connection, for requests issued while the
    /// session is waiting on the user.
    pub fn try_clone(&self) -> Result<Self, TransportError> {
        let stream = self.stream.as_ref().ok_or(TransportError::Closed)?;
        Ok(Self::new(stream.try_clone()?))
    }
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream: Some(stream),
            config: config(),
            pending: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// The underlying stream, until the transport is closed.
    pub fn get_ref(&self) -> Option<&T> {
        self.stream.as_ref()
    }

    /// Writes one request frame.
    pub fn send(&mut self, request: &Request) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;

        debug!("sending {request:?}");
        encode_into_std_write(request, stream, self.config)?;
        stream.flush()?;

        if request.expects_response() {
            self.pending += 1;
        }
        Ok(())
    }

    /// Reads exactly one response frame.
    ///
    /// Unknown tags do not fail: the bytes that happen to be available are drained
    /// and returned as [`Message::InternalError`]. Their true length is unknown, so
    /// the stream may not be positioned on a frame boundary afterwards.
    pub fn recv(&mut self) -> Result<Message, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        self.pending = self.pending.saturating_sub(1);

        let tag: u8 = decode_from_std_read(stream, self.config)?;
        let message = match ResponseTag::try_from(tag) {
            Ok(ResponseTag::RowSet) => {
                Message::RowSet(decode_from_std_read::<RowSet, _, _>(stream, self.config)?)
            }
            Ok(ResponseTag::NewDatabase) => {
                let NewDatabase { database, text } = decode_from_std_read(stream, self.config)?;
                Message::NewDatabase { database, text }
            }
            Ok(ResponseTag::CopySuccess) => {
                let Text(text) = decode_from_std_read(stream, self.config)?;
                Message::CopySuccess(text)
            }
            Ok(ResponseTag::Success) => {
                let Text(text) = decode_from_std_read(stream, self.config)?;
                Message::Success(text)
            }
            Ok(ResponseTag::Error) => {
                let Text(text) = decode_from_std_read(stream, self.config)?;
                Message::Error(text)
            }
            Err(tag) => {
                warn!("unrecognized response tag {tag:#x}");
                let drained = drain(stream)?;
                Message::InternalError(format!(
                    "Unrecognized type {tag}: {}",
                    String::from_utf8_lossy(&drained)
                ))
            }
        };

        debug!("received {message:?}");
        Ok(message)
    }

    /// Sends `request` and waits for its response.
    pub fn exchange(&mut self, request: &Request) -> Result<Message, TransportError> {
        self.send(request)?;
        self.recv()
    }

    /// Asks the service how `line` could continue.
    ///
    /// An `Error` answer means there is nothing to offer and yields no
    /// candidates; any other answer leaves the stream in an unknown state.
    pub fn complete(&mut self, line: &str) -> Result<Vec<String>, TransportError> {
        self.send(&Request::Complete(line.to_string()))?;
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        self.pending = self.pending.saturating_sub(1);

        let tag: u8 = decode_from_std_read(stream, self.config)?;
        match ResponseTag::try_from(tag) {
            Ok(ResponseTag::Success) => {
                let Completions(candidates) = decode_from_std_read(stream, self.config)?;
                debug!("{} completion(s) for {line:?}", candidates.len());
                Ok(candidates)
            }
            Ok(ResponseTag::Error) => {
                let Text(text) = decode_from_std_read(stream, self.config)?;
                debug!("no completions for {line:?}: {text}");
                Ok(Vec::new())
            }
            _ => Err(TransportError::Unexpected(tag)),
        }
    }

    /// Releases the connection, first reading any responses still owed so the
    /// service is not left mid-write. Safe to call more than once.
    pub fn close(&mut self) {
        self.drain_pending();

        if self.stream.take().is_some() {
            info!("connection closed");
        }
    }

    fn drain_pending(&mut self) {
        while self.pending > 0 && self.stream.is_some() {
            match self.recv() {
                Ok(message) => debug!("discarded owed response {message:?}"),
                Err(e) => {
                    warn!("failed to drain pending response: {e}");
                    break;
                }
            }
        }
        self.pending = 0;
    }
}

impl<T: Read + Write> Drop for ProtocolTransport<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Single best-effort read of whatever follows an unknown tag.
fn drain<R: Read>(stream: &mut R) -> Result<Vec<u8>, TransportError> {
    let mut buf = vec![0; UNKNOWN_DRAIN_SIZE];
    let read = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e)
            if matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ) =>
        {
            0
        }
        Err(e) => return Err(e.into()),
    };
    buf.truncate(read);
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use bincode::decode_from_slice;

    use super::super::{
        rowset::{RowChange, RowKind, RowToken},
        wire::tests::string_bytes,
    };
    use super::*;

    /// In-memory peer: reads come from a script of server bytes, writes are kept.
    #[derive(Debug, Default)]
    pub(crate) struct MockStream {
        pub input: Cursor<Vec<u8>>,
        pub output: Vec<u8>,
    }

    impl MockStream {
        pub(crate) fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }

        /// Texts of every request frame written so far.
        pub(crate) fn requests(&self) -> Vec<String> {
            let mut out = Vec::new();
            let mut rest = &self.output[..];
            while !rest.is_empty() {
                let (request, read): (Request, usize) = decode_from_slice(rest, config()).unwrap();
                out.push(request.text().to_string());
                rest = &rest[read..];
            }
            out
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn text_frame(tag: ResponseTag, text: &str) -> Vec<u8> {
        let mut out = vec![u8::from(tag)];
        out.extend(string_bytes(text));
        out
    }

    pub(crate) fn new_database_frame(database: &str, text: &str) -> Vec<u8> {
        let mut out = vec![u8::from(ResponseTag::NewDatabase)];
        out.extend(string_bytes(database));
        out.extend(string_bytes(text));
        out
    }

    pub(crate) fn rowset_frame(rows: &[(RowToken, &[&str])]) -> Vec<u8> {
        let mut out = vec![u8::from(ResponseTag::RowSet)];
        for (kind, fields) in rows {
            out.push(u8::from(*kind));
            for field in *fields {
                out.push(u8::from(RowToken::Item));
                out.extend(string_bytes(field));
            }
        }
        out.push(u8::from(RowToken::End));
        out
    }

    pub(crate) fn completions_frame(candidates: &[&str]) -> Vec<u8> {
        let mut out = vec![u8::from(ResponseTag::Success)];
        out.extend((candidates.len() as u32).to_be_bytes());
        for candidate in candidates {
            out.extend(string_bytes(candidate));
        }
        out
    }

    fn transport(input: Vec<u8>) -> ProtocolTransport<MockStream> {
        ProtocolTransport::new(MockStream::new(input))
    }

    fn position(transport: &ProtocolTransport<MockStream>) -> u64 {
        transport.stream.as_ref().unwrap().input.position()
    }

    #[test]
    fn send_writes_frame() {
        let mut transport = transport(vec![]);

        transport.send(&Request::Execute("help".into())).unwrap();

        let written = &transport.stream.as_ref().unwrap().output;
        assert_eq!(written, &vec![0, 0, 0, 0, 4, b'h', b'e', b'l', b'p']);
        assert_eq!(transport.pending(), 1);
    }

    #[test]
    fn send_round_trips_commands() {
        let mut transport = transport(vec![]);
        let texts = ["help", "", "select * from 動物 where name = 'Æ'"];

        for text in texts {
            transport.send(&Request::Execute(text.into())).unwrap();
        }

        assert_eq!(transport.stream.as_ref().unwrap().requests(), texts);
    }

    #[test]
    fn copy_rows_owe_nothing() {
        let mut transport = transport(vec![]);

        transport.send(&Request::CopyRow("1,1".into())).unwrap();
        transport.send(&Request::CopyRow("2,2".into())).unwrap();

        assert_eq!(transport.pending(), 0);
    }

    #[test]
    fn recv_new_database() {
        let bytes = new_database_frame("zoo", "created database zoo");
        let len = bytes.len() as u64;
        let mut transport = transport(bytes);

        let message = transport.recv().unwrap();

        assert_eq!(
            message,
            Message::NewDatabase {
                database: "zoo".into(),
                text: "created database zoo".into()
            }
        );
        assert_eq!(position(&transport), len);
    }

    #[test]
    fn recv_text_variants() {
        let mut bytes = text_frame(ResponseTag::CopySuccess, "reading row data until \"\\.\"");
        bytes.extend(text_frame(ResponseTag::Success, "inserted 3 row(s)"));
        bytes.extend(text_frame(ResponseTag::Error, "no such table: test"));
        let mut transport = transport(bytes);

        assert_eq!(
            transport.recv().unwrap(),
            Message::CopySuccess("reading row data until \"\\.\"".into())
        );
        assert_eq!(
            transport.recv().unwrap(),
            Message::Success("inserted 3 row(s)".into())
        );
        assert_eq!(
            transport.recv().unwrap(),
            Message::Error("no such table: test".into())
        );
    }

    #[test]
    fn recv_rowset_stops_at_frame_end() {
        let mut bytes = rowset_frame(&[
            (RowToken::Inserted, &["Alligator", "snap", "reptilia"]),
            (RowToken::Inserted, &["Rabbit", "nibble", "mammalia"]),
        ]);
        let frame_len = bytes.len() as u64;
        bytes.extend(text_frame(ResponseTag::Success, "tag v1 set to head"));
        let mut transport = transport(bytes);

        let Message::RowSet(set) = transport.recv().unwrap() else {
            panic!("expected a row set");
        };

        assert_eq!(
            set.rows,
            vec![
                RowChange::new(
                    RowKind::Inserted,
                    vec!["Alligator".into(), "snap".into(), "reptilia".into()]
                ),
                RowChange::new(
                    RowKind::Inserted,
                    vec!["Rabbit".into(), "nibble".into(), "mammalia".into()]
                ),
            ]
        );
        assert_eq!(position(&transport), frame_len);
        assert_eq!(
            transport.recv().unwrap(),
            Message::Success("tag v1 set to head".into())
        );
    }

    #[test]
    fn recv_unknown_tag_degrades() {
        let mut transport = transport(vec![99, b'o', b'o', b'p', b's']);

        let message = transport.recv().unwrap();

        assert_eq!(message, Message::InternalError("Unrecognized type 99: oops".into()));
        assert_eq!(message.code(), 4);
        transport.send(&Request::Execute("help".into())).unwrap();
    }

    #[test]
    fn complete_reads_candidates() {
        let bytes = completions_frame(&["select", "set"]);
        let len = bytes.len() as u64;
        let mut transport = transport(bytes);

        let candidates = transport.complete("se").unwrap();

        assert_eq!(candidates, vec!["select", "set"]);
        assert_eq!(transport.pending(), 0);
        assert_eq!(position(&transport), len);
        let written = &transport.stream.as_ref().unwrap().output;
        assert_eq!(written, &vec![1, 0, 0, 0, 2, b's', b'e']);
    }

    #[test]
    fn complete_without_candidates() {
        let mut transport = transport(completions_frame(&[]));

        assert!(transport.complete("").unwrap().is_empty());
    }

    #[test]
    fn complete_error_reply_is_empty() {
        let mut bytes = text_frame(ResponseTag::Error, "Sorry, I don't understand.");
        bytes.extend(text_frame(ResponseTag::Success, "next"));
        let mut transport = transport(bytes);

        assert!(transport.complete("frob").unwrap().is_empty());
        assert_eq!(transport.pending(), 0);
        assert_eq!(transport.recv().unwrap(), Message::Success("next".into()));
    }

    #[test]
    fn complete_rejects_other_replies() {
        let mut transport = transport(new_database_frame("zoo", "switched"));

        assert!(matches!(
            transport.complete("use"),
            Err(TransportError::Unexpected(1))
        ));
    }

    #[test]
    #[should_panic(expected = "Deserialize")]
    fn recv_on_closed_peer() {
        let mut transport = transport(vec![]);

        transport.recv().unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let mut transport = transport(vec![]);

        transport.close();
        transport.close();

        assert!(transport.is_closed());
        assert!(matches!(
            transport.send(&Request::Execute("help".into())),
            Err(TransportError::Closed)
        ));
        assert!(matches!(transport.recv(), Err(TransportError::Closed)));
    }

    #[test]
    fn close_drains_owed_response() {
        let mut bytes = text_frame(ResponseTag::Success, "inserted 1 row(s)");
        let len = bytes.len() as u64;
        bytes.extend(text_frame(ResponseTag::Success, "not owed"));
        let mut transport = transport(bytes);
        transport.send(&Request::EndCopy).unwrap();

        transport.drain_pending();

        assert_eq!(transport.pending(), 0);
        assert_eq!(position(&transport), len);
        transport.close();
        assert!(transport.is_closed());
    }

    #[test]
    fn close_stops_draining_on_error() {
        let mut transport = transport(vec![]);
        transport.send(&Request::Execute("help".into())).unwrap();

        transport.close();

        assert!(transport.is_closed());
        assert_eq!(transport.pending(), 0);
    }
}
