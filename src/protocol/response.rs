use std::fmt;

use bincode::{Decode, de::Decoder, error::DecodeError};

use super::{rowset::RowSet, wire::decode_string};

/// One-byte discriminator leading every response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseTag {
    RowSet,
    NewDatabase,
    CopySuccess,
    Success,
    Error,
}

impl TryFrom<u8> for ResponseTag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x0 => Ok(ResponseTag::RowSet),
            0x1 => Ok(ResponseTag::NewDatabase),
            0x2 => Ok(ResponseTag::CopySuccess),
            0x3 => Ok(ResponseTag::Success),
            0x4 => Ok(ResponseTag::Error),
            other => Err(other),
        }
    }
}

impl From<ResponseTag> for u8 {
    fn from(value: ResponseTag) -> Self {
        match value {
            ResponseTag::RowSet => 0x0,
            ResponseTag::NewDatabase => 0x1,
            ResponseTag::CopySuccess => 0x2,
            ResponseTag::Success => 0x3,
            ResponseTag::Error => 0x4,
        }
    }
}

/// A fully decoded response from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    RowSet(RowSet),
    NewDatabase { database: String, text: String },
    /// The service switched this connection into copy mode.
    CopySuccess(String),
    Success(String),
    /// The command failed on the service side.
    Error(String),
    /// The frame carried a tag this client does not know.
    InternalError(String),
}

impl Message {
    /// Variant code; doubles as the display style.
    pub fn code(&self) -> u8 {
        match self {
            Message::RowSet(_) => ResponseTag::RowSet.into(),
            Message::NewDatabase { .. } => ResponseTag::NewDatabase.into(),
            Message::CopySuccess(_) => ResponseTag::CopySuccess.into(),
            Message::Success(_) => ResponseTag::Success.into(),
            Message::Error(_) | Message::InternalError(_) => ResponseTag::Error.into(),
        }
    }

    pub fn copy_context(&self) -> bool {
        matches!(self, Message::CopySuccess(_))
    }

    /// Database the session switched to, if this response names one.
    pub fn database(&self) -> Option<&str> {
        match self {
            Message::NewDatabase { database, .. } => Some(database),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::RowSet(rows) => write!(f, "{rows}"),
            Message::NewDatabase { text, .. }
            | Message::CopySuccess(text)
            | Message::Success(text)
            | Message::Error(text)
            | Message::InternalError(text) => write!(f, "{text}"),
        }
    }
}

/// Body of a `NewDatabase` frame: database name, then the service's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewDatabase {
    pub database: String,
    pub text: String,
}

impl<Context> Decode<Context> for NewDatabase {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let database = decode_string(decoder)?;
        let text = decode_string(decoder)?;
        Ok(Self { database, text })
    }
}

/// Body of the single-string frames (`CopySuccess`, `Success`, `Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Text(pub String);

impl<Context> Decode<Context> for Text {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        Ok(Text(decode_string(decoder)?))
    }
}

/// Body of a successful completion answer: a `u32` count, then that many strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Completions(pub Vec<String>);

impl<Context> Decode<Context> for Completions {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let count = u32::decode(decoder)?;
        let mut candidates = Vec::new();
        for _ in 0..count {
            candidates.push(decode_string(decoder)?);
        }
        Ok(Completions(candidates))
    }
}
