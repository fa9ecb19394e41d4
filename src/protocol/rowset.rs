//! Row-set decoding.
//!
//! A query result arrives as a flat stream of one-byte tokens:
//!
//! ```text
//! rowset := row* END
//! row    := (INSERTED | DELETED) (ITEM string)*
//! ```
//!
//! The token that ends a row's item list is the first token of whatever follows,
//! so the decoder reads in two levels: the outer loop consumes row kinds until
//! [`RowToken::End`], the inner loop consumes fields and hands the terminating
//! token back to the outer loop.
//!
//! A top-level token that is neither a row kind nor the end marker is a protocol
//! violation. It is recorded on the [`RowSet`] and skipped; decoding resumes with
//! the next token rather than abandoning the response.
use std::fmt;

use bincode::{Decode, de::Decoder, error::DecodeError};
use log::{trace, warn};

use super::wire::decode_string;

/// One-byte markers inside a row-set body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowToken {
    Inserted,
    Deleted,
    End,
    Item,
}

impl TryFrom<u8> for RowToken {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(RowToken::Inserted),
            0x1 => Ok(RowToken::Deleted),
            0x2 => Ok(RowToken::End),
            0x3 => Ok(RowToken::Item),
            other => Err(other),
        }
    }
}

impl From<RowToken> for u8 {
    fn from(value: RowToken) -> Self {
        match value {
            RowToken::Inserted => 0x0,
            RowToken::Deleted => 0x1,
            RowToken::End => 0x2,
            RowToken::Item => 0x3,
        }
    }
}

/// Whether a row was added to or removed from the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Inserted,
    Deleted,
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKind::Inserted => write!(f, "inserted"),
            RowKind::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowChange {
    pub kind: RowKind,
    pub fields: Vec<String>,
}

impl RowChange {
    pub fn new(kind: RowKind, fields: Vec<String>) -> Self {
        Self { kind, fields }
    }
}

impl fmt::Display for RowChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\t{}", self.kind)?;
        for field in &self.fields {
            write!(f, "\t{field}")?;
        }
        Ok(())
    }
}

/// Decoded query result, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    pub rows: Vec<RowChange>,
    /// Top-level tokens skipped while resynchronizing.
    pub violations: Vec<u8>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Display for RowSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{row}")?;
        }
        Ok(())
    }
}

impl<Context> Decode<Context> for RowSet {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let mut set = RowSet::default();
        let mut token = u8::decode(decoder)?;

        loop {
            trace!("row-set token {token:#x}");
            let kind = match RowToken::try_from(token) {
                Ok(RowToken::End) => return Ok(set),
                Ok(RowToken::Inserted) => RowKind::Inserted,
                Ok(RowToken::Deleted) => RowKind::Deleted,
                Ok(RowToken::Item) | Err(_) => {
                    warn!("unexpected row-set token {token:#x}, skipping");
                    set.violations.push(token);
                    token = u8::decode(decoder)?;
                    continue;
                }
            };

            let (fields, next) = decode_fields(decoder)?;
            set.rows.push(RowChange::new(kind, fields));
            token = next;
        }
    }
}

/// Reads `ITEM string` pairs until some other token shows up; returns the fields
/// and that token.
fn decode_fields<D: Decoder>(decoder: &mut D) -> Result<(Vec<String>, u8), DecodeError> {
    let mut fields = Vec::new();
    loop {
        let token = u8::decode(decoder)?;
        if token != u8::from(RowToken::Item) {
            return Ok((fields, token));
        }
        fields.push(decode_string(decoder)?);
    }
}
