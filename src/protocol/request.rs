use bincode::{
    Decode, Encode,
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
};

use super::wire::{decode_string, encode_string};

/// Request tag for a line of input the service should execute.
pub const EXECUTE_TAG: u8 = 0;

/// Request tag asking the service to complete a partial line.
pub const COMPLETE_TAG: u8 = 1;

/// Line that ends a bulk copy.
pub const COPY_SENTINEL: &str = "\\.";

/// A single line sent to the service.
///
/// Every variant is framed as `[tag][u32 length][UTF-8 text]`. Lines typed by
/// the user all carry tag 0 and only differ in whether the service answers
/// them; completion requests carry tag 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Command executed outside of a copy; answered with one response.
    Execute(String),
    /// Row data inside a copy; never answered.
    CopyRow(String),
    /// The copy sentinel; answered with the copy's result.
    EndCopy,
    /// The line being edited; answered with candidate completions.
    Complete(String),
}

impl Request {
    pub fn text(&self) -> &str {
        match self {
            Request::Execute(text) | Request::CopyRow(text) | Request::Complete(text) => text,
            Request::EndCopy => COPY_SENTINEL,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Request::Complete(_) => COMPLETE_TAG,
            _ => EXECUTE_TAG,
        }
    }

    /// Whether the service owes a response once this request is written.
    pub fn expects_response(&self) -> bool {
        !matches!(self, Request::CopyRow(_))
    }
}

impl Encode for Request {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.tag().encode(encoder)?;
        encode_string(self.text(), encoder)
    }
}

/// Decodes a frame the way the service reads it. The wire does not say whether
/// a line belongs to a copy, so typed lines come back as [`Request::Execute`].
impl<Context> Decode<Context> for Request {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        match u8::decode(decoder)? {
            EXECUTE_TAG => Ok(Request::Execute(decode_string(decoder)?)),
            COMPLETE_TAG => Ok(Request::Complete(decode_string(decoder)?)),
            _ => Err(DecodeError::Other("unsupported request tag")),
        }
    }
}
