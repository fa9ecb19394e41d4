//! Shared wire primitives.
//!
//! Every multi-byte integer on the wire is a big-endian `u32`, and every string is
//! a `u32` byte length followed by that many UTF-8 bytes. bincode's fixed-int,
//! big-endian configuration encodes the integers exactly that way; strings are
//! written by hand since bincode's own `String` encoding uses a `u64` length.
use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint, Limit},
    de::{Decoder, read::Reader},
    enc::{Encoder, write::Writer},
    error::{DecodeError, EncodeError},
};

/// Upper bound on the bytes a single decode call may claim.
pub const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

pub(crate) type WireConfig = Configuration<BigEndian, Fixint, Limit<MAX_FRAME_SIZE>>;

pub(crate) fn config() -> WireConfig {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
        .with_limit::<MAX_FRAME_SIZE>()
}

/// Writes `value` as a length-prefixed UTF-8 string.
pub(crate) fn encode_string<E: Encoder>(value: &str, encoder: &mut E) -> Result<(), EncodeError> {
    let len = u32::try_from(value.len())
        .map_err(|_| EncodeError::Other("string exceeds the 4-byte length prefix"))?;
    len.encode(encoder)?;
    encoder.writer().write(value.as_bytes())
}

/// Reads a length-prefixed UTF-8 string.
pub(crate) fn decode_string<D: Decoder>(decoder: &mut D) -> Result<String, DecodeError> {
    let len = u32::decode(decoder)? as usize;
    decoder.claim_bytes_read(len)?;

    let mut bytes = vec![0; len];
    decoder.reader().read(&mut bytes)?;

    String::from_utf8(bytes).map_err(|e| DecodeError::Utf8 {
        inner: e.utf8_error(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use bincode::{decode_from_slice, encode_to_vec};

    use super::*;

    /// Test helper: length-prefixed UTF-8 bytes for `value`.
    pub(crate) fn string_bytes(value: &str) -> Vec<u8> {
        let mut out = (value.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(value.as_bytes());
        out
    }

    struct Wrapped(String);

    impl Encode for Wrapped {
        fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
            encode_string(&self.0, encoder)
        }
    }

    impl<Context> Decode<Context> for Wrapped {
        fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
            Ok(Wrapped(decode_string(decoder)?))
        }
    }

    #[test]
    fn string_uses_big_endian_byte_length() {
        let bytes = encode_to_vec(Wrapped("héllo".into()), config()).unwrap();

        assert_eq!(&bytes[..4], &[0, 0, 0, 6]);
        assert_eq!(&bytes[4..], "héllo".as_bytes());
    }

    #[test]
    fn string_rejects_invalid_utf8() {
        let bytes = [0, 0, 0, 2, 0xc3, 0x28];
        let res: Result<(Wrapped, usize), _> = decode_from_slice(&bytes, config());

        assert!(matches!(res, Err(DecodeError::Utf8 { .. })));
    }

    #[test]
    fn string_length_beyond_limit_is_refused() {
        let bytes = [0xff, 0xff, 0xff, 0xff];
        let res: Result<(Wrapped, usize), _> = decode_from_slice(&bytes, config());

        assert!(matches!(res, Err(DecodeError::LimitExceeded)));
    }

    #[test]
    fn string_truncated_payload_fails() {
        let bytes = [0, 0, 0, 5, b'a', b'b'];
        let res: Result<(Wrapped, usize), _> = decode_from_slice(&bytes, config());

        assert!(res.is_err());
    }
}
