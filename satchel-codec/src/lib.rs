//! Binary wire codec for the BRC-100 wallet interface.
//!
//! Every method that crosses the wallet boundary has a typed
//! request/response envelope in [`envelope`] and a byte-deterministic
//! binary rendering built from the primitives in [`reader`] and
//! [`writer`]: Bitcoin-style varints, little-endian integers,
//! varint-length-prefixed UTF-8 strings and one-byte presence flags for
//! optional fields. [`frame`] adds the outer request/response framing
//! (`method byte || payload` on the way in, `status byte || payload` on
//! the way out).

pub mod envelope;
pub mod frame;
pub mod reader;
pub mod writer;

pub use frame::{MethodId, RequestFrame, ResponseFrame};
pub use reader::Reader;
pub use writer::Writer;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Input ended before the value under decode was complete.
    #[error("malformed frame: unexpected end of input")]
    UnexpectedEof,

    /// Bytes remained after the outermost value was decoded.
    #[error("malformed frame: {0} trailing bytes")]
    TrailingBytes(usize),

    /// A length-prefixed string was not valid UTF-8.
    #[error("malformed frame: invalid utf-8 in string")]
    InvalidUtf8,

    /// A one-byte flag or enum tag held a value outside its domain.
    #[error("malformed frame: invalid discriminant {value} for {what}")]
    InvalidDiscriminant { what: &'static str, value: u8 },

    /// A declared length does not fit the remaining input.
    #[error("malformed frame: declared length {0} exceeds input")]
    LengthOutOfBounds(u64),

    /// The request frame named a method this wallet does not implement.
    #[error("unknown method id {0}")]
    UnknownMethod(u8),
}

/// A value with a deterministic binary rendering.
pub trait ToWire {
    fn to_wire(&self, w: &mut Writer);
}

/// A value decodable from its binary rendering.
pub trait FromWire: Sized {
    fn from_wire(r: &mut Reader) -> Result<Self, Error>;
}

/// Encode `value` into a fresh byte vector.
pub fn to_bytes<T: ToWire>(value: &T) -> Vec<u8> {
    let mut w = Writer::new();
    value.to_wire(&mut w);
    w.into_bytes()
}

/// Decode a value from `bytes`, requiring the input to be fully consumed.
pub fn from_bytes<T: FromWire>(bytes: &[u8]) -> Result<T, Error> {
    let mut r = Reader::new(bytes);
    let value = T::from_wire(&mut r)?;
    if r.remaining() != 0 {
        return Err(Error::TrailingBytes(r.remaining()));
    }
    Ok(value)
}

/// Number of bytes a Bitcoin varint uses for `n`.
pub fn varint_len(n: u64) -> usize {
    match n {
        0..=0xFC => 1,
        0xFD..=0xFFFF => 3,
        0x1_0000..=0xFFFF_FFFF => 5,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_len_tiers() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(252), 1);
        assert_eq!(varint_len(253), 3);
        assert_eq!(varint_len(65535), 3);
        assert_eq!(varint_len(65536), 5);
        assert_eq!(varint_len(u32::MAX as u64), 5);
        assert_eq!(varint_len(u32::MAX as u64 + 1), 9);
    }
}
