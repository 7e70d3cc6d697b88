//! Canonical byte encoding.
//!
//! Every value that takes part in a block hash is written with an explicit,
//! layout-independent encoding:
//!
//! - `u32` / `u64`: fixed-width big-endian
//! - `String`: `u32` big-endian byte length, then the UTF-8 bytes
//! - `Vec<u8>`: `u32` big-endian length, then the bytes
//! - `char`: its scalar value as a `u32`
//! - [`Hash`]: the 32 raw digest bytes
//!
//! Hashes computed by independent implementations only agree if these rules
//! are reproduced exactly.

use std::fmt::Debug;

use crate::{constants::HASH_SIZE, error::DecodeError, hash::Hash};

pub trait Encode {
    fn encode_to(&self, out: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_to(&mut out);
        out
    }
}

pub trait Decode: Sized {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError>;

    /// Decodes a value that must span the whole input.
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);
        let value = Self::decode_from(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }
}

/// Anything a block can carry. Decoding is the payload owner's business and is
/// not needed to hash or validate a chain.
pub trait Payload: Encode + Clone + PartialEq + Debug {}

impl<T: Encode + Clone + PartialEq + Debug> Payload for T {}

/// Cursor over an encoded byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.bytes.len() {
            return Err(DecodeError::UnexpectedEnd {
                needed: n,
                remaining: self.bytes.len(),
            });
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.bytes.len() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

impl Encode for u32 {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl Decode for u32 {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(u32::from_be_bytes(reader.take_array()?))
    }
}

impl Encode for u64 {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_be_bytes());
    }
}

impl Decode for u64 {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(u64::from_be_bytes(reader.take_array()?))
    }
}

impl Encode for char {
    fn encode_to(&self, out: &mut Vec<u8>) {
        u32::from(*self).encode_to(out);
    }
}

impl Decode for char {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let scalar = u32::decode_from(reader)?;
        char::from_u32(scalar).ok_or(DecodeError::InvalidChar(scalar))
    }
}

fn encode_len(len: usize, out: &mut Vec<u8>) {
    // Payload fields are bounded well below 4 GiB.
    (len as u32).encode_to(out);
}

impl Encode for [u8] {
    fn encode_to(&self, out: &mut Vec<u8>) {
        encode_len(self.len(), out);
        out.extend_from_slice(self);
    }
}

impl Encode for Vec<u8> {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.as_slice().encode_to(out);
    }
}

impl Decode for Vec<u8> {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let len = u32::decode_from(reader)? as usize;
        Ok(reader.take(len)?.to_vec())
    }
}

impl Encode for str {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.as_bytes().encode_to(out);
    }
}

impl Encode for String {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.as_str().encode_to(out);
    }
}

impl Decode for String {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let bytes = Vec::<u8>::decode_from(reader)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl Encode for Hash {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }
}

impl Decode for Hash {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Hash::from_bytes(reader.take_array::<HASH_SIZE>()?))
    }
}
