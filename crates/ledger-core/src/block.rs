use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};

use crate::{
    constants::GENESIS_TIMESTAMP,
    encode::{Encode, Payload},
    hash::{sha256, Hash},
};

/// Milliseconds since the Unix epoch. Clocks set before 1970 read as 0.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The hashed fields of a block.
///
/// Once content is sealed into a [`Block`] it can no longer change; only the
/// nonce search, which owns the content by value, bumps the nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContent<P> {
    pub(crate) timestamp: u64,
    pub(crate) previous_hash: Option<Hash>,
    pub(crate) nonce: u64,
    pub(crate) payload: Option<P>,
}

impl<P> BlockContent<P> {
    /// Content for a block extending `previous_hash`, starting at nonce 0.
    pub fn new(payload: P, previous_hash: Hash, timestamp: u64) -> Self {
        Self {
            timestamp,
            previous_hash: Some(previous_hash),
            nonce: 0,
            payload: Some(payload),
        }
    }

    /// The fixed root content: no predecessor, no payload, epoch timestamp.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            previous_hash: None,
            nonce: 0,
            payload: None,
        }
    }

    /// Same content with a different nonce.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn previous_hash(&self) -> Option<&Hash> {
        self.previous_hash.as_ref()
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash.is_none()
    }
}

impl<P: Payload> BlockContent<P> {
    pub fn hash(&self) -> Hash {
        content_hash(self)
    }
}

/// `timestamp ++ previous_hash_or_zero ++ payload_or_nothing ++ nonce`
impl<P: Encode> Encode for BlockContent<P> {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.timestamp.encode_to(out);
        self.previous_hash.unwrap_or(Hash::ZERO).encode_to(out);
        if let Some(payload) = &self.payload {
            payload.encode_to(out);
        }
        self.nonce.encode_to(out);
    }
}

pub fn content_hash<P: Encode>(content: &BlockContent<P>) -> Hash {
    sha256(&content.encode())
}

impl<P: fmt::Debug> fmt::Display for BlockContent<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Content {{")?;
        writeln!(f, "    timestamp: {}", self.timestamp)?;
        match &self.previous_hash {
            Some(h) => writeln!(f, "    previous_hash: {h}")?,
            None => writeln!(f, "    previous_hash: -")?,
        }
        writeln!(f, "    nonce: {}", self.nonce)?;
        match &self.payload {
            Some(p) => writeln!(f, "    payload: {p:?}")?,
            None => writeln!(f, "    payload: -")?,
        }
        write!(f, " }}")
    }
}

/// Content sealed together with its digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block<P> {
    pub(crate) content: BlockContent<P>,
    pub(crate) hash: Hash,
}

impl<P: Payload> Block<P> {
    /// Seals `content`, caching its hash.
    pub fn new(content: BlockContent<P>) -> Self {
        let hash = content_hash(&content);
        Self { content, hash }
    }

    /// Assembles a block received from elsewhere. The hash is taken on trust;
    /// check [`Block::has_valid_hash`] or validate the chain before relying on it.
    pub fn from_parts(content: BlockContent<P>, hash: Hash) -> Self {
        Self { content, hash }
    }

    pub fn has_valid_hash(&self) -> bool {
        self.hash == content_hash(&self.content)
    }
}

impl<P> Block<P> {
    pub fn content(&self) -> &BlockContent<P> {
        &self.content
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn into_parts(self) -> (BlockContent<P>, Hash) {
        (self.content, self.hash)
    }
}

impl<P: fmt::Debug> fmt::Display for Block<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block {{")?;
        writeln!(f, "{}", self.content)?;
        writeln!(f, "hash: {}", self.hash)?;
        write!(f, "}}")
    }
}
