use thiserror::Error;

/// Failures surfaced by chain access and mining.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("block index {index} is out of range for a chain of length {len}")]
    OutOfRangeIndex { index: usize, len: usize },

    #[error("difficulty of {requested} leading zero bits exceeds the {max}-bit hash width")]
    InvalidDifficulty { requested: u32, max: u32 },

    #[error("nonce space exhausted without a hash of {difficulty} leading zero bits")]
    NonceExhausted { difficulty: u32 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    /// Raised by [`crate::chain::Chain::ensure_valid`] and
    /// [`crate::chain::Chain::append_validated`]; the boolean validators
    /// report corruption as data.
    #[error("chain is corrupt at block {index}")]
    ChainCorrupt { index: usize },

    #[error("a chain needs at least its genesis block")]
    EmptyChain,

    #[error("miner has no identity to attribute the reward to")]
    MissingIdentity,
}

/// Failures while reading a canonical byte encoding back into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("{0:#x} is not a unicode scalar value")]
    InvalidChar(u32),
}
