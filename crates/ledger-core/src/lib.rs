//! A minimal hash-linked ledger.
//!
//! Blocks are sealed with the SHA-256 of their canonically encoded content,
//! linked to their predecessor's hash, and extended by a nonce search against
//! a leading-zero-bit difficulty. A [`Chain`] re-derives every hash on
//! validation, so any edit to a stored block shows up.

pub mod block;
pub mod chain;
pub mod constants;
pub mod encode;
pub mod error;
pub mod hash;
pub mod identity;
pub mod mine;
pub mod pow;
pub mod transaction;

pub use block::{content_hash, unix_millis, Block, BlockContent};
pub use chain::{genesis_block, Chain};
pub use encode::{Decode, Encode, Payload, Reader};
pub use error::{DecodeError, LedgerError};
pub use hash::{sha256, Hash};
pub use identity::Identity;
pub use mine::{Miner, MinerConfig};
pub use pow::{satisfies, CancelFlag, Difficulty};
pub use transaction::{Address, Currency, Money, Transaction};
