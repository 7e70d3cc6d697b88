use std::{fmt, slice};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    block::{content_hash, Block, BlockContent},
    encode::Payload,
    error::LedgerError,
    hash::Hash,
};

/// Append-only sequence of blocks rooted at the genesis block.
///
/// A chain is never empty, never reorders and never rewrites a block it
/// already holds. Mutating access is `&mut self`, so a chain shared between
/// threads needs a single writer (e.g. behind a `Mutex`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Block<P>>", into = "Vec<Block<P>>")]
#[serde(bound(
    serialize = "P: Clone + Serialize",
    deserialize = "P: Deserialize<'de>"
))]
pub struct Chain<P> {
    pub(crate) blocks: Vec<Block<P>>,
}

impl<P: Payload> Chain<P> {
    /// A chain holding only the deterministic genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![genesis_block()],
        }
    }

    /// Hash of the last block; the genesis hash on a fresh chain.
    pub fn head_hash(&self) -> Hash {
        *self.head().hash()
    }

    /// Appends without checking. Blocks from outside a trusted miner should go
    /// through [`Chain::append_validated`] or be validated beforehand.
    pub fn append(&mut self, block: Block<P>) {
        self.blocks.push(block);
    }

    /// Appends `block` only if it would be valid as the new head.
    pub fn append_validated(&mut self, block: Block<P>) -> Result<(), LedgerError> {
        let index = self.blocks.len();
        if !block.has_valid_hash() || block.content().previous_hash() != Some(self.head().hash())
        {
            warn!(index, hash = %block.hash(), "rejected block");
            return Err(LedgerError::ChainCorrupt { index });
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Whether the block at `index` carries the hash of its content and, past
    /// genesis, links to its predecessor. Indices out of range are not valid.
    pub fn is_block_valid(&self, index: usize) -> bool {
        let Some(block) = self.blocks.get(index) else {
            return false;
        };
        if block.hash != content_hash(&block.content) {
            return false;
        }
        match index {
            0 => true,
            _ => block.content.previous_hash.as_ref() == Some(&self.blocks[index - 1].hash),
        }
    }

    /// True iff every block is valid. Stops at the first bad block.
    pub fn is_valid(&self) -> bool {
        self.first_invalid_index().is_none()
    }

    pub fn first_invalid_index(&self) -> Option<usize> {
        (0..self.blocks.len()).find(|&i| !self.is_block_valid(i))
    }

    /// [`Chain::is_valid`] as a `Result`, naming the first bad block.
    pub fn ensure_valid(&self) -> Result<(), LedgerError> {
        match self.first_invalid_index() {
            None => Ok(()),
            Some(index) => {
                warn!(index, len = self.blocks.len(), "chain failed validation");
                Err(LedgerError::ChainCorrupt { index })
            }
        }
    }
}

impl<P> Chain<P> {
    /// Wraps blocks received from elsewhere. Nothing is validated here.
    pub fn from_blocks(blocks: Vec<Block<P>>) -> Result<Self, LedgerError> {
        if blocks.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        Ok(Self { blocks })
    }

    pub fn get(&self, index: usize) -> Result<&Block<P>, LedgerError> {
        self.blocks.get(index).ok_or(LedgerError::OutOfRangeIndex {
            index,
            len: self.blocks.len(),
        })
    }

    pub fn genesis(&self) -> &Block<P> {
        &self.blocks[0]
    }

    pub fn head(&self) -> &Block<P> {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block<P>] {
        &self.blocks
    }

    pub fn iter(&self) -> slice::Iter<'_, Block<P>> {
        self.blocks.iter()
    }
}

impl<P: Payload> Default for Chain<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, P> IntoIterator for &'a Chain<P> {
    type Item = &'a Block<P>;
    type IntoIter = slice::Iter<'a, Block<P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.blocks.iter()
    }
}

impl<P> TryFrom<Vec<Block<P>>> for Chain<P> {
    type Error = LedgerError;

    fn try_from(blocks: Vec<Block<P>>) -> Result<Self, Self::Error> {
        Self::from_blocks(blocks)
    }
}

impl<P> From<Chain<P>> for Vec<Block<P>> {
    fn from(chain: Chain<P>) -> Self {
        chain.blocks
    }
}

impl<P: fmt::Debug> fmt::Display for Chain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f, "\n  |\n  |")?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

/// The block every chain starts from.
pub fn genesis_block<P: Payload>() -> Block<P> {
    Block::new(BlockContent::genesis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockContent;

    const TS: u64 = 1_600_000_200_000;

    fn push(chain: &mut Chain<String>, payload: &str) {
        let content = BlockContent::new(payload.to_string(), chain.head_hash(), TS);
        chain.append(Block::new(content));
    }

    fn chain_of(payloads: &[&str]) -> Chain<String> {
        let mut chain = Chain::new();
        for p in payloads {
            push(&mut chain, p);
        }
        chain
    }

    #[test]
    fn genesis_block_example() {
        let chain = Chain::<String>::new();
        assert_eq!(chain.len(), 1);
        let genesis = chain.get(0).unwrap();
        assert_eq!(genesis.content().previous_hash(), None);
        assert_eq!(genesis.content().payload(), None);
        assert_eq!(genesis.content().nonce(), 0);
        assert_eq!(chain.head_hash(), *genesis.hash());
        assert!(chain.is_valid());
        assert!(!chain.is_empty());
    }

    #[test]
    fn genesis_is_shared_by_every_chain() {
        assert_eq!(
            Chain::<String>::new().head_hash(),
            Chain::<u64>::new().head_hash()
        );
    }

    #[test]
    fn append_links_to_head() {
        let chain = chain_of(&["a", "b", "c"]);
        assert_eq!(chain.len(), 4);
        for i in 1..chain.len() {
            assert_eq!(
                chain.blocks[i].content.previous_hash,
                Some(chain.blocks[i - 1].hash)
            );
        }
        assert!(chain.is_valid());
        assert_eq!(chain.head().content().payload(), Some(&"c".to_string()));
    }

    #[test]
    fn out_of_range_access_is_an_error() {
        let chain = chain_of(&["a"]);
        assert!(chain.get(1).is_ok());
        assert_eq!(
            chain.get(2).unwrap_err(),
            LedgerError::OutOfRangeIndex { index: 2, len: 2 }
        );
        assert!(!chain.is_block_valid(2));
    }

    #[test]
    fn nonce_flip_is_detected() {
        let mut chain = chain_of(&["hello"]);
        chain.blocks[1].content.nonce += 1;
        assert!(!chain.is_block_valid(1));
        assert!(!chain.is_valid());
        assert_eq!(chain.first_invalid_index(), Some(1));
        assert_eq!(
            chain.ensure_valid(),
            Err(LedgerError::ChainCorrupt { index: 1 })
        );
    }

    #[test]
    fn payload_tamper_is_detected() {
        let mut chain = chain_of(&["hello", "world"]);
        chain.blocks[1].content.payload = Some("jello".to_string());
        assert!(!chain.is_block_valid(1));
        // The successor still links to the stored hash, so only block 1 fails.
        assert!(chain.is_block_valid(2));
        assert_eq!(chain.first_invalid_index(), Some(1));
    }

    #[test]
    fn rehashed_tamper_breaks_the_link() {
        let mut chain = chain_of(&["hello", "world"]);
        let forged = BlockContent::new("jello".to_string(), chain.blocks[0].hash, TS);
        chain.blocks[1] = Block::new(forged);
        assert!(chain.is_block_valid(1));
        assert!(!chain.is_block_valid(2));
        assert!(!chain.is_valid());
    }

    #[test]
    fn genesis_tamper_is_detected() {
        let mut chain = chain_of(&[]);
        chain.blocks[0].content.timestamp = 1;
        assert!(!chain.is_block_valid(0));
        assert!(!chain.is_valid());
    }

    #[test]
    fn validation_does_not_mutate() {
        let chain = chain_of(&["a", "b"]);
        let before = chain.clone();
        assert!(chain.is_valid());
        assert_eq!(chain, before);
    }

    #[test]
    fn append_validated_rejects_bad_links() {
        let mut chain = chain_of(&["a"]);
        let stale = BlockContent::new("b".to_string(), chain.genesis().hash().to_owned(), TS);
        assert_eq!(
            chain.append_validated(Block::new(stale)),
            Err(LedgerError::ChainCorrupt { index: 2 })
        );

        let good = BlockContent::new("b".to_string(), chain.head_hash(), TS);
        let (content, _) = Block::new(good.clone()).into_parts();
        assert!(chain
            .append_validated(Block::from_parts(content, Hash::ZERO))
            .is_err());
        assert!(chain.append_validated(Block::new(good)).is_ok());
        assert_eq!(chain.len(), 3);
        assert!(chain.is_valid());
    }

    #[test]
    fn from_blocks_requires_genesis() {
        assert_eq!(
            Chain::<String>::from_blocks(vec![]),
            Err(LedgerError::EmptyChain)
        );
        let chain = chain_of(&["a", "b"]);
        let copy = Chain::from_blocks(chain.blocks().to_vec()).unwrap();
        assert_eq!(copy, chain);
    }

    #[test]
    fn chain_serialization_example() {
        let chain = chain_of(&["a", "b"]);
        let json = serde_json::to_string(&chain).unwrap();
        assert!(json.starts_with('['));
        let back: Chain<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chain);
        assert!(serde_json::from_str::<Chain<String>>("[]").is_err());
    }

    #[test]
    fn display_joins_blocks() {
        let text = chain_of(&["a"]).to_string();
        assert_eq!(text.matches("Block {").count(), 2);
        assert!(text.contains("  |"));
    }

    #[test]
    fn iterates_in_order() {
        let chain = chain_of(&["a", "b"]);
        let payloads: Vec<_> = chain
            .iter()
            .filter_map(|b| b.content().payload().cloned())
            .collect();
        assert_eq!(payloads, vec!["a".to_string(), "b".to_string()]);
        assert_eq!((&chain).into_iter().count(), 3);
    }
}
