use std::sync::Arc;

use tracing::info;

use crate::{
    block::{unix_millis, Block, BlockContent},
    chain::Chain,
    encode::Payload,
    error::LedgerError,
    identity::Identity,
    pow::{self, CancelFlag, Difficulty},
    transaction::{Money, Transaction},
};

/// The options a miner recognises.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MinerConfig {
    pub difficulty: Difficulty,
    /// Timestamp for every block this miner builds; the wall clock when `None`.
    pub timestamp: Option<u64>,
}

impl MinerConfig {
    pub fn new(difficulty_bits: u32) -> Result<Self, LedgerError> {
        Ok(Self {
            difficulty: Difficulty::new(difficulty_bits)?,
            timestamp: None,
        })
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Extends a private chain replica by proof-of-work.
///
/// Each miner owns its chain outright; competing miners over one ledger would
/// need an append authority outside this type.
pub struct Miner<P> {
    chain: Chain<P>,
    config: MinerConfig,
    identity: Option<Arc<dyn Identity>>,
    cancel: CancelFlag,
}

impl<P: Payload> Miner<P> {
    pub fn new(config: MinerConfig) -> Self {
        Self::with_chain(Chain::new(), config)
    }

    pub fn with_chain(chain: Chain<P>, config: MinerConfig) -> Self {
        Self {
            chain,
            config,
            identity: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Attributes rewards mined by this miner to `identity`.
    pub fn with_identity(mut self, identity: Arc<dyn Identity>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn identity(&self) -> Option<&dyn Identity> {
        self.identity.as_deref()
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn chain(&self) -> &Chain<P> {
        &self.chain
    }

    pub fn into_chain(self) -> Chain<P> {
        self.chain
    }

    /// A handle that stops the current and any later search until reset.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// The content a search would start from: head link, nonce 0.
    pub fn candidate(&self, payload: P) -> BlockContent<P> {
        let timestamp = self.config.timestamp.unwrap_or_else(unix_millis);
        BlockContent::new(payload, self.chain.head_hash(), timestamp)
    }

    /// Finds a nonce for `payload` on top of the current head and appends the
    /// resulting block. The chain is untouched if the search fails.
    pub fn mine(&mut self, payload: P) -> Result<&Block<P>, LedgerError> {
        let content = self.candidate(payload);
        let block = pow::search(content, self.config.difficulty, &self.cancel)?;
        Ok(self.commit(block))
    }

    /// [`Miner::mine`] with the search spread over the rayon pool.
    pub fn mine_parallel(&mut self, payload: P) -> Result<&Block<P>, LedgerError> {
        let content = self.candidate(payload);
        let block = pow::search_parallel(content, self.config.difficulty, &self.cancel)?;
        Ok(self.commit(block))
    }

    fn commit(&mut self, block: Block<P>) -> &Block<P> {
        info!(
            index = self.chain.len(),
            nonce = block.content().nonce(),
            hash = %block.hash(),
            difficulty = %self.config.difficulty,
            "mined block"
        );
        self.chain.append(block);
        self.chain.head()
    }
}

impl Miner<Transaction> {
    /// Mines a block whose payload pays `amount` to this miner's identity.
    pub fn mine_reward(&mut self, amount: Money) -> Result<&Block<Transaction>, LedgerError> {
        let identity = self.identity.clone().ok_or(LedgerError::MissingIdentity)?;
        let reward = Transaction::reward(&*identity, amount);
        self.mine(reward)
    }
}
