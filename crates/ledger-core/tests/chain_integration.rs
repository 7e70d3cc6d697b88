use std::{collections::HashSet, sync::Arc, thread};

use ledger_core::{
    satisfies, Block, BlockContent, Chain, Currency, Decode, Encode, Identity, LedgerError,
    Miner, MinerConfig, Money, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const TS: u64 = 1_600_000_200_000;

/// Rebuilds `chain` with block `index` replaced by `content`, keeping the
/// stored hash, the way a tampered replica would arrive from elsewhere.
fn with_content<P: ledger_core::Payload>(
    chain: &Chain<P>,
    index: usize,
    content: BlockContent<P>,
) -> anyhow::Result<Chain<P>> {
    let mut blocks = chain.blocks().to_vec();
    let hash = *blocks[index].hash();
    blocks[index] = Block::from_parts(content, hash);
    Ok(Chain::from_blocks(blocks)?)
}

#[test]
fn mine_hello_and_flip_nonce() -> anyhow::Result<()> {
    let mut miner = Miner::new(MinerConfig::new(4)?);
    let block = miner.mine("hello".to_string())?.clone();
    assert!(block.hash().to_hex().starts_with('0'));

    let chain = miner.chain();
    assert_eq!(chain.len(), 2);
    assert!(chain.is_valid());

    let flipped = block.content().clone().with_nonce(block.content().nonce() + 1);
    let tampered = with_content(chain, 1, flipped)?;
    assert!(!tampered.is_valid());
    assert_eq!(tampered.first_invalid_index(), Some(1));
    Ok(())
}

#[test]
fn linkage_holds_for_mined_chains() -> anyhow::Result<()> {
    let mut miner = Miner::new(MinerConfig::new(6)?.with_timestamp(TS));
    for i in 0..10u64 {
        miner.mine(i)?;
    }
    let chain = miner.into_chain();
    assert_eq!(chain.len(), 11);
    assert_eq!(chain.get(0)?.content().previous_hash(), None);
    for i in 1..chain.len() {
        let block = chain.get(i)?;
        assert_eq!(block.content().previous_hash(), Some(chain.get(i - 1)?.hash()));
        assert!(satisfies(block.hash(), 6));
    }
    assert!(chain.is_valid());
    assert!(chain.ensure_valid().is_ok());
    Ok(())
}

#[test]
fn every_payload_byte_is_covered_by_the_hash() -> anyhow::Result<()> {
    let mut miner = Miner::new(MinerConfig::new(2)?.with_timestamp(TS));
    miner.mine(b"ledger payload".to_vec())?;
    miner.mine(b"next".to_vec())?;
    let chain = miner.chain();
    let original = chain.get(1)?.content().clone();
    let encoded = original.payload().cloned().unwrap_or_default().encode();

    // Skip the 4-byte length prefix so every variant still decodes.
    for i in 4..encoded.len() {
        let mut bytes = encoded.clone();
        bytes[i] ^= 0x01;
        let payload = Vec::<u8>::decode(&bytes)?;
        let content = BlockContent::new(
            payload,
            *original.previous_hash().unwrap_or(&ledger_core::Hash::ZERO),
            original.timestamp(),
        )
        .with_nonce(original.nonce());

        let tampered = with_content(chain, 1, content)?;
        assert!(!tampered.is_block_valid(1), "byte {i} flip went unnoticed");
        assert!(!tampered.is_valid());
    }
    Ok(())
}

#[test]
fn neighbouring_nonces_hash_differently() {
    let mut rng = StdRng::seed_from_u64(7);
    let head = Chain::<String>::new().head_hash();
    let content = BlockContent::new("avalanche".to_string(), head, TS);

    let mut seen = HashSet::new();
    for _ in 0..256 {
        let nonce = rng.gen_range(0..u64::MAX);
        let a = content.clone().with_nonce(nonce).hash();
        let b = content.clone().with_nonce(nonce + 1).hash();
        assert_ne!(a, b);
        assert!(seen.insert(a), "hash repeated for nonce {nonce}");
        assert_eq!(a, content.clone().with_nonce(nonce).hash());
    }
}

#[test]
fn out_of_range_access() {
    let chain = Chain::<String>::new();
    assert_eq!(
        chain.get(1).unwrap_err(),
        LedgerError::OutOfRangeIndex { index: 1, len: 1 }
    );
}

#[test]
fn payloads_round_trip_through_their_encoding() -> anyhow::Result<()> {
    let text = "grüße".to_string();
    assert_eq!(String::decode(&text.encode())?, text);

    let amount = 1_234_567u64;
    assert_eq!(u64::decode(&amount.encode())?, amount);

    let euro = Currency::new("Euro", '€', "EUR");
    let tx = Transaction::new("alice", "bob", Money::new(250, euro));
    assert_eq!(Transaction::decode(&tx.encode())?, tx);
    Ok(())
}

#[test]
fn external_blocks_are_validated_before_append() -> anyhow::Result<()> {
    let mut producer = Miner::new(MinerConfig::new(4)?.with_timestamp(TS));
    let mut follower = Chain::<String>::new();

    for word in ["a", "b", "c"] {
        let block = producer.mine(word.to_string())?.clone();
        follower.append_validated(block)?;
    }
    assert_eq!(follower, *producer.chain());

    let genesis = *follower.genesis().hash();
    let orphan = Block::new(BlockContent::new("x".to_string(), genesis, TS));
    assert!(matches!(
        follower.append_validated(orphan),
        Err(LedgerError::ChainCorrupt { index: 4 })
    ));
    assert_eq!(follower.len(), 4);
    Ok(())
}

#[test]
fn mining_on_a_worker_thread_can_be_cancelled() -> anyhow::Result<()> {
    let mut miner = Miner::<String>::new(MinerConfig::new(128)?);
    let cancel = miner.cancel_flag();

    let worker = thread::spawn(move || {
        let result = miner.mine("never".to_string()).map(|b| b.clone());
        (result, miner.into_chain())
    });
    cancel.cancel();

    let (result, chain) = worker.join().map_err(|_| anyhow::anyhow!("miner panicked"))?;
    assert!(matches!(result, Err(LedgerError::Cancelled { .. })));
    assert_eq!(chain.len(), 1);
    Ok(())
}

struct Label(String);

impl Identity for Label {
    fn public_identifier(&self) -> String {
        self.0.clone()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        ledger_core::sha256(message).as_bytes().to_vec()
    }
}

#[test]
fn rewards_are_attributed_to_the_miner() -> anyhow::Result<()> {
    let identity = Arc::new(Label("carol".into()));
    let mut miner =
        Miner::<Transaction>::new(MinerConfig::new(4)?).with_identity(identity.clone());
    let euro = Currency::new("Euro", '€', "EUR");

    for _ in 0..3 {
        miner.mine_reward(Money::new(5_000, euro.clone()))?;
    }
    let chain = miner.into_chain();
    assert!(chain.is_valid());
    for block in chain.iter().skip(1) {
        let tx = block
            .content()
            .payload()
            .ok_or_else(|| anyhow::anyhow!("reward block without payload"))?;
        assert_eq!(tx.receiver, "carol");
        assert_eq!(tx.signature, identity.sign(&tx.signing_bytes()));
    }
    Ok(())
}
