mod wallet;

use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::{
    constants::DEFAULT_DIFFICULTY, Block, Chain, Currency, LedgerError, Miner, MinerConfig,
    Money, Payload, Transaction,
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::wallet::KeyPairWallet;

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "Mine, print and verify a local hash-linked ledger")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug, Clone)]
struct MiningArgs {
    /// Required leading zero bits of every block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: u32,
    /// Number of blocks to mine on top of genesis
    #[arg(long, default_value_t = 3)]
    blocks: usize,
    /// Fixed block timestamp in Unix milliseconds (defaults to now)
    #[arg(long)]
    timestamp: Option<u64>,
    /// Abandon mining after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Split each nonce search across all cores
    #[arg(long)]
    parallel: bool,
    /// Print the chain as JSON
    #[arg(long)]
    json: bool,
}

impl MiningArgs {
    fn config(&self) -> Result<MinerConfig> {
        let config = MinerConfig::new(self.difficulty)?;
        Ok(match self.timestamp {
            Some(ts) => config.with_timestamp(ts),
            None => config,
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mine blocks carrying a text payload
    Mine {
        #[command(flatten)]
        mining: MiningArgs,
        /// Payload of every mined block
        #[arg(long, default_value = "hello")]
        payload: String,
    },
    /// Mine reward blocks paid to a freshly generated wallet
    Reward {
        #[command(flatten)]
        mining: MiningArgs,
        /// Reward per block in minor units (cents)
        #[arg(long, default_value_t = 5_000)]
        amount: u64,
        /// Currency code: EUR, USD or any other abbreviation
        #[arg(long, default_value = "EUR")]
        currency: String,
    },
    /// Mine a chain, bump one block's nonce in a copy and locate the damage
    Tamper {
        #[command(flatten)]
        mining: MiningArgs,
        /// Block whose nonce is changed
        #[arg(long, default_value_t = 1)]
        index: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.cmd {
        Command::Mine { mining, payload } => {
            let miner = Miner::new(mining.config()?);
            let parallel = mining.parallel;
            let chain = run_miner(miner, &mining, move |miner| {
                mine_one(miner, payload.clone(), parallel)
            })
            .await?;
            report(&chain, mining.json)?;
        }
        Command::Reward {
            mining,
            amount,
            currency,
        } => {
            let wallet = Arc::new(KeyPairWallet::generate());
            let miner = Miner::<Transaction>::new(mining.config()?).with_identity(wallet.clone());
            let reward = Money::new(amount, currency_for(&currency));
            let chain = run_miner(miner, &mining, move |miner| {
                miner.mine_reward(reward.clone()).map(|_| ())
            })
            .await?;
            report(&chain, mining.json)?;

            for block in chain.iter().skip(1) {
                if let Some(tx) = block.content().payload() {
                    let signed = wallet.verify(&tx.signing_bytes(), &tx.signature);
                    info!(hash = %block.hash(), %tx, signed, "reward");
                    if !signed {
                        bail!("reward in block {} carries a bad signature", block.hash());
                    }
                }
            }
        }
        Command::Tamper { mining, index } => {
            let miner = Miner::new(mining.config()?);
            let parallel = mining.parallel;
            let mut counter = 0usize;
            let chain = run_miner(miner, &mining, move |miner| {
                counter += 1;
                mine_one(miner, format!("block {counter}"), parallel)
            })
            .await?;
            report(&chain, mining.json)?;

            let tampered = bump_nonce(&chain, index)?;
            match tampered.first_invalid_index() {
                Some(bad) => println!("tampered copy fails validation at block {bad}"),
                None => bail!("tampering with block {index} went unnoticed"),
            }
        }
    }
    Ok(())
}

fn mine_one<P: Payload>(
    miner: &mut Miner<P>,
    payload: P,
    parallel: bool,
) -> Result<(), LedgerError> {
    if parallel {
        miner.mine_parallel(payload)?;
    } else {
        miner.mine(payload)?;
    }
    Ok(())
}

/// Runs `mining.blocks` mining steps on the blocking pool. Ctrl-C or the
/// configured timeout cancels the search in progress.
async fn run_miner<P, F>(miner: Miner<P>, mining: &MiningArgs, mut step: F) -> Result<Chain<P>>
where
    P: Payload + Send + 'static,
    F: FnMut(&mut Miner<P>) -> Result<(), LedgerError> + Send + 'static,
{
    let cancel = miner.cancel_flag();
    let blocks = mining.blocks;
    info!(blocks, difficulty = mining.difficulty, "mining");

    let mut task = tokio::task::spawn_blocking(move || {
        let mut miner = miner;
        for _ in 0..blocks {
            step(&mut miner)?;
        }
        Ok::<_, LedgerError>(miner.into_chain())
    });

    let timeout = mining.timeout_secs;
    let deadline = async move {
        match timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        joined = &mut task => {
            return Ok(joined.context("mining task panicked")??);
        }
        _ = tokio::signal::ctrl_c() => warn!("interrupted, cancelling search"),
        _ = deadline => warn!(secs = timeout, "timed out, cancelling search"),
    }

    cancel.cancel();
    let chain = task.await.context("mining task panicked")??;
    Ok(chain)
}

fn report<P>(chain: &Chain<P>, json: bool) -> Result<()>
where
    P: Payload + Serialize,
{
    if json {
        println!("{}", serde_json::to_string_pretty(chain)?);
    } else {
        println!("{chain}");
    }
    chain.ensure_valid()?;
    println!("chain of {} blocks is valid, head {}", chain.len(), chain.head_hash());
    Ok(())
}

/// Copy of `chain` with the nonce of block `index` bumped and its stored hash kept.
fn bump_nonce<P: Payload>(chain: &Chain<P>, index: usize) -> Result<Chain<P>> {
    let target = chain.get(index)?;
    let content = target.content().clone();
    let nonce = content.nonce().wrapping_add(1);

    let mut blocks = chain.blocks().to_vec();
    blocks[index] = Block::from_parts(content.with_nonce(nonce), *target.hash());
    Ok(Chain::from_blocks(blocks)?)
}

fn currency_for(code: &str) -> Currency {
    match code.to_ascii_uppercase().as_str() {
        "EUR" => Currency::new("Euro", '€', "EUR"),
        "USD" => Currency::new("Dollar", '$', "USD"),
        other => Currency::new(other, '¤', other),
    }
}
