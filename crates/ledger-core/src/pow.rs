//! Proof-of-work: the leading-zero-bit predicate and the nonce search.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    block::{Block, BlockContent},
    constants::{
        BYTE, CANCEL_CHECK_INTERVAL, DEFAULT_DIFFICULTY, HASH_BITS, PROGRESS_LOG_INTERVAL,
    },
    encode::{Encode, Payload},
    error::LedgerError,
    hash::{sha256, Hash},
};

const NONCE_SIZE: usize = std::mem::size_of::<u64>();

/// Required number of leading zero bits, checked against the hash width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Difficulty(u32);

impl Difficulty {
    pub fn new(bits: u32) -> Result<Self, LedgerError> {
        if bits > HASH_BITS {
            return Err(LedgerError::InvalidDifficulty {
                requested: bits,
                max: HASH_BITS,
            });
        }
        Ok(Self(bits))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Mean number of hashes needed to meet this difficulty.
    pub fn expected_attempts(self) -> f64 {
        2f64.powi(self.0 as i32)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self(DEFAULT_DIFFICULTY)
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = LedgerError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bits", self.0)
    }
}

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash.as_bytes() {
        if *b == 0 {
            total += BYTE as u32;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// True iff `hash`, read as a big-endian bit string, starts with at least
/// `required_leading_zero_bits` zeros. Thresholds above 256 never match.
pub fn satisfies(hash: &Hash, required_leading_zero_bits: u32) -> bool {
    count_leading_zero_bits(hash) >= required_leading_zero_bits
}

/// Shared stop signal for a running nonce search.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Once set the flag stays set until [`CancelFlag::reset`].
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Content encoding with the trailing nonce patched in place, so each attempt
/// only rewrites eight bytes before hashing.
struct NonceBuffer {
    bytes: Vec<u8>,
    nonce_at: usize,
}

impl NonceBuffer {
    fn new<P: Encode>(content: &BlockContent<P>) -> Self {
        let bytes = content.encode();
        let nonce_at = bytes.len() - NONCE_SIZE;
        Self { bytes, nonce_at }
    }

    fn hash_with(&mut self, nonce: u64) -> Hash {
        self.bytes[self.nonce_at..].copy_from_slice(&nonce.to_be_bytes());
        sha256(&self.bytes)
    }
}

/// Increments the nonce of `content`, starting from its current value, until
/// the content hash meets `difficulty`.
///
/// The cancel flag is read every [`CANCEL_CHECK_INTERVAL`] attempts, starting
/// before the first one. Running past `u64::MAX` is reported as
/// [`LedgerError::NonceExhausted`] rather than wrapping.
pub fn search<P: Payload>(
    mut content: BlockContent<P>,
    difficulty: Difficulty,
    cancel: &CancelFlag,
) -> Result<Block<P>, LedgerError> {
    let mut buffer = NonceBuffer::new(&content);
    let mut nonce = content.nonce;
    let mut attempts = 0u64;

    loop {
        if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            warn!(attempts, nonce, "nonce search cancelled");
            return Err(LedgerError::Cancelled { attempts });
        }

        let hash = buffer.hash_with(nonce);
        attempts = attempts.saturating_add(1);

        if satisfies(&hash, difficulty.bits()) {
            content.nonce = nonce;
            debug!(nonce, attempts, %hash, "found nonce");
            return Ok(Block { content, hash });
        }
        if attempts % PROGRESS_LOG_INTERVAL == 0 {
            debug!(nonce, attempts, %hash, "still searching");
        }

        nonce = match nonce.checked_add(1) {
            Some(next) => next,
            None => {
                warn!(attempts, %difficulty, "nonce space exhausted");
                return Err(LedgerError::NonceExhausted {
                    difficulty: difficulty.bits(),
                });
            }
        };
    }
}

/// Same contract as [`search`] with the nonce space split across the rayon
/// pool. Any satisfying nonce may win, not necessarily the smallest, and the
/// attempt count reported on cancellation is approximate.
pub fn search_parallel<P: Payload>(
    content: BlockContent<P>,
    difficulty: Difficulty,
    cancel: &CancelFlag,
) -> Result<Block<P>, LedgerError> {
    let template = NonceBuffer::new(&content);
    let checked = AtomicU64::new(0);

    let found = (content.nonce..=u64::MAX)
        .into_par_iter()
        .map_init(
            || NonceBuffer {
                bytes: template.bytes.clone(),
                nonce_at: template.nonce_at,
            },
            |buffer, nonce| {
                if nonce % CANCEL_CHECK_INTERVAL == 0 {
                    checked.fetch_add(CANCEL_CHECK_INTERVAL, Ordering::Relaxed);
                    if cancel.is_cancelled() {
                        return Some(None);
                    }
                }
                let hash = buffer.hash_with(nonce);
                satisfies(&hash, difficulty.bits()).then_some(Some((nonce, hash)))
            },
        )
        .find_map_any(|outcome| outcome);

    match found {
        Some(Some((nonce, hash))) => {
            debug!(nonce, %hash, "found nonce in parallel search");
            Ok(Block {
                content: content.with_nonce(nonce),
                hash,
            })
        }
        Some(None) => {
            let attempts = checked.load(Ordering::Relaxed);
            warn!(attempts, "parallel nonce search cancelled");
            Err(LedgerError::Cancelled { attempts })
        }
        None => {
            warn!(%difficulty, "nonce space exhausted");
            Err(LedgerError::NonceExhausted {
                difficulty: difficulty.bits(),
            })
        }
    }
}
