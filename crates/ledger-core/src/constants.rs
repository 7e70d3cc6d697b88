pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_BITS: u32 = (HASH_SIZE * BYTE) as u32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Genesis blocks are stamped at the Unix epoch so every chain shares one root.
pub const GENESIS_TIMESTAMP: u64 = 0;

pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Attempts between two reads of a miner's cancel flag.
pub const CANCEL_CHECK_INTERVAL: u64 = 1 << 10;
pub const PROGRESS_LOG_INTERVAL: u64 = 1 << 20;
