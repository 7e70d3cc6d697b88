//! Who a miner mines for.
//!
//! Key material never enters the core. A wallet living outside this crate
//! hands the miner something that can name itself and sign bytes.

/// Capability a key holder exposes to the ledger.
pub trait Identity: Send + Sync {
    /// Opaque, stable identifier used as the recipient of rewards.
    fn public_identifier(&self) -> String;

    /// Signature over `message` in the holder's own scheme.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}
