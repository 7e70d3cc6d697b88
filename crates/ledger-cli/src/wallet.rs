//! secp256k1 key pair acting as a miner's identity.

use ledger_core::{sha256, Identity};
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};

pub struct KeyPairWallet {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPairWallet {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self {
            secp,
            secret,
            public,
        }
    }

    /// Checks a DER signature produced by [`Identity::sign`] on this wallet.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(sig) = Signature::from_der(signature) else {
            return false;
        };
        self.secp
            .verify_ecdsa(&digest(message), &sig, &self.public)
            .is_ok()
    }
}

fn digest(message: &[u8]) -> Message {
    Message::from_digest(*sha256(message).as_bytes())
}

impl Identity for KeyPairWallet {
    /// Hex of the compressed public key.
    fn public_identifier(&self) -> String {
        hex::encode(self.public.serialize())
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.secp
            .sign_ecdsa(&digest(message), &self.secret)
            .serialize_der()
            .to_vec()
    }
}
