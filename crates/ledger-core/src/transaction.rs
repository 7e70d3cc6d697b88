//! Transfer records carried as block payloads.
//!
//! These types only need to round-trip through the canonical encoding; the
//! ledger does not check balances or signatures.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    encode::{Decode, Encode, Reader},
    error::DecodeError,
    identity::Identity,
};

pub type Address = String;

/// Sender of freshly minted rewards.
pub const COINBASE: &str = "coinbase";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// e.g. "Euro"
    pub name: String,
    pub symbol: char,
    /// e.g. "EUR"
    pub abbreviation: String,
}

impl Currency {
    pub fn new(name: impl Into<String>, symbol: char, abbreviation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol,
            abbreviation: abbreviation.into(),
        }
    }
}

/// An amount in hundredths of `currency`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub minor_units: u64,
    pub currency: Currency,
}

impl Money {
    pub fn new(minor_units: u64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}.{:02}",
            self.currency.symbol,
            self.minor_units / 100,
            self.minor_units % 100
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub receiver: Address,
    pub amount: Money,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// An unsigned transfer.
    pub fn new(sender: impl Into<Address>, receiver: impl Into<Address>, amount: Money) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            signature: Vec::new(),
        }
    }

    /// A coinbase transfer to `identity`, signed by it.
    pub fn reward(identity: &dyn Identity, amount: Money) -> Self {
        Self::new(COINBASE, identity.public_identifier(), amount).signed_by(identity)
    }

    pub fn signed_by(mut self, identity: &dyn Identity) -> Self {
        self.signature = identity.sign(&self.signing_bytes());
        self
    }

    /// Everything but the signature, canonically encoded.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.sender.encode_to(&mut out);
        self.receiver.encode_to(&mut out);
        self.amount.encode_to(&mut out);
        out
    }

    pub fn is_reward(&self) -> bool {
        self.sender == COINBASE
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.receiver, self.amount)
    }
}

impl Encode for Currency {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.name.encode_to(out);
        self.symbol.encode_to(out);
        self.abbreviation.encode_to(out);
    }
}

impl Decode for Currency {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            name: String::decode_from(reader)?,
            symbol: char::decode_from(reader)?,
            abbreviation: String::decode_from(reader)?,
        })
    }
}

impl Encode for Money {
    fn encode_to(&self, out: &mut Vec<u8>) {
        self.minor_units.encode_to(out);
        self.currency.encode_to(out);
    }
}

impl Decode for Money {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            minor_units: u64::decode_from(reader)?,
            currency: Currency::decode_from(reader)?,
        })
    }
}

impl Encode for Transaction {
    fn encode_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signing_bytes());
        self.signature.encode_to(out);
    }
}

impl Decode for Transaction {
    fn decode_from(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: String::decode_from(reader)?,
            receiver: String::decode_from(reader)?,
            amount: Money::decode_from(reader)?,
            signature: Vec::<u8>::decode_from(reader)?,
        })
    }
}
