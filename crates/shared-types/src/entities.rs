//! # Core Domain Entities
//!
//! Primitive identifiers and the envelope transaction shared by the staking
//! module and the application bridge.
//!
//! ## Clusters
//!
//! - **Identity**: `Address`, `PublicKey`, derived validator addresses
//! - **Chain**: `Transaction`, `ValidatorUpdate`
//! - **Digests**: `Hash`, `AppHash`

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use sha2::{Digest, Sha256};

// Re-export U256 from primitive-types for balances and fees
pub use primitive_types::U256;

/// A 32-byte digest (sub-store roots, transaction hashes).
pub type Hash = [u8; 32];

/// The 20-byte composite commitment returned to the consensus engine.
pub type AppHash = [u8; 20];

/// A 32-byte Ed25519 public key.
pub type PublicKey = [u8; 32];

/// A 20-byte Ethereum-style address.
pub type Address = [u8; 20];

/// The all-zero address. Never a valid owner.
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Recipient that marks a transaction as a native (staking/governance) call
/// rather than an execution-engine call.
pub const NATIVE_MODULE_ADDRESS: Address = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x10, 0x00,
];

/// Consensus-side address of a validator key: the first 20 bytes of
/// SHA-256(pubkey). Ordering of validator sets is defined on this value.
pub fn pubkey_address(pub_key: &PublicKey) -> Address {
    let digest = Sha256::digest(pub_key);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[..20]);
    address
}

/// Render an address as `0x`-prefixed lowercase hex.
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address))
}

/// A transaction as received from the consensus engine.
///
/// Engine transactions carry arbitrary calldata; native transactions are sent
/// to [`NATIVE_MODULE_ADDRESS`] and carry a JSON payload in `data`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Recipient address (None for contract creation).
    #[serde(default)]
    #[serde_as(as = "Option<Hex>")]
    pub to: Option<Address>,
    /// Transferred value in base units.
    #[serde(default)]
    pub value: U256,
    /// Sender's nonce.
    pub nonce: u64,
    /// Gas price in base units.
    #[serde(default)]
    pub gas_price: U256,
    /// Gas limit for this transaction.
    #[serde(default)]
    pub gas_limit: u64,
    /// Chain id the signature commits to.
    pub chain_id: u64,
    /// Payload (contract calldata or native JSON).
    #[serde(default)]
    #[serde_as(as = "Hex")]
    pub data: Vec<u8>,
    /// Signature bytes, opaque to this layer.
    #[serde(default)]
    #[serde_as(as = "Hex")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Decode a transaction from its wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode a transaction to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        // Serializing plain data with string keys cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Content hash. Identical content always yields the identical hash.
    pub fn hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        if let Some(to) = &self.to {
            hasher.update(to);
        }
        let mut value_bytes = [0u8; 32];
        self.value.to_big_endian(&mut value_bytes);
        hasher.update(value_bytes);
        hasher.update(self.nonce.to_le_bytes());
        let mut gas_price_bytes = [0u8; 32];
        self.gas_price.to_big_endian(&mut gas_price_bytes);
        hasher.update(gas_price_bytes);
        hasher.update(self.gas_limit.to_le_bytes());
        hasher.update(self.chain_id.to_le_bytes());
        hasher.update((self.data.len() as u64).to_le_bytes());
        hasher.update(&self.data);
        hasher.update(&self.signature);
        hasher.finalize().into()
    }

    /// Whether this transaction targets the native modules.
    pub fn is_native(&self) -> bool {
        self.to == Some(NATIVE_MODULE_ADDRESS)
    }
}

/// A validator power change reported to the consensus engine.
///
/// `power == 0` removes the validator.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    #[serde_as(as = "Hex")]
    pub pub_key: PublicKey,
    pub power: u64,
}

impl ValidatorUpdate {
    pub fn new(pub_key: PublicKey, power: u64) -> Self {
        Self { pub_key, power }
    }

    /// A removal entry for `pub_key`.
    pub fn removal(pub_key: PublicKey) -> Self {
        Self { pub_key, power: 0 }
    }

    pub fn address(&self) -> Address {
        pubkey_address(&self.pub_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native_tx(nonce: u64) -> Transaction {
        Transaction {
            to: Some(NATIVE_MODULE_ADDRESS),
            value: U256::zero(),
            nonce,
            gas_price: U256::zero(),
            gas_limit: 0,
            chain_id: 7,
            data: br#"{"type":"stake/activateCandidacy"}"#.to_vec(),
            signature: vec![1; 20],
        }
    }

    #[test]
    fn test_pubkey_address_is_stable() {
        let pk = [7u8; 32];
        assert_eq!(pubkey_address(&pk), pubkey_address(&pk));
        assert_ne!(pubkey_address(&pk), pubkey_address(&[8u8; 32]));
    }

    #[test]
    fn test_transaction_wire_form() {
        let tx = native_tx(3);
        let decoded = Transaction::decode(&tx.encode()).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.is_native());
    }

    #[test]
    fn test_byte_fields_serialize_as_plain_hex() {
        let update = ValidatorUpdate::new([0xab; 32], 10);
        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json["pub_key"], serde_json::json!("ab".repeat(32)));

        let raw = br#"{"nonce":0,"chain_id":7,"signature":"0a0b"}"#;
        let tx = Transaction::decode(raw).unwrap();
        assert_eq!(tx.to, None);
        assert!(tx.data.is_empty());
        assert_eq!(tx.signature, vec![0x0a, 0x0b]);

        let short = br#"{"nonce":0,"chain_id":7,"to":"0a0b"}"#;
        assert!(Transaction::decode(short).is_err());
    }

    #[test]
    fn test_transaction_hash_covers_nonce() {
        assert_eq!(native_tx(1).hash(), native_tx(1).hash());
        assert_ne!(native_tx(1).hash(), native_tx(2).hash());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Transaction::decode(b"\x00\x01not-json").is_err());
    }

    #[test]
    fn test_format_address() {
        let mut addr = ZERO_ADDRESS;
        addr[19] = 0xab;
        assert_eq!(
            format_address(&addr),
            "0x00000000000000000000000000000000000000ab"
        );
    }
}
