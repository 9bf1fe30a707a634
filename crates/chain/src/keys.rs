//! Key management for the relay's signing identities.
//!
//! A [`KeyManager`] holds the private keys of one identity group (the manager
//! account, or the worker accounts). Keys are parsed once at startup and are
//! immutable afterwards; they never leave the process.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, B256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, Result};
use tracing::info;

/// A signed raw transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedRawTx {
    /// RLP-encoded signed transaction bytes.
    pub raw: Bytes,
    /// keccak-256 of `raw`; the hash the node will report back.
    pub tx_id: B256,
}

/// Holds the signing keys of one relay identity group.
pub struct KeyManager {
    signers: Vec<PrivateKeySigner>,
}

impl KeyManager {
    /// Create a key manager from hex-encoded private keys (with or without
    /// a `0x` prefix).
    pub fn from_private_keys(keys: &[String]) -> Result<Self> {
        if keys.is_empty() {
            return Err(anyhow!("key manager needs at least one private key"));
        }

        let signers = keys
            .iter()
            .map(|key| {
                key.trim_start_matches("0x")
                    .parse::<PrivateKeySigner>()
                    .map_err(|e| anyhow!("invalid private key: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(accounts = signers.len(), "Key manager initialized");

        Ok(Self { signers })
    }

    /// Address of the key at `index`, if present.
    pub fn address(&self, index: usize) -> Option<Address> {
        self.signers.get(index).map(|s| s.address())
    }

    /// All addresses held by this manager.
    pub fn addresses(&self) -> Vec<Address> {
        self.signers.iter().map(|s| s.address()).collect()
    }

    /// Whether this manager holds the key for `address`.
    pub fn is_signer(&self, address: Address) -> bool {
        self.signers.iter().any(|s| s.address() == address)
    }

    /// Sign an unsigned transaction with the key owning `signer` and encode
    /// it for broadcast.
    pub fn sign_transaction(&self, signer: Address, mut tx: TxLegacy) -> Result<SignedRawTx> {
        let key = self
            .signers
            .iter()
            .find(|s| s.address() == signer)
            .ok_or_else(|| anyhow!("signer {signer} is not held by this key manager"))?;

        let signature = key.sign_transaction_sync(&mut tx)?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        let tx_id = *envelope.tx_hash();
        let raw = envelope.encoded_2718();

        Ok(SignedRawTx {
            raw: raw.into(),
            tx_id,
        })
    }
}
