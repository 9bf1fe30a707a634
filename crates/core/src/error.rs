//! Error kinds surfaced by the transaction core.

use alloy::primitives::{Address, B256};
use thiserror::Error;

/// Failures of transaction-core operations.
///
/// Chain observation errors inside the confirmation sweep are logged and
/// skipped rather than surfaced; everything here reaches the caller.
#[derive(Debug, Error)]
pub enum RelayError {
    /// No key manager owns the requested signer.
    #[error("no key manager owns signer {0}")]
    UnknownSigner(Address),

    /// The store already holds a row for this `(signer, nonce)`.
    #[error("transaction for signer {signer} with nonce {nonce} is already stored")]
    DuplicateNonce { signer: Address, nonce: u64 },

    /// The node reported a different hash than the locally signed one.
    #[error("node returned hash {returned} for a transaction signed as {expected}")]
    HashMismatch { expected: B256, returned: B256 },

    /// A chain RPC call failed.
    #[error("chain rpc failed: {0}")]
    ChainRpc(#[source] anyhow::Error),

    /// Transaction signing failed.
    #[error("signing failed: {0}")]
    Signing(#[source] anyhow::Error),

    /// The durable store could not be written.
    #[error("transaction store io: {0}")]
    StoreIo(#[from] std::io::Error),

    /// A store row could not be encoded or decoded.
    #[error("transaction store encoding: {0}")]
    StoreEncode(#[from] serde_json::Error),
}
