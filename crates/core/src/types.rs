//! Core data model for in-flight relay transactions.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

/// Why the relay sent a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerAction {
    /// A wrapped user meta-transaction forwarded to the verifier.
    RelayCall,
    /// Hash approval registration on the verifier contract.
    SetHashApproval,
    /// Withdrawal of accumulated deposits.
    DepositWithdraw,
    /// Plain value transfer between relay accounts.
    ValueTransfer,
}

/// One in-flight chain transaction, as persisted by the store.
///
/// `(from, nonce)` is unique across the store; per signer the stored nonces
/// form a contiguous prefix above the chain-confirmed base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTransaction {
    /// keccak-256 of the signed transaction bytes.
    pub tx_id: B256,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Gas price in wei.
    pub gas_price: u128,
    /// Value in wei.
    pub value: U256,
    pub data: Bytes,
    pub server_action: ServerAction,
    /// Block height at first broadcast.
    pub creation_block_number: u64,
    /// Block height of the most recent repricing, if any.
    pub boost_block_number: Option<u64>,
    /// Block height at which a mined lookup was first observed.
    pub mined_block_number: Option<u64>,
    /// Broadcast count, including boosts.
    pub attempts: u32,
}

/// A request to put a call on chain.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub signer: Address,
    pub destination: Address,
    /// Value in wei, zero for plain calls.
    pub value: U256,
    pub gas_limit: u64,
    /// Gas price in wei; fetched from the chain when absent.
    pub gas_price: Option<u128>,
    pub creation_block_number: u64,
    pub server_action: ServerAction,
    /// Pre-encoded call data, empty for value transfers.
    pub call_data: Bytes,
}

/// Outcome of a successful send or resend.
#[derive(Debug, Clone)]
pub struct SentTransaction {
    pub tx_hash: B256,
    pub signed_bytes: Bytes,
}
