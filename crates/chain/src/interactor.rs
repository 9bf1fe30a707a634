//! Chain interactor abstraction.
//!
//! The transaction manager talks to the chain exclusively through this trait,
//! which keeps the JSON-RPC transport swappable and lets tests run against an
//! in-memory implementation.

use alloy::primitives::{Address, B256};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;

/// Block tag for account nonce queries.
///
/// `Pending` includes mempool transactions, `Latest` only mined ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
}

/// Chain-wide parameters applied to every raw transaction.
#[derive(Debug, Clone, Copy)]
pub struct RawTxOptions {
    /// EIP-155 chain id included in every signature.
    pub chain_id: u64,
}

/// The subset of a chain transaction the confirmation sweep needs.
#[derive(Debug, Clone, Copy)]
pub struct TxLookup {
    pub from: Address,
    pub nonce: u64,
    /// Inclusion block, `None` while the transaction sits in the mempool.
    pub block_number: Option<u64>,
}

/// RPC surface the relay core depends on.
#[async_trait]
pub trait ChainInteractor: Send + Sync {
    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<u128>;

    /// Outgoing transaction count for an account at the given tag.
    async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64>;

    /// Submit a signed raw transaction, returning the hash the node computed.
    async fn broadcast_raw_transaction(&self, raw: &[u8]) -> Result<B256>;

    /// Look up a transaction by hash; `None` if the node does not know it.
    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TxLookup>>;

    /// Estimate gas for a call.
    async fn estimate_gas(&self, call: &TransactionRequest) -> Result<u64>;

    /// Current head block number.
    async fn block_number(&self) -> Result<u64>;

    /// Parameters for building raw transactions on this chain.
    fn raw_tx_options(&self) -> RawTxOptions;
}
