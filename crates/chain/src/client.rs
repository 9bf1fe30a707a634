//! Alloy-backed chain client.
//! Uses Alloy providers for type-safe RPC interactions.

use alloy::consensus::Transaction as _;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::interactor::{BlockTag, ChainInteractor, RawTxOptions, TxLookup};

/// HTTP JSON-RPC chain client.
///
/// Holds the endpoint URL and builds a provider per call; the chain id is
/// fetched once at connect time and reused for every raw transaction.
pub struct RpcChainClient {
    url: String,
    options: RawTxOptions,
}

impl RpcChainClient {
    /// Connect to an RPC endpoint and verify it responds.
    pub async fn connect(url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(url.parse()?);
        let chain_id = provider.get_chain_id().await?;
        let block = provider.get_block_number().await?;

        info!(url, chain_id, block, "Chain client connected");

        Ok(Self {
            url: url.to_string(),
            options: RawTxOptions { chain_id },
        })
    }

    /// The RPC endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChainInteractor for RpcChainClient {
    async fn gas_price(&self) -> Result<u128> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        Ok(provider.get_gas_price().await?)
    }

    async fn transaction_count(&self, address: Address, tag: BlockTag) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let call = provider.get_transaction_count(address);
        let count = match tag {
            BlockTag::Pending => call.pending().await?,
            BlockTag::Latest => call.latest().await?,
        };
        Ok(count)
    }

    async fn broadcast_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let pending = provider.send_raw_transaction(raw).await?;
        Ok(*pending.tx_hash())
    }

    async fn transaction_by_hash(&self, hash: B256) -> Result<Option<TxLookup>> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        let Some(tx) = provider.get_transaction_by_hash(hash).await? else {
            return Ok(None);
        };
        Ok(Some(TxLookup {
            from: tx.from(),
            nonce: tx.nonce(),
            block_number: tx.block_number,
        }))
    }

    async fn estimate_gas(&self, call: &TransactionRequest) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        Ok(provider.estimate_gas(call.clone()).await?)
    }

    async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.url.parse()?);
        Ok(provider.get_block_number().await?)
    }

    fn raw_tx_options(&self) -> RawTxOptions {
        self.options
    }
}
