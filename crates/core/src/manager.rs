//! Transaction manager: send, reprice and confirmation sweeps.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::TransactionRequest;
use tracing::{debug, info, warn};

use relay_chain::{build_unsigned, BlockTag, ChainInteractor, KeyManager};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::gas::GasPolicy;
use crate::nonce::NonceAllocator;
use crate::store::TxStore;
use crate::types::{SendRequest, SentTransaction, StoredTransaction};

/// Orchestrates the relay's on-chain transactions.
///
/// Owns the nonce allocator, shares the durable store, and signs with
/// whichever key manager holds the requested signer. The per-signer nonce
/// slot is held from poll through store+commit and released before the
/// broadcast leaves the process.
pub struct TransactionManager {
    chain: Arc<dyn ChainInteractor>,
    store: Arc<TxStore>,
    nonces: NonceAllocator,
    gas_policy: GasPolicy,
    manager_keys: Arc<KeyManager>,
    worker_keys: Arc<KeyManager>,
    config: RelayConfig,
}

impl TransactionManager {
    pub fn new(
        chain: Arc<dyn ChainInteractor>,
        store: Arc<TxStore>,
        manager_keys: Arc<KeyManager>,
        worker_keys: Arc<KeyManager>,
        config: RelayConfig,
    ) -> Self {
        let gas_policy = GasPolicy::new(
            config.retry_gas_price_factor,
            config.max_gas_price_wei as u128,
        );
        Self {
            chain,
            store,
            nonces: NonceAllocator::new(),
            gas_policy,
            manager_keys,
            worker_keys,
            config,
        }
    }

    /// Shared handle to the transaction store.
    pub fn store(&self) -> &Arc<TxStore> {
        &self.store
    }

    /// Every address the relay can sign for.
    pub fn signers(&self) -> Vec<Address> {
        let mut signers = self.manager_keys.addresses();
        signers.extend(self.worker_keys.addresses());
        signers
    }

    fn keys_for(&self, signer: Address) -> Result<&KeyManager, RelayError> {
        if self.manager_keys.is_signer(signer) {
            Ok(&self.manager_keys)
        } else if self.worker_keys.is_signer(signer) {
            Ok(&self.worker_keys)
        } else {
            Err(RelayError::UnknownSigner(signer))
        }
    }

    /// Sign, persist and broadcast a new transaction.
    ///
    /// The signer's nonce slot is locked while the nonce is polled, the
    /// transaction signed and the row stored; the network broadcast happens
    /// after the lock is released.
    pub async fn send(&self, request: SendRequest) -> Result<SentTransaction, RelayError> {
        let keys = self.keys_for(request.signer)?;

        let gas_price = match request.gas_price {
            Some(price) => price,
            None => self.chain.gas_price().await.map_err(RelayError::ChainRpc)?,
        };

        let slot = self.nonces.slot(request.signer);
        let mut slot = slot.lock().await;

        let pending = self
            .chain
            .transaction_count(request.signer, BlockTag::Pending)
            .await
            .map_err(RelayError::ChainRpc)?;
        let nonce = slot.poll(request.signer, pending);

        let unsigned = build_unsigned(
            request.destination,
            request.value,
            request.gas_limit,
            gas_price,
            request.call_data.clone(),
            nonce,
            &self.chain.raw_tx_options(),
        );
        let signed = keys
            .sign_transaction(request.signer, unsigned)
            .map_err(RelayError::Signing)?;

        let stored = StoredTransaction {
            tx_id: signed.tx_id,
            from: request.signer,
            to: request.destination,
            nonce,
            gas_limit: request.gas_limit,
            gas_price,
            value: request.value,
            data: request.call_data,
            server_action: request.server_action,
            creation_block_number: request.creation_block_number,
            boost_block_number: None,
            mined_block_number: None,
            attempts: 1,
        };
        self.store.put(stored.clone(), false)?;
        slot.commit();
        drop(slot);

        self.log_broadcast(&stored, "Broadcasting transaction");
        let returned = self
            .chain
            .broadcast_raw_transaction(&signed.raw)
            .await
            .map_err(RelayError::ChainRpc)?;
        if returned != signed.tx_id {
            // The row stays in the store; the boost sweep will pick it up.
            return Err(RelayError::HashMismatch {
                expected: signed.tx_id,
                returned,
            });
        }

        Ok(SentTransaction {
            tx_hash: returned,
            signed_bytes: signed.raw,
        })
    }

    /// Replace a stored transaction with a repriced copy of itself.
    ///
    /// Reuses the nonce the row already owns, so no nonce lock is taken.
    /// Callers must not resend the same `(from, nonce)` concurrently.
    ///
    /// The replacement is rebuilt with value 0 even when the original
    /// carried value, mirroring the relay's repricing behavior for wrapped
    /// calls.
    pub async fn resend(
        &self,
        stored: &StoredTransaction,
        current_block: u64,
        new_gas_price: u128,
        capped: bool,
    ) -> Result<SentTransaction, RelayError> {
        let keys = self.keys_for(stored.from)?;

        let unsigned = build_unsigned(
            stored.to,
            U256::ZERO,
            stored.gas_limit,
            new_gas_price,
            stored.data.clone(),
            stored.nonce,
            &self.chain.raw_tx_options(),
        );
        let signed = keys
            .sign_transaction(stored.from, unsigned)
            .map_err(RelayError::Signing)?;

        let replacement = StoredTransaction {
            tx_id: signed.tx_id,
            gas_price: new_gas_price,
            value: U256::ZERO,
            boost_block_number: Some(current_block),
            attempts: stored.attempts + 1,
            ..stored.clone()
        };

        if capped {
            warn!(
                tx_id = %replacement.tx_id,
                gas_price = new_gas_price,
                "Replacement gas price clamped to configured maximum"
            );
        }

        self.store.put(replacement.clone(), true)?;

        self.log_broadcast(&replacement, "Rebroadcasting repriced transaction");
        let returned = self
            .chain
            .broadcast_raw_transaction(&signed.raw)
            .await
            .map_err(RelayError::ChainRpc)?;
        if returned != signed.tx_id {
            return Err(RelayError::HashMismatch {
                expected: signed.tx_id,
                returned,
            });
        }

        Ok(SentTransaction {
            tx_hash: returned,
            signed_bytes: signed.raw,
        })
    }

    /// Reconcile stored rows against the chain and prune confirmed ones.
    ///
    /// Rows are visited in ascending `(from, nonce)` order; a row confirmed
    /// at depth `confirmations_needed` prunes its whole nonce prefix in one
    /// call. Chain lookup failures skip the row and continue.
    pub async fn reap_confirmed(&self, block_number: u64) -> Result<(), RelayError> {
        for row in self.store.get_all() {
            let should_recheck = match row.mined_block_number {
                None => true,
                Some(mined) => {
                    block_number.saturating_sub(mined) >= self.config.confirmations_needed
                }
            };
            if !should_recheck {
                continue;
            }

            let lookup = match self.chain.transaction_by_hash(row.tx_id).await {
                Ok(lookup) => lookup,
                Err(e) => {
                    warn!(tx_id = %row.tx_id, error = %e, "Transaction lookup failed, skipping row");
                    continue;
                }
            };
            let Some(lookup) = lookup else {
                debug!(tx_id = %row.tx_id, "Transaction not known to the node");
                continue;
            };
            let Some(mined_block) = lookup.block_number else {
                debug!(tx_id = %row.tx_id, "Transaction still pending");
                continue;
            };

            let confirmations = block_number.saturating_sub(mined_block);
            if Some(mined_block) != row.mined_block_number {
                if row.mined_block_number.is_some() {
                    warn!(
                        tx_id = %row.tx_id,
                        stored_block = row.mined_block_number,
                        chain_block = mined_block,
                        "Mined block moved, possible reorg"
                    );
                }
                if confirmations < self.config.confirmations_needed {
                    let mut updated = row.clone();
                    updated.mined_block_number = Some(mined_block);
                    self.store.put(updated, true)?;
                    continue;
                }
            }

            debug!(
                tx_id = %row.tx_id,
                from = %lookup.from,
                nonce = lookup.nonce,
                confirmations,
                "Transaction confirmed, pruning nonce prefix"
            );
            self.store.remove_txs_until_nonce(lookup.from, lookup.nonce)?;
        }
        Ok(())
    }

    /// Reprice a signer's stale pending transactions.
    ///
    /// When the oldest pending row has waited at least
    /// `pending_transaction_timeout_blocks`, every row priced below the
    /// boosted floor is resent. Returns the replacements keyed by the old
    /// tx id.
    pub async fn boost_pending(
        &self,
        signer: Address,
        current_block: u64,
    ) -> Result<HashMap<B256, SentTransaction>, RelayError> {
        let mut boosted = HashMap::new();

        let rows = self.store.get_all_by_signer(signer);
        let Some(oldest) = rows.first() else {
            return Ok(boosted);
        };

        let chain_nonce = self
            .chain
            .transaction_count(signer, BlockTag::Latest)
            .await
            .map_err(RelayError::ChainRpc)?;
        if oldest.nonce < chain_nonce {
            debug!(
                signer = %signer,
                nonce = oldest.nonce,
                chain_nonce,
                "Oldest pending transaction already mined, leaving it to the confirmation sweep"
            );
            return Ok(boosted);
        }

        let reference_block = oldest
            .boost_block_number
            .unwrap_or(oldest.creation_block_number);
        let waited = current_block.saturating_sub(reference_block);
        if waited < self.config.pending_transaction_timeout_blocks {
            return Ok(boosted);
        }

        let (new_gas_price, capped) = self.gas_policy.next_gas_price(oldest.gas_price);
        info!(
            signer = %signer,
            oldest_nonce = oldest.nonce,
            waited_blocks = waited,
            old_gas_price = oldest.gas_price,
            new_gas_price,
            capped,
            "Pending transactions stale, repricing"
        );

        for row in rows.iter().filter(|row| row.gas_price < new_gas_price) {
            let replacement = self.resend(row, current_block, new_gas_price, capped).await?;
            boosted.insert(row.tx_id, replacement);
        }

        Ok(boosted)
    }

    /// Estimate gas for a call with the configured safety margin.
    ///
    /// Falls back to `default_gas_limit` when the RPC estimation fails;
    /// the chain error is logged, never propagated.
    pub async fn estimate_gas(
        &self,
        method: &str,
        mut call: TransactionRequest,
        from: Address,
    ) -> u64 {
        call.from = Some(from);
        match self.chain.estimate_gas(&call).await {
            Ok(estimate) => (estimate as f64 * self.config.estimate_gas_factor).round() as u64,
            Err(e) => {
                warn!(
                    method,
                    error = %e,
                    default_gas_limit = self.config.default_gas_limit,
                    "Gas estimation failed, using default limit"
                );
                self.config.default_gas_limit
            }
        }
    }

    fn log_broadcast(&self, tx: &StoredTransaction, message: &'static str) {
        info!(
            tx_id = %tx.tx_id,
            from = %tx.from,
            to = %tx.to,
            value = %tx.value,
            nonce = tx.nonce,
            gas_price = tx.gas_price,
            gas_limit = tx.gas_limit,
            data_len = tx.data.len(),
            attempts = tx.attempts,
            "{}",
            message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerAction;
    use alloy::primitives::{keccak256, Bytes};
    use async_trait::async_trait;
    use relay_chain::{RawTxOptions, TxLookup};
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Test private keys (DO NOT USE IN PRODUCTION)
    const MANAGER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const WORKER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const MANAGER_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const WORKER_ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[derive(Default)]
    struct MockChain {
        gas_price: u128,
        pending_count: Mutex<u64>,
        latest_count: Mutex<u64>,
        lookups: Mutex<HashMap<B256, TxLookup>>,
        forced_broadcast_hash: Mutex<Option<B256>>,
        gas_estimate: Mutex<Option<u64>>,
        broadcasts: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl ChainInteractor for MockChain {
        async fn gas_price(&self) -> anyhow::Result<u128> {
            Ok(self.gas_price)
        }

        async fn transaction_count(&self, _address: Address, tag: BlockTag) -> anyhow::Result<u64> {
            Ok(match tag {
                BlockTag::Pending => *self.pending_count.lock().unwrap(),
                BlockTag::Latest => *self.latest_count.lock().unwrap(),
            })
        }

        async fn broadcast_raw_transaction(&self, raw: &[u8]) -> anyhow::Result<B256> {
            self.broadcasts.lock().unwrap().push(raw.to_vec());
            if let Some(forced) = *self.forced_broadcast_hash.lock().unwrap() {
                return Ok(forced);
            }
            Ok(keccak256(raw))
        }

        async fn transaction_by_hash(&self, hash: B256) -> anyhow::Result<Option<TxLookup>> {
            Ok(self.lookups.lock().unwrap().get(&hash).copied())
        }

        async fn estimate_gas(&self, _call: &TransactionRequest) -> anyhow::Result<u64> {
            self.gas_estimate
                .lock()
                .unwrap()
                .ok_or_else(|| anyhow::anyhow!("execution reverted"))
        }

        async fn block_number(&self) -> anyhow::Result<u64> {
            Ok(0)
        }

        fn raw_tx_options(&self) -> RawTxOptions {
            RawTxOptions { chain_id: 33 }
        }
    }

    struct Fixture {
        manager: TransactionManager,
        chain: Arc<MockChain>,
        store: Arc<TxStore>,
        _workdir: TempDir,
    }

    fn fixture(config: RelayConfig) -> Fixture {
        let workdir = TempDir::new().unwrap();
        let chain = Arc::new(MockChain {
            gas_price: 1_000_000_000,
            ..Default::default()
        });
        let store = Arc::new(TxStore::open(workdir.path(), false).unwrap());
        let manager_keys =
            Arc::new(KeyManager::from_private_keys(&[MANAGER_KEY.to_string()]).unwrap());
        let worker_keys =
            Arc::new(KeyManager::from_private_keys(&[WORKER_KEY.to_string()]).unwrap());
        let manager = TransactionManager::new(
            chain.clone(),
            store.clone(),
            manager_keys,
            worker_keys,
            config,
        );
        Fixture {
            manager,
            chain,
            store,
            _workdir: workdir,
        }
    }

    fn test_config() -> RelayConfig {
        RelayConfig {
            retry_gas_price_factor: 1.2,
            max_gas_price_wei: 100,
            estimate_gas_factor: 1.1,
            default_gas_limit: 300_000,
            confirmations_needed: 12,
            pending_transaction_timeout_blocks: 10,
            ..Default::default()
        }
    }

    fn manager_address() -> Address {
        MANAGER_ADDRESS.parse().unwrap()
    }

    fn worker_address() -> Address {
        WORKER_ADDRESS.parse().unwrap()
    }

    fn transfer_request(signer: Address) -> SendRequest {
        SendRequest {
            signer,
            destination: Address::repeat_byte(0xBB),
            value: U256::ZERO,
            gas_limit: 21_000,
            gas_price: Some(1_000_000_000),
            creation_block_number: 100,
            server_action: ServerAction::ValueTransfer,
            call_data: Bytes::new(),
        }
    }

    fn pending_row(signer: Address, nonce: u64, gas_price: u128) -> StoredTransaction {
        StoredTransaction {
            tx_id: B256::with_last_byte(nonce as u8),
            from: signer,
            to: Address::repeat_byte(0xBB),
            nonce,
            gas_limit: 21_000,
            gas_price,
            value: U256::ZERO,
            data: Bytes::new(),
            server_action: ServerAction::RelayCall,
            creation_block_number: 100,
            boost_block_number: None,
            mined_block_number: None,
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn test_send_assigns_chain_pending_nonce() {
        let fx = fixture(test_config());
        *fx.chain.pending_count.lock().unwrap() = 5;

        let sent = fx
            .manager
            .send(transfer_request(manager_address()))
            .await
            .unwrap();

        let rows = fx.store.get_all_by_signer(manager_address());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nonce, 5);
        assert_eq!(rows[0].attempts, 1);
        assert_eq!(rows[0].creation_block_number, 100);
        assert_eq!(rows[0].boost_block_number, None);
        assert_eq!(rows[0].tx_id, sent.tx_hash);
        assert_eq!(sent.tx_hash, keccak256(&sent.signed_bytes));

        // The allocator moved past the assigned nonce.
        fx.manager
            .send(transfer_request(manager_address()))
            .await
            .unwrap();
        let rows = fx.store.get_all_by_signer(manager_address());
        assert_eq!(rows[1].nonce, 6);
    }

    #[tokio::test]
    async fn test_send_fixes_nonce_from_chain() {
        let fx = fixture(test_config());

        *fx.chain.pending_count.lock().unwrap() = 3;
        fx.manager
            .send(transfer_request(manager_address()))
            .await
            .unwrap();

        // The chain learns of transactions the relay never sent.
        *fx.chain.pending_count.lock().unwrap() = 7;
        fx.manager
            .send(transfer_request(manager_address()))
            .await
            .unwrap();

        let rows = fx.store.get_all_by_signer(manager_address());
        assert_eq!(rows[0].nonce, 3);
        assert_eq!(rows[1].nonce, 7);
    }

    #[tokio::test]
    async fn test_concurrent_sends_get_distinct_nonces() {
        let fx = fixture(test_config());
        *fx.chain.pending_count.lock().unwrap() = 5;

        let (a, b) = tokio::join!(
            fx.manager.send(transfer_request(manager_address())),
            fx.manager.send(transfer_request(manager_address())),
        );
        a.unwrap();
        b.unwrap();

        let nonces: Vec<u64> = fx
            .store
            .get_all_by_signer(manager_address())
            .iter()
            .map(|row| row.nonce)
            .collect();
        assert_eq!(nonces, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_send_from_worker_identity() {
        let fx = fixture(test_config());
        let sent = fx
            .manager
            .send(transfer_request(worker_address()))
            .await
            .unwrap();
        assert_eq!(sent.tx_hash, keccak256(&sent.signed_bytes));
    }

    #[tokio::test]
    async fn test_send_rejects_unknown_signer() {
        let fx = fixture(test_config());
        let err = fx
            .manager
            .send(transfer_request(Address::repeat_byte(0x42)))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UnknownSigner(_)));
        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_send_queries_gas_price_when_absent() {
        let fx = fixture(test_config());
        let mut request = transfer_request(manager_address());
        request.gas_price = None;

        fx.manager.send(request).await.unwrap();

        let rows = fx.store.get_all_by_signer(manager_address());
        assert_eq!(rows[0].gas_price, 1_000_000_000);
    }

    #[tokio::test]
    async fn test_send_surfaces_hash_mismatch_and_keeps_row() {
        let fx = fixture(test_config());
        *fx.chain.forced_broadcast_hash.lock().unwrap() = Some(B256::repeat_byte(0xDE));

        let err = fx
            .manager
            .send(transfer_request(manager_address()))
            .await
            .unwrap_err();

        let expected = match err {
            RelayError::HashMismatch { expected, returned } => {
                assert_eq!(returned, B256::repeat_byte(0xDE));
                expected
            }
            other => panic!("expected hash mismatch, got {other:?}"),
        };

        // The best-effort record survives for the boost sweep.
        let rows = fx.store.get_all_by_signer(manager_address());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tx_id, expected);
    }

    #[tokio::test]
    async fn test_boost_reprices_only_underpriced_rows() {
        let fx = fixture(test_config());
        let signer = manager_address();
        for (nonce, gas_price) in [(5, 10), (6, 15), (7, 30)] {
            fx.store.put(pending_row(signer, nonce, gas_price), false).unwrap();
        }
        *fx.chain.latest_count.lock().unwrap() = 5;

        let boosted = fx.manager.boost_pending(signer, 110).await.unwrap();

        // new floor = floor(10 * 1.2) = 12; only nonce 5 is below it.
        assert_eq!(boosted.len(), 1);
        assert!(boosted.contains_key(&B256::with_last_byte(5)));

        let rows = fx.store.get_all_by_signer(signer);
        assert_eq!(rows[0].nonce, 5);
        assert_eq!(rows[0].gas_price, 12);
        assert_eq!(rows[0].attempts, 2);
        assert_eq!(rows[0].boost_block_number, Some(110));
        assert_eq!(rows[0].creation_block_number, 100);
        assert_eq!(rows[0].tx_id, keccak256(&boosted[&B256::with_last_byte(5)].signed_bytes));
        // Adequately priced rows untouched.
        assert_eq!(rows[1].gas_price, 15);
        assert_eq!(rows[2].gas_price, 30);
        assert_eq!(rows[1].attempts, 1);
    }

    #[tokio::test]
    async fn test_boost_waits_for_timeout_boundary() {
        let fx = fixture(test_config());
        let signer = manager_address();
        fx.store.put(pending_row(signer, 5, 10), false).unwrap();
        *fx.chain.latest_count.lock().unwrap() = 5;

        // One block short of the timeout: still patient.
        let boosted = fx.manager.boost_pending(signer, 109).await.unwrap();
        assert!(boosted.is_empty());
        assert_eq!(fx.store.get_all_by_signer(signer)[0].attempts, 1);

        // Exactly at the timeout: boosts.
        let boosted = fx.manager.boost_pending(signer, 110).await.unwrap();
        assert_eq!(boosted.len(), 1);
    }

    #[tokio::test]
    async fn test_boost_defers_to_reap_when_oldest_mined() {
        let fx = fixture(test_config());
        let signer = manager_address();
        fx.store.put(pending_row(signer, 5, 10), false).unwrap();
        // The chain has already mined nonce 5.
        *fx.chain.latest_count.lock().unwrap() = 6;

        let boosted = fx.manager.boost_pending(signer, 200).await.unwrap();
        assert!(boosted.is_empty());
    }

    #[tokio::test]
    async fn test_boost_uses_boost_block_as_reference() {
        let fx = fixture(test_config());
        let signer = manager_address();
        let mut row = pending_row(signer, 5, 10);
        row.boost_block_number = Some(150);
        fx.store.put(row, false).unwrap();
        *fx.chain.latest_count.lock().unwrap() = 5;

        assert!(fx.manager.boost_pending(signer, 159).await.unwrap().is_empty());
        assert_eq!(fx.manager.boost_pending(signer, 160).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_boost_clamps_at_max_gas_price() {
        let mut config = test_config();
        config.retry_gas_price_factor = 1.5;
        let fx = fixture(config);
        let signer = manager_address();
        fx.store.put(pending_row(signer, 5, 90), false).unwrap();
        *fx.chain.latest_count.lock().unwrap() = 5;

        let boosted = fx.manager.boost_pending(signer, 110).await.unwrap();

        assert_eq!(boosted.len(), 1);
        let rows = fx.store.get_all_by_signer(signer);
        // floor(90 * 1.5) = 135, clamped to the configured 100.
        assert_eq!(rows[0].gas_price, 100);
    }

    #[tokio::test]
    async fn test_resend_drops_value_and_preserves_bookkeeping() {
        let fx = fixture(test_config());
        let signer = manager_address();
        let mut row = pending_row(signer, 5, 10);
        row.value = U256::from(7u64);
        row.mined_block_number = Some(101);
        fx.store.put(row.clone(), false).unwrap();

        fx.manager.resend(&row, 110, 12, false).await.unwrap();

        let rows = fx.store.get_all_by_signer(signer);
        assert_eq!(rows[0].value, U256::ZERO);
        assert_eq!(rows[0].mined_block_number, Some(101));
        assert_eq!(rows[0].server_action, ServerAction::RelayCall);
        assert_eq!(rows[0].attempts, 2);
        assert_ne!(rows[0].tx_id, row.tx_id);
    }

    #[tokio::test]
    async fn test_reap_prunes_confirmed_prefix() {
        let fx = fixture(test_config());
        let signer = manager_address();
        for nonce in 5..=7 {
            fx.store.put(pending_row(signer, nonce, 10), false).unwrap();
        }
        // Only nonce 7 is known to the node, mined at block 100.
        fx.chain.lookups.lock().unwrap().insert(
            B256::with_last_byte(7),
            TxLookup {
                from: signer,
                nonce: 7,
                block_number: Some(100),
            },
        );

        fx.manager.reap_confirmed(112).await.unwrap();

        assert!(fx.store.get_all_by_signer(signer).is_empty());
    }

    #[tokio::test]
    async fn test_reap_records_shallow_mining_without_pruning() {
        let fx = fixture(test_config());
        let signer = manager_address();
        fx.store.put(pending_row(signer, 5, 10), false).unwrap();
        fx.chain.lookups.lock().unwrap().insert(
            B256::with_last_byte(5),
            TxLookup {
                from: signer,
                nonce: 5,
                block_number: Some(100),
            },
        );

        // 11 confirmations with 12 needed: bookkeeping only.
        fx.manager.reap_confirmed(111).await.unwrap();

        let rows = fx.store.get_all_by_signer(signer);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mined_block_number, Some(100));

        // One block later the prefix is pruned.
        fx.manager.reap_confirmed(112).await.unwrap();
        assert!(fx.store.get_all_by_signer(signer).is_empty());
    }

    #[tokio::test]
    async fn test_reap_skips_unknown_transactions() {
        let fx = fixture(test_config());
        let signer = manager_address();
        fx.store.put(pending_row(signer, 5, 10), false).unwrap();

        fx.manager.reap_confirmed(500).await.unwrap();

        assert_eq!(fx.store.get_all_by_signer(signer).len(), 1);
    }

    #[tokio::test]
    async fn test_estimate_gas_applies_margin() {
        let fx = fixture(test_config());
        *fx.chain.gas_estimate.lock().unwrap() = Some(100_000);

        let limit = fx
            .manager
            .estimate_gas("relayCall", TransactionRequest::default(), manager_address())
            .await;
        assert_eq!(limit, 110_000);
    }

    #[tokio::test]
    async fn test_estimate_gas_falls_back_on_error() {
        let fx = fixture(test_config());

        let limit = fx
            .manager
            .estimate_gas("relayCall", TransactionRequest::default(), manager_address())
            .await;
        assert_eq!(limit, 300_000);
    }

    #[tokio::test]
    async fn test_signers_lists_both_identities() {
        let fx = fixture(test_config());
        let signers = fx.manager.signers();
        assert_eq!(signers, vec![manager_address(), worker_address()]);
    }
}
