//! Durable store for in-flight transactions.
//!
//! Rows are keyed by `(from, nonce)` and held in an ordered in-memory index
//! backed by a single JSON file under the workdir. Every mutation rewrites
//! the file to a temporary path and renames it into place, so a successful
//! call is durable before it returns and a crash mid-write leaves the
//! previous snapshot intact.

use alloy::primitives::Address;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RelayError;
use crate::types::StoredTransaction;

/// File name of the persisted transaction collection under the workdir.
pub const STORE_FILE: &str = "transactions.json";

type Key = (Address, u64);

/// Ordered, durable collection of in-flight transactions.
pub struct TxStore {
    path: PathBuf,
    inner: Mutex<BTreeMap<Key, StoredTransaction>>,
}

impl TxStore {
    /// Open the store under `workdir`, creating the directory if needed.
    ///
    /// In `dev_mode` any existing store file is erased first; otherwise the
    /// persisted rows are loaded back into the index.
    pub fn open(workdir: impl AsRef<Path>, dev_mode: bool) -> Result<Self, RelayError> {
        let workdir = workdir.as_ref();
        fs::create_dir_all(workdir)?;
        let path = workdir.join(STORE_FILE);

        if dev_mode && path.exists() {
            fs::remove_file(&path)?;
            info!(path = %path.display(), "Dev mode: erased transaction store");
        }

        let mut index = BTreeMap::new();
        if path.exists() {
            let rows: Vec<StoredTransaction> = serde_json::from_str(&fs::read_to_string(&path)?)?;
            for row in rows {
                index.insert((row.from, row.nonce), row);
            }
            info!(rows = index.len(), path = %path.display(), "Transaction store loaded");
        }

        Ok(Self {
            path,
            inner: Mutex::new(index),
        })
    }

    /// Insert a row.
    ///
    /// With `replace_existing` false, an existing `(from, nonce)` row fails
    /// the call with `DuplicateNonce`; with true it is overwritten
    /// atomically.
    pub fn put(&self, tx: StoredTransaction, replace_existing: bool) -> Result<(), RelayError> {
        let mut inner = self.inner.lock();
        let key = (tx.from, tx.nonce);

        if !replace_existing && inner.contains_key(&key) {
            return Err(RelayError::DuplicateNonce {
                signer: tx.from,
                nonce: tx.nonce,
            });
        }

        let previous = inner.insert(key, tx);
        if let Err(e) = self.persist(&inner) {
            // Roll the index back so memory matches the surviving file.
            match previous {
                Some(prev) => {
                    inner.insert(key, prev);
                }
                None => {
                    inner.remove(&key);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// All rows, ascending by `(from, nonce)`.
    pub fn get_all(&self) -> Vec<StoredTransaction> {
        self.inner.lock().values().cloned().collect()
    }

    /// All rows for one signer, ascending by nonce.
    pub fn get_all_by_signer(&self, from: Address) -> Vec<StoredTransaction> {
        self.inner
            .lock()
            .range((from, 0)..=(from, u64::MAX))
            .map(|(_, tx)| tx.clone())
            .collect()
    }

    /// Delete every row for `from` with `nonce <= inclusive_nonce`.
    pub fn remove_txs_until_nonce(
        &self,
        from: Address,
        inclusive_nonce: u64,
    ) -> Result<(), RelayError> {
        let mut inner = self.inner.lock();
        let keys: Vec<Key> = inner
            .range((from, 0)..=(from, inclusive_nonce))
            .map(|(key, _)| *key)
            .collect();
        if keys.is_empty() {
            return Ok(());
        }

        let mut removed = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(tx) = inner.remove(key) {
                removed.push(tx);
            }
        }
        if let Err(e) = self.persist(&inner) {
            for tx in removed {
                inner.insert((tx.from, tx.nonce), tx);
            }
            return Err(e);
        }

        debug!(from = %from, until_nonce = inclusive_nonce, pruned = keys.len(), "Pruned confirmed nonce prefix");
        Ok(())
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn persist(&self, inner: &BTreeMap<Key, StoredTransaction>) -> Result<(), RelayError> {
        let rows: Vec<&StoredTransaction> = inner.values().collect();
        let json = serde_json::to_string_pretty(&rows)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
