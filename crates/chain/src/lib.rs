//! Relay chain interaction layer.
//!
//! This crate provides:
//! - The chain interactor abstraction the transaction core talks through
//! - An Alloy-backed HTTP JSON-RPC client
//! - Key management for the relay's manager and worker identities
//! - Canonical legacy transaction building and signing

mod client;
mod interactor;
mod keys;
mod tx;

pub use client::RpcChainClient;
pub use interactor::{BlockTag, ChainInteractor, RawTxOptions, TxLookup};
pub use keys::{KeyManager, SignedRawTx};
pub use tx::build_unsigned;
