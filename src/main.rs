//! Meta-transaction relay worker.
//!
//! Wires the transaction management core together and drives it:
//! - Chain client over HTTP JSON-RPC
//! - Manager and worker signing identities
//! - Durable transaction store under the configured workdir
//! - A tick loop that reaps confirmed transactions and reprices stale ones

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relay_chain::{ChainInteractor, KeyManager, RpcChainClient};
use relay_core::{RelayConfig, TransactionManager, TxStore};

/// Environment variable names.
mod env {
    pub const RPC_URL: &str = "RELAY_RPC_URL";
    pub const MANAGER_KEY: &str = "RELAY_MANAGER_KEY";
    pub const WORKER_KEYS: &str = "RELAY_WORKER_KEYS";
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,relay_core=debug,relay_chain=debug")),
        )
        .init();

    let config = RelayConfig::from_env()?;
    config.log_config();

    info!("Starting relay transaction worker");

    let (chain, manager) = initialize_components(&config).await?;

    run_worker_loop(&config, chain, manager).await
}

async fn initialize_components(
    config: &RelayConfig,
) -> Result<(Arc<dyn ChainInteractor>, TransactionManager)> {
    info!("Initializing components...");

    let get_env = |name: &str| -> Result<String> {
        std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
    };

    let rpc_url = get_env(env::RPC_URL)?;
    let chain: Arc<dyn ChainInteractor> = Arc::new(RpcChainClient::connect(&rpc_url).await?);

    let manager_keys = Arc::new(KeyManager::from_private_keys(&[get_env(env::MANAGER_KEY)?])?);
    let worker_key_list: Vec<String> = get_env(env::WORKER_KEYS)?
        .split(',')
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();
    let worker_keys = Arc::new(KeyManager::from_private_keys(&worker_key_list)?);

    let store = Arc::new(TxStore::open(&config.workdir, config.dev_mode)?);
    info!(pending = store.len(), "Transaction store opened");

    let manager = TransactionManager::new(
        chain.clone(),
        store,
        manager_keys,
        worker_keys,
        config.clone(),
    );
    info!(signers = manager.signers().len(), "Transaction manager ready");

    Ok((chain, manager))
}

/// Per-tick confirmation sweep followed by per-signer boost sweeps.
///
/// The two sweeps both mutate the store, so they run sequentially on a
/// single loop.
async fn run_worker_loop(
    config: &RelayConfig,
    chain: Arc<dyn ChainInteractor>,
    manager: TransactionManager,
) -> Result<()> {
    info!("Starting worker loop...");
    let mut tick = tokio::time::interval(config.tick_interval());

    loop {
        tick.tick().await;

        let block = match chain.block_number().await {
            Ok(block) => block,
            Err(e) => {
                warn!(error = %e, "Block number fetch failed, skipping tick");
                continue;
            }
        };

        if let Err(e) = manager.reap_confirmed(block).await {
            warn!(block, error = %e, "Confirmation sweep failed");
        }

        for signer in manager.signers() {
            match manager.boost_pending(signer, block).await {
                Ok(boosted) if !boosted.is_empty() => {
                    info!(signer = %signer, block, boosted = boosted.len(), "Repriced stale transactions");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(signer = %signer, block, error = %e, "Boost sweep failed");
                }
            }
        }
    }
}
