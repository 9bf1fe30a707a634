//! Canonical transaction building.

use alloy::consensus::TxLegacy;
use alloy::primitives::{Address, Bytes, TxKind, U256};

use crate::interactor::RawTxOptions;

/// Build an unsigned legacy transaction for this chain.
///
/// The chain id from `opts` is embedded so the signature is EIP-155
/// replay-protected.
pub fn build_unsigned(
    to: Address,
    value: U256,
    gas_limit: u64,
    gas_price: u128,
    data: Bytes,
    nonce: u64,
    opts: &RawTxOptions,
) -> TxLegacy {
    TxLegacy {
        chain_id: Some(opts.chain_id),
        nonce,
        gas_price,
        gas_limit,
        to: TxKind::Call(to),
        value,
        input: data,
    }
}
