//! Per-signer nonce allocation.
//!
//! Each signer gets its own mutex-guarded slot; holding the slot lock from
//! poll through commit serializes nonce assignment for that signer without
//! blocking sends from other signers.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// A single signer's nonce counter.
///
/// Counters start at 0 and are corrected by the first [`poll`](Self::poll);
/// the durable source of truth for outstanding nonces is the transaction
/// store, not this cache.
#[derive(Debug, Default)]
pub struct NonceSlot {
    next: u64,
}

impl NonceSlot {
    /// Reconcile against the chain's pending transaction count and return
    /// the nonce to use for the next send.
    ///
    /// If the chain knows of transactions the relay does not, the counter
    /// jumps forward to match.
    pub fn poll(&mut self, signer: Address, pending_count: u64) -> u64 {
        if pending_count > self.next {
            warn!(
                signer = %signer,
                local = self.next,
                chain = pending_count,
                "Local nonce behind chain pending count, jumping forward"
            );
            self.next = pending_count;
        }
        self.next
    }

    /// Mark the polled nonce as used. Call only after the transaction was
    /// durably stored.
    pub fn commit(&mut self) {
        self.next += 1;
    }

    /// Current counter value without allocating.
    pub fn next(&self) -> u64 {
        self.next
    }
}

/// Per-signer nonce slots.
#[derive(Debug, Default)]
pub struct NonceAllocator {
    slots: DashMap<Address, Arc<Mutex<NonceSlot>>>,
}

impl NonceAllocator {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// The slot for `signer`, created at 0 on first use.
    ///
    /// The returned mutex is the signer's nonce critical section: hold it
    /// across poll, sign, store and commit.
    pub fn slot(&self, signer: Address) -> Arc<Mutex<NonceSlot>> {
        self.slots.entry(signer).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_commit_sequence() {
        let signer = Address::repeat_byte(0x01);
        let mut slot = NonceSlot::default();

        assert_eq!(slot.poll(signer, 5), 5);
        slot.commit();
        assert_eq!(slot.poll(signer, 5), 6);
        slot.commit();
        assert_eq!(slot.next(), 7);
    }

    #[test]
    fn test_poll_never_regresses() {
        let signer = Address::repeat_byte(0x01);
        let mut slot = NonceSlot::default();

        assert_eq!(slot.poll(signer, 7), 7);
        slot.commit();
        // Chain reports a lower count; the local counter wins.
        assert_eq!(slot.poll(signer, 3), 8);
    }

    #[tokio::test]
    async fn test_slots_are_per_signer() {
        let allocator = NonceAllocator::new();
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);

        allocator.slot(a).lock().await.commit();
        assert_eq!(allocator.slot(a).lock().await.next(), 1);
        assert_eq!(allocator.slot(b).lock().await.next(), 0);
    }

    #[tokio::test]
    async fn test_slot_is_shared_per_signer() {
        let allocator = NonceAllocator::new();
        let signer = Address::repeat_byte(0x01);

        let first = allocator.slot(signer);
        first.lock().await.commit();
        assert_eq!(allocator.slot(signer).lock().await.next(), 1);
    }
}
