//! Pending-transaction pool (C5): an ordered queue of validated but
//! un-mined transactions. Order preserves arrival; the first
//! `BLOCK_CAPACITY` are handed to the miner.

use crate::peers::Participants;
use crate::transaction::{self, Transaction, UtxoMap};

#[derive(Debug, Clone, Default)]
pub struct PendingPool {
    queue: Vec<Transaction>,
}

impl PendingPool {
    pub fn new() -> Self {
        Self { queue: vec![] }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn as_slice(&self) -> &[Transaction] {
        &self.queue
    }

    /// Membership test uses wire-form equality (§4.4), not id equality.
    pub fn contains(&self, tx: &Transaction) -> bool {
        self.queue.iter().any(|t| t.wire_eq(tx))
    }

    pub fn push(&mut self, tx: Transaction) {
        self.queue.push(tx);
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// The first `capacity` transactions, in arrival order, to be handed to
    /// the miner. Returns `None` if the pool doesn't have enough yet.
    pub fn take_batch(&self, capacity: usize) -> Option<Vec<Transaction>> {
        if self.queue.len() < capacity {
            return None;
        }
        Some(self.queue[..capacity].to_vec())
    }

    /// Everything after the first `committed.len()` that isn't in
    /// `committed`, for the miner-success path where we know the committed
    /// prefix exactly.
    pub fn tail_after(&self, committed: &[Transaction]) -> Vec<Transaction> {
        self.queue
            .iter()
            .filter(|t| !committed.iter().any(|c| c.wire_eq(t)))
            .cloned()
            .collect()
    }

    /// Best-effort replay (§4.3, §4.4): re-validate each candidate against
    /// `utxos` in order, applying and keeping the ones that still validate,
    /// silently dropping the ones a new block invalidated (e.g. a
    /// double-spend the block already settled).
    pub fn replay(candidates: Vec<Transaction>, participants: &Participants, utxos: &mut UtxoMap) -> Self {
        let mut kept = vec![];

        for tx in candidates {
            if transaction::validate(&tx, participants, utxos).is_ok() {
                transaction::apply(&tx, utxos);
                kept.push(tx);
            }
        }

        Self { queue: kept }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::peers::Participant;
    use rust_decimal::Decimal;

    fn fixture() -> (Participants, UtxoMap, KeyPair, String, String) {
        let coordinator = KeyPair::generate().unwrap();
        let peer = KeyPair::generate().unwrap();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let mut participants = Participants::new();
        participants.insert(Participant {
            id: 0,
            host: "http://coord".into(),
            pubkey: coordinator_pub.clone(),
        });
        participants.insert(Participant {
            id: 1,
            host: "http://peer".into(),
            pubkey: peer_pub.clone(),
        });

        let genesis = transaction::create_genesis(&coordinator, &coordinator_pub, 2).unwrap();
        let utxos = transaction::build_genesis_utxos(&genesis);

        (participants, utxos, coordinator, coordinator_pub, peer_pub)
    }

    #[test]
    fn take_batch_requires_full_capacity() {
        let pool = PendingPool::new();
        assert!(pool.take_batch(4).is_none());
    }

    #[test]
    fn replay_drops_transactions_invalidated_by_a_committed_block() {
        let (participants, mut utxos, coordinator, coordinator_pub, peer_pub) = fixture();

        let tx = transaction::create(&coordinator, &coordinator_pub, &peer_pub, Decimal::from(200), &participants, &utxos)
            .unwrap();
        transaction::apply(&tx, &mut utxos);

        // A second candidate built against the pre-apply snapshot, now stale
        // because the coordinator's entire balance was already spent.
        let stale = tx.clone();
        let replayed = PendingPool::replay(vec![stale], &participants, &mut utxos.clone());
        // `tx` is already applied to `utxos`, so replaying it again against
        // the post-apply map must find no matching input and be dropped.
        assert!(replayed.is_empty());
    }
}
