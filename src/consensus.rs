//! Consensus resolver (C9): longest-valid-chain arbitration, run when
//! `receive_block` reports an unknown parent (§4.7).

use crate::node::{self, ChainFetcher};
use crate::pool::PendingPool;
use crate::state::NodeState;

/// Resolve a fork by querying every other participant's chain and adopting
/// the first strictly-longer one that validates in full, starting over from
/// genesis each time a candidate is tried. Returns `true` iff the champion
/// changed. Ties keep the current champion (§4.7).
pub fn resolve(state: &mut NodeState, fetcher: &dyn ChainFetcher) -> bool {
    let mut champion = state.snapshot();
    let mut best_len = state.chain.len();
    let mut changed = false;

    let Some(genesis) = state.genesis.clone() else {
        return false;
    };

    let others: Vec<_> = state.participants.others(state.own_id).into_iter().cloned().collect();

    for peer in &others {
        let Some(peer_chain) = fetcher.fetch_chain(peer) else {
            continue;
        };

        if peer_chain.len() + 1 < best_len {
            continue;
        }

        state.chain = vec![genesis.block.clone()];
        state.valid_utxos = genesis.utxos.clone();
        state.utxos = genesis.utxos.clone();
        state.pending = PendingPool::new();

        let mut ok = true;
        for block in peer_chain {
            if node::try_commit_next_block(state, block).is_err() {
                ok = false;
                break;
            }
        }

        if ok {
            let candidate_tail = champion.pending.as_slice().to_vec();
            state.pending = PendingPool::replay(candidate_tail, &state.participants, &mut state.utxos);

            if state.chain.len() > best_len {
                best_len = state.chain.len();
                champion = state.snapshot();
                changed = true;
                log::info!("consensus: adopted peer {}'s chain, new height {}", peer.id, best_len);
                continue;
            }
        }

        state.restore(champion.clone());
    }

    state.restore(champion);
    if !changed {
        log::info!("consensus: kept current chain, height {}", state.chain.len());
    }
    changed
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use super::*;
    use crate::broadcast::NullBroadcaster;
    use crate::config::{BLOCK_CAPACITY, DIFFICULTY};
    use crate::crypto::KeyPair;
    use crate::miner::{self, MinerRequest};
    use crate::node;
    use crate::peers::Participant;

    fn bootstrap_pair() -> (NodeState, NodeState) {
        let coord_keys = KeyPair::generate().unwrap();
        let peer_keys = KeyPair::generate().unwrap();
        let mut coord = NodeState::new_uninit(coord_keys).unwrap();
        let mut peer = NodeState::new_uninit(peer_keys).unwrap();

        node::init_server(&mut coord, 2, "http://coord").unwrap();
        node::init_client(&mut peer).unwrap();
        node::client_connect(&mut coord, "http://peer", &peer.own_pubkey, 2).unwrap();
        node::finalize_genesis(&mut coord, &NullBroadcaster).unwrap();
        node::accept_genesis(
            &mut peer,
            1,
            coord.participants.all().to_vec(),
            coord.genesis.as_ref().unwrap().block.clone(),
            coord.genesis.as_ref().unwrap().utxos.clone(),
        )
        .unwrap();

        for tx in coord.pending.as_slice().to_vec() {
            node::receive_transaction(&mut peer, &tx).unwrap();
        }

        (coord, peer)
    }

    fn mine_next_block(state: &mut NodeState) -> Block {
        let coord_pub = state.own_pubkey.clone();
        for amount in [5, 5, 5] {
            // self-payment is rejected, so pad with transactions to a third
            // party id registered only in the roster (unused otherwise) --
            // instead, reuse the existing pending endowment plus two no-op
            // sized spends back to the only other participant.
            let recipient = state
                .participants
                .others(state.own_id)
                .first()
                .map(|p| p.pubkey.clone())
                .unwrap_or(coord_pub.clone());
            let tx = node::create_transaction(state, &state.token.clone(), &recipient, Decimal::from(amount)).unwrap();
            let _ = tx;
        }
        let batch = state.pending.take_batch(BLOCK_CAPACITY).unwrap();
        let req = MinerRequest {
            transactions: batch,
            token: state.token.clone(),
            participant_id: state.own_id,
        };
        let callback = miner::search(&req, DIFFICULTY).unwrap();
        node::create_block(state, callback).unwrap()
    }

    struct MapFetcher(HashMap<u32, Vec<Block>>);

    impl ChainFetcher for MapFetcher {
        fn fetch_chain(&self, peer: &Participant) -> Option<Vec<Block>> {
            self.0.get(&peer.id).cloned()
        }
    }

    #[test]
    fn resolve_adopts_a_strictly_longer_peer_chain() {
        let (mut coord, mut peer) = bootstrap_pair();

        // `coord` mines one block locally, reaching chain length 2; `peer`
        // is still at genesis-only (length 1) and should adopt it.
        let extra_block = mine_next_block(&mut coord);
        let fetcher = MapFetcher(HashMap::from([(0, vec![extra_block])]));

        let changed = resolve(&mut peer, &fetcher);
        assert!(changed);
        assert_eq!(peer.chain.len(), 2);
    }

    #[test]
    fn resolve_keeps_champion_on_tie() {
        let (_coord, mut peer) = bootstrap_pair();
        let fetcher = MapFetcher(HashMap::new());
        let changed = resolve(&mut peer, &fetcher);
        assert!(!changed);
        assert_eq!(peer.chain.len(), 1);
    }
}
