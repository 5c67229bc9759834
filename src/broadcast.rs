//! Broadcast/gossip (C8): fan-out of transactions and blocks to every other
//! participant, in two modes (§4.6).
//!
//! The transport itself -- actually opening an HTTP connection to a peer's
//! `host` -- is out of scope (§1); that's exactly the seam [`Broadcaster`]
//! draws. The node controller (C10) only ever talks to peers through this
//! trait, and only ever while *not* holding the state lock (§5): broadcast
//! must never be initiated with the lock held, to avoid deadlock under
//! cross-node broadcast storms.

use crate::block::Block;
use crate::peers::Participant;
use crate::transaction::Transaction;

/// Payload pushed to a newly-accepted peer at bootstrap (§4.8).
#[derive(Debug, Clone)]
pub struct ClientAccepted {
    pub participant_id: u32,
    pub participants: Vec<Participant>,
    pub genesis_block: Block,
    pub genesis_utxos: crate::transaction::UtxoMap,
}

/// The boundary contract for fanning a message out to peers. A real
/// implementation sends an HTTP request per peer; this module only fixes the
/// shape of that fan-out, not the wire mechanics.
pub trait Broadcaster {
    /// Fire-and-forget: a very short timeout, replies ignored. Used for
    /// transaction and block gossip -- a peer that misses one either gets
    /// caught up by a later block from someone who didn't, or triggers
    /// consensus on the resulting chain-length mismatch.
    fn fire_and_forget_transaction(&self, peers: &[&Participant], tx: &Transaction);
    fn fire_and_forget_block(&self, peers: &[&Participant], block: &Block);

    /// Wait-for-ack: used only during bootstrap, when the coordinator must
    /// know every peer has installed the genesis state before proceeding.
    fn sync_client_accepted(&self, peers: &[&Participant], payload: &ClientAccepted);
    fn sync_transaction(&self, peers: &[&Participant], tx: &Transaction);
}

/// A broadcaster that does nothing: useful for tests and for running a node
/// in isolation (e.g. measuring local-only throughput) without a transport
/// plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn fire_and_forget_transaction(&self, _peers: &[&Participant], _tx: &Transaction) {}
    fn fire_and_forget_block(&self, _peers: &[&Participant], _block: &Block) {}
    fn sync_client_accepted(&self, _peers: &[&Participant], _payload: &ClientAccepted) {}
    fn sync_transaction(&self, _peers: &[&Participant], _tx: &Transaction) {}
}
