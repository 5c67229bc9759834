//! Peer directory (C7): the fixed participant table, the genesis snapshot
//! retained for consensus re-validation, and the node's own authentication
//! token. Fixed after bootstrap -- nothing here changes once `READY` is
//! reached (§4.8).

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::transaction::UtxoMap;

/// `id = 0` is always the coordinator.
pub const COORDINATOR_ID: u32 = 0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Participant {
    pub id: u32,
    pub host: String,
    pub pubkey: String,
}

#[derive(Debug, Clone, Default)]
pub struct Participants {
    table: Vec<Participant>,
}

impl Participants {
    pub fn new() -> Self {
        Self { table: vec![] }
    }

    pub fn from_vec(table: Vec<Participant>) -> Self {
        Self { table }
    }

    pub fn insert(&mut self, p: Participant) {
        self.table.push(p);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn all(&self) -> &[Participant] {
        &self.table
    }

    pub fn by_pubkey(&self, pubkey: &str) -> Option<&Participant> {
        self.table.iter().find(|p| p.pubkey == pubkey)
    }

    pub fn contains_pubkey(&self, pubkey: &str) -> bool {
        self.by_pubkey(pubkey).is_some()
    }

    /// Everyone except the given participant id. This is the fixed fan-out
    /// list for broadcast (§4.6): fixed after bootstrap, never recomputed.
    pub fn others(&self, except_id: u32) -> Vec<&Participant> {
        self.table.iter().filter(|p| p.id != except_id).collect()
    }
}

/// Immutable bootstrap record a node needs to re-run consensus from scratch:
/// the genesis block itself and the UTXO snapshot it produced. Retained for
/// the lifetime of the process (§3, Node local state).
#[derive(Debug, Clone)]
pub struct GenesisSnapshot {
    pub block: Block,
    pub utxos: UtxoMap,
}
