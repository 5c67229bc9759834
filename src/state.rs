//! Node local state (§3): everything a single participant's process holds in
//! memory. This module only defines the container and cheap bookkeeping
//! around it; the operations that mutate it under the node's single state
//! lock live in [`crate::node`].

use crate::block::Block;
use crate::crypto::KeyPair;
use crate::error::Result;
use crate::peers::{GenesisSnapshot, Participants};
use crate::pool::PendingPool;
use crate::transaction::UtxoMap;

/// Where a node is in the bootstrap lifecycle (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Process started, no identity registered with the network yet.
    Uninit,
    /// A client has requested to join and is waiting on the coordinator's
    /// `client_accepted` broadcast.
    Registering,
    /// Genesis has been distributed; normal operation.
    Ready,
    /// `Ready`, plus a miner subprocess is currently searching a batch.
    Mining,
}

/// A single participant's complete in-memory state (§3).
pub struct NodeState {
    pub phase: Phase,

    pub own_id: u32,
    pub own_keypair: KeyPair,
    pub own_pubkey: String,

    /// The full roster, populated during bootstrap (§4.6).
    pub participants: Participants,

    /// Committed balances: the UTXO set as of the last block on `chain`.
    pub valid_utxos: UtxoMap,
    /// Provisional balances: `valid_utxos` plus every transaction currently
    /// pending (§3). This is what `create_transaction` spends against.
    pub utxos: UtxoMap,

    pub chain: Vec<Block>,
    pub pending: PendingPool,

    /// Captured once, at the moment genesis is finalized, so consensus
    /// rollback (§4.7) always has an untouched floor to fall back to.
    pub genesis: Option<GenesisSnapshot>,

    /// Bearer token a client receives from the coordinator at registration
    /// (§4.6), required on `create_transaction` calls.
    pub token: String,

    pub blocks_mined: u64,
}

/// A point-in-time copy of everything a block or transaction validation can
/// touch, taken before attempting a mutation so it can be restored verbatim
/// if validation fails partway through (§4.3's rollback requirement).
#[derive(Clone)]
pub struct StateSnapshot {
    pub valid_utxos: UtxoMap,
    pub utxos: UtxoMap,
    pub chain: Vec<Block>,
    pub pending: PendingPool,
}

impl NodeState {
    pub fn new_uninit(own_keypair: KeyPair) -> Result<Self> {
        let own_pubkey = own_keypair.public_pem()?;
        Ok(Self {
            phase: Phase::Uninit,
            own_id: 0,
            own_keypair,
            own_pubkey,
            participants: Participants::new(),
            valid_utxos: UtxoMap::new(),
            utxos: UtxoMap::new(),
            chain: vec![],
            pending: PendingPool::new(),
            genesis: None,
            token: String::new(),
            blocks_mined: 0,
        })
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn chain_height(&self) -> u64 {
        self.chain.len() as u64
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            valid_utxos: self.valid_utxos.clone(),
            utxos: self.utxos.clone(),
            chain: self.chain.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: StateSnapshot) {
        self.valid_utxos = snapshot.valid_utxos;
        self.utxos = snapshot.utxos;
        self.chain = snapshot.chain;
        self.pending = snapshot.pending;
    }
}
