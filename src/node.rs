//! Node controller (C10): bootstrap, inbound dispatch, and miner-lifecycle
//! arbitration, all serialized behind the state lock described in §5.
//!
//! Every mutating entry point here takes `&mut NodeState` and is meant to be
//! called with that state already behind a mutex the caller holds for the
//! duration of the call (the HTTP handlers that would acquire it are out of
//! scope, §1). Broadcasting and cross-node chain fetches are injected via
//! [`crate::broadcast::Broadcaster`] and [`ChainFetcher`] so this module
//! never assumes a transport.

use rust_decimal::Decimal;

use crate::block::{self, Block};
use crate::broadcast::{Broadcaster, ClientAccepted};
use crate::config::{BLOCK_CAPACITY, DIFFICULTY};
use crate::consensus;
use crate::crypto::KeyPair;
use crate::error::{Error, ErrorKind, Result};
use crate::miner::{MinerCallback, MinerRequest, MinerSupervisor};
use crate::peers::{GenesisSnapshot, Participant, Participants, COORDINATOR_ID};
use crate::pool::PendingPool;
use crate::state::{NodeState, Phase};
use crate::transaction::{self, Transaction};

/// Outcome of submitting a transaction, either locally created or received
/// from a peer (§4.2, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Added,
    Exists,
}

/// Outcome of submitting a block (§4.3, §6). `Consensus` is not a failure; it
/// is the signal to run the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Ok,
    Dropped,
    Consensus,
}

/// Anything peers the node needs to ask during consensus (§4.7): `GET
/// /get_blockchain/`, excluding genesis. Out of scope is the transport;
/// this trait is the whole contract.
pub trait ChainFetcher {
    fn fetch_chain(&self, peer: &Participant) -> Option<Vec<Block>>;
}

// ------------------------------------------------------------------
// Bootstrap (§4.8)
// ------------------------------------------------------------------

/// `init_server(N, host)`: the coordinator's own bootstrap. Fails if the node
/// already has an identity or `N < 2`.
pub fn init_server(state: &mut NodeState, num_participants: u32, host: &str) -> Result<String> {
    if state.phase != Phase::Uninit {
        return Err(Box::new(ErrorKind::AlreadyInitialized));
    }
    if num_participants < 2 {
        return Err(Box::new(ErrorKind::TooFewParticipants));
    }

    state.own_id = COORDINATOR_ID;
    state.token = crate::crypto::generate_token();
    state.participants.insert(Participant {
        id: COORDINATOR_ID,
        host: host.to_string(),
        pubkey: state.own_pubkey.clone(),
    });
    state.phase = Phase::Registering;
    log::info!("bootstrap: coordinator registering, awaiting {num_participants} participants");

    Ok(state.token.clone())
}

/// `init_client(host)`: a peer's own bootstrap. The actual `client_connect`
/// call to the coordinator is a transport concern; this only prepares local
/// state to receive `client_accepted`.
pub fn init_client(state: &mut NodeState) -> Result<String> {
    if state.phase != Phase::Uninit {
        return Err(Box::new(ErrorKind::AlreadyInitialized));
    }

    state.token = crate::crypto::generate_token();
    state.phase = Phase::Registering;
    log::info!("bootstrap: peer registering, awaiting client_accepted");

    Ok(state.token.clone())
}

/// Coordinator-side `/client_connect/`: register one more participant.
/// Returns `true` once the table has reached `num_participants`, signaling
/// the caller to call [`finalize_genesis`].
pub fn client_connect(state: &mut NodeState, host: &str, pubkey: &str, num_participants: u32) -> Result<bool> {
    if state.participants.contains_pubkey(pubkey) {
        return Err(Box::new(ErrorKind::DuplicatePubkey));
    }

    let id = state.participants.len() as u32;
    state.participants.insert(Participant {
        id,
        host: host.to_string(),
        pubkey: pubkey.to_string(),
    });

    Ok(state.participants.len() as u32 == num_participants)
}

/// Coordinator finalizes bootstrap once the roster is full (§4.8): build the
/// genesis block, snapshot it, broadcast `client_accepted` (sync), then mint
/// and broadcast one endowment transaction per other participant (sync).
/// Leaves `state.phase == Ready`.
pub fn finalize_genesis(state: &mut NodeState, broadcaster: &dyn Broadcaster) -> Result<()> {
    let num_participants = state.participants.len() as u32;
    let genesis_tx = transaction::create_genesis(&state.own_keypair, &state.own_pubkey, num_participants)?;
    let genesis_block = block::genesis_block(&genesis_tx)?;
    let genesis_utxos = transaction::build_genesis_utxos(&genesis_tx);

    state.chain = vec![genesis_block.clone()];
    state.valid_utxos = genesis_utxos.clone();
    state.utxos = genesis_utxos.clone();
    state.genesis = Some(GenesisSnapshot {
        block: genesis_block.clone(),
        utxos: genesis_utxos,
    });

    let others = state.participants.others(state.own_id);
    broadcaster.sync_client_accepted(
        &others,
        &ClientAccepted {
            participant_id: 0,
            participants: state.participants.all().to_vec(),
            genesis_block,
            genesis_utxos: state.genesis.as_ref().unwrap().utxos.clone(),
        },
    );

    for other in state.participants.others(state.own_id) {
        let tx = transaction::create(
            &state.own_keypair,
            &state.own_pubkey,
            &other.pubkey,
            Decimal::from(crate::config::GENESIS_ENDOWMENT_PER_PARTICIPANT),
            &state.participants,
            &state.utxos,
        )?;
        transaction::apply(&tx, &mut state.utxos);
        state.pending.push(tx.clone());
        broadcaster.sync_transaction(&state.participants.others(state.own_id), &tx);
    }

    state.phase = Phase::Ready;
    log::info!("bootstrap: genesis finalized, {num_participants} participants ready");
    Ok(())
}

/// Peer-side `/client_accepted/`: install the roster, genesis block, and
/// genesis UTXO snapshot sent by the coordinator.
pub fn accept_genesis(
    state: &mut NodeState,
    own_id: u32,
    participants: Vec<Participant>,
    genesis_block: Block,
    genesis_utxos: crate::transaction::UtxoMap,
) -> Result<()> {
    if state.phase != Phase::Registering {
        return Err(Box::new(ErrorKind::AlreadyInitialized));
    }

    state.own_id = own_id;
    state.participants = Participants::from_vec(participants);
    state.chain = vec![genesis_block.clone()];
    state.valid_utxos = genesis_utxos.clone();
    state.utxos = genesis_utxos.clone();
    state.genesis = Some(GenesisSnapshot {
        block: genesis_block,
        utxos: genesis_utxos,
    });
    state.phase = Phase::Ready;
    log::info!("bootstrap: genesis accepted, own_id={own_id} ready");

    Ok(())
}

// ------------------------------------------------------------------
// Transactions (§4.2, §4.8)
// ------------------------------------------------------------------

/// `create_transaction`: authenticated, locally-originated spend. Caller is
/// responsible for broadcasting the returned transaction.
pub fn create_transaction(
    state: &mut NodeState,
    token: &str,
    recipient: &str,
    amount: Decimal,
) -> Result<Transaction> {
    if token != state.token {
        return Err(Box::new(ErrorKind::BadToken));
    }

    let tx = transaction::create(
        &state.own_keypair,
        &state.own_pubkey,
        recipient,
        amount,
        &state.participants,
        &state.utxos,
    )?;
    transaction::apply(&tx, &mut state.utxos);
    state.pending.push(tx.clone());

    Ok(tx)
}

/// `/receive_transaction/`: validate an inbound transaction and, unless it is
/// a known duplicate, pool it. `exists` is not an error (§4.2).
pub fn receive_transaction(state: &mut NodeState, tx: &Transaction) -> Result<TxOutcome> {
    if state.pending.contains(tx) {
        return Ok(TxOutcome::Exists);
    }

    transaction::validate(tx, &state.participants, &state.utxos)?;
    transaction::apply(tx, &mut state.utxos);
    state.pending.push(tx.clone());

    Ok(TxOutcome::Added)
}

// ------------------------------------------------------------------
// Blocks (§4.3, §4.8)
// ------------------------------------------------------------------

/// Shared commit body for a structurally-verified block whose
/// `previous_hash` already matches the current tip: reset the provisional
/// UTXO to `valid_utxos`, clear the pool, re-validate and re-apply each
/// bundled transaction, append the block, replay the previously-pending
/// tail, and commit `valid_utxos := utxos` (§4.3).
fn commit_onto_tip(state: &mut NodeState, block: Block) -> Result<()> {
    let transactions = block.decode_transactions()?;

    state.utxos = state.valid_utxos.clone();
    for tx in &transactions {
        transaction::validate(tx, &state.participants, &state.utxos)?;
        transaction::apply(tx, &mut state.utxos);
    }

    let surviving_tail = state.pending.tail_after(&transactions);
    state.pending.clear();
    state.chain.push(block);
    state.pending = PendingPool::replay(surviving_tail, &state.participants, &mut state.utxos);

    state.valid_utxos = state.utxos.clone();
    log::info!("committed block at height {} ({} txns)", state.chain.len() - 1, transactions.len());
    Ok(())
}

/// Structural checks shared by every non-genesis block before it is ever
/// committed: exact capacity, hash recomputation, and PoW (§3, §4.3).
fn verify_block_shape(block: &Block) -> Result<()> {
    if block.transactions.len() != BLOCK_CAPACITY {
        return Err(Box::new(ErrorKind::WrongCapacity(BLOCK_CAPACITY, block.transactions.len())));
    }
    let recomputed = block.recompute_hash()?;
    if recomputed != block.current_hash {
        return Err(Box::new(ErrorKind::BadBlockHash));
    }
    if !block::satisfies_pow(&block.current_hash, DIFFICULTY) {
        return Err(Box::new(ErrorKind::BadProofOfWork));
    }
    Ok(())
}

/// Used by both the miner-success path and consensus replay: verify shape,
/// verify it extends the current tip, and commit.
pub(crate) fn try_commit_next_block(state: &mut NodeState, block: Block) -> Result<()> {
    verify_block_shape(&block)?;

    let expected_previous = state
        .last_block()
        .ok_or_else(|| Box::new(ErrorKind::UnknownParent) as Error)?
        .current_hash
        .clone();
    if block.previous_hash != expected_previous {
        return Err(Box::new(ErrorKind::BadBlockHash));
    }

    commit_onto_tip(state, block)
}

/// `/create_block/`: the miner's authenticated success callback. Rebuilds
/// the block around the current tip, commits it, and bumps the locally-mined
/// counter (§4.3). As with `create_transaction`, broadcasting the result is
/// the caller's job, done after the state lock is released (§5).
pub fn create_block(state: &mut NodeState, callback: MinerCallback) -> Result<Block> {
    if callback.token != state.token {
        return Err(Box::new(ErrorKind::BadToken));
    }

    let previous_hash = state
        .last_block()
        .ok_or_else(|| Box::new(ErrorKind::UnknownParent) as Error)?
        .current_hash
        .clone();
    let index = state.chain_height();

    let block = Block {
        transactions: callback.transactions,
        nonce: callback.nonce,
        current_hash: callback.sha,
        previous_hash,
        index,
        timestamp: callback.timestamp,
    };

    verify_block_shape(&block)?;
    commit_onto_tip(state, block.clone())?;
    state.blocks_mined += 1;

    Ok(block)
}

/// `/receive_block/`: parse and classify a peer's block, per §4.3's
/// three-way branch. On `Ok` the commit has already happened; on any
/// validation failure after a tentative commit was attempted, state is
/// rolled back to the snapshot taken at entry.
pub fn receive_block(state: &mut NodeState, block: Block) -> Result<BlockOutcome> {
    verify_block_shape(&block)?;

    let tip_hash = state
        .last_block()
        .ok_or_else(|| Box::new(ErrorKind::UnknownParent) as Error)?
        .current_hash
        .clone();

    if block.previous_hash == tip_hash {
        let backup = state.snapshot();
        match try_commit_next_block(state, block) {
            Ok(()) => Ok(BlockOutcome::Ok),
            Err(e) => {
                state.restore(backup);
                Err(e)
            }
        }
    } else if state.chain.iter().any(|b| b.current_hash == block.previous_hash) {
        Ok(BlockOutcome::Dropped)
    } else {
        Ok(BlockOutcome::Consensus)
    }
}

// ------------------------------------------------------------------
// Miner lifecycle (§4.5)
// ------------------------------------------------------------------

/// Hand the first `BLOCK_CAPACITY` pending transactions to the miner if
/// there are enough; idempotent if it's already running.
pub fn start_miner_if_needed(state: &NodeState, supervisor: &mut MinerSupervisor) -> Result<()> {
    if let Some(batch) = state.pending.take_batch(BLOCK_CAPACITY) {
        let req = MinerRequest {
            transactions: batch,
            token: state.token.clone(),
            participant_id: state.own_id,
        };
        supervisor.start(&req)?;
    }
    Ok(())
}

/// Before any inbound block validation, the running miner must be stopped
/// (§4.5) since it's searching against a batch that may no longer be valid
/// once the new block lands.
pub fn stop_miner(supervisor: &mut MinerSupervisor) {
    supervisor.stop();
}

// ------------------------------------------------------------------
// Consensus glue (§4.7)
// ------------------------------------------------------------------

/// Run the longest-chain resolver when `receive_block` returned `Consensus`.
pub fn resolve_consensus(state: &mut NodeState, fetcher: &dyn ChainFetcher) -> bool {
    consensus::resolve(state, fetcher)
}

pub fn own_keypair(state: &NodeState) -> &KeyPair {
    &state.own_keypair
}
