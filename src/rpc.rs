//! Boundary contracts for the HTTP endpoints in §6. The transport that binds
//! these to actual routes is out of scope (§1); this module only fixes the
//! request/response shapes and which [`crate::node`] operation each one maps
//! to, so a transport layer has an unambiguous contract to implement against.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::peers::Participant;
use crate::transaction::{Transaction, UtxoMap};

#[derive(Debug, Deserialize)]
pub struct InitServerRequest {
    pub num_participants: u32,
    pub host: String,
}

#[derive(Debug, Deserialize)]
pub struct InitClientRequest {
    pub host: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ClientConnectRequest {
    pub host: String,
    pub pubkey: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClientAcceptedRequest {
    pub participant_id: u32,
    pub participants: Vec<Participant>,
    pub genesis_block: Block,
    pub genesis_utxos: UtxoMap,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveTransactionRequest {
    pub transaction: Transaction,
}

/// `added` | `exists` | `error`, matching §6's status body.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Added,
    Exists,
    Error,
}

impl From<crate::node::TxOutcome> for TxStatus {
    fn from(outcome: crate::node::TxOutcome) -> Self {
        match outcome {
            crate::node::TxOutcome::Added => TxStatus::Added,
            crate::node::TxOutcome::Exists => TxStatus::Exists,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReceiveBlockRequest {
    pub block: Block,
}

/// `ok` | `dropped` | `consensus` | `error`, matching §6's status body.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    Ok,
    Dropped,
    Consensus,
    Error,
}

impl From<crate::node::BlockOutcome> for BlockStatus {
    fn from(outcome: crate::node::BlockOutcome) -> Self {
        match outcome {
            crate::node::BlockOutcome::Ok => BlockStatus::Ok,
            crate::node::BlockOutcome::Dropped => BlockStatus::Dropped,
            crate::node::BlockOutcome::Consensus => BlockStatus::Consensus,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub token: String,
    pub recepient: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockRequest {
    pub token: String,
    pub transactions: Vec<String>,
    pub nonce: u32,
    pub sha: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct GetBlockchainResponse {
    /// Excludes genesis, per §6.
    pub blockchain: Vec<Block>,
}

#[derive(Debug, Serialize)]
pub struct GetPendingTransactionsResponse {
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct GetBalanceResponse {
    pub balances: std::collections::BTreeMap<u32, Decimal>,
}
