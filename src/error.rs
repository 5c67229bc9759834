use std::error::{Error as StdError, self};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

pub type Error = Box<ErrorKind>;

/// Taxonomy of failures surfaced to callers (see spec §7). Schema, crypto and
/// ledger-consistency failures map to the `error` outcome on the transaction
/// path. `UnknownParent` is not a failure on the block path, it is the signal
/// that sends the caller to the consensus resolver instead.
#[derive(Debug)]
pub enum ErrorKind {
    // --- schema / type ---
    MissingField(&'static str),
    WrongType(&'static str),

    // --- crypto ---
    MalformedKey,
    BadSignature,
    HashMismatch,

    // --- ledger-consistency (transactions) ---
    UnknownParticipant,
    SelfPayment,
    NonPositiveAmount,
    DuplicateInput,
    InputIsOwnId,
    UnknownUtxo(String),
    InsufficientFunds,

    // --- duplicate ---
    AlreadyPending,

    // --- chain-selection (blocks) ---
    WrongCapacity(usize, usize),
    BadProofOfWork,
    BadBlockHash,
    StaleBlock,

    // --- consensus (not a failure) ---
    UnknownParent,

    // --- bootstrap ---
    AlreadyInitialized,
    TooFewParticipants,
    DuplicatePubkey,

    // --- auth ---
    BadToken,

    // --- miner ---
    MinerUnavailable,

    // --- encoding ---
    Encoding(String),
}

impl StdError for ErrorKind {
    fn cause(&self) -> Option<&dyn error::Error> {
        None
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::MissingField(name) => write!(f, "missing field: {name}"),
            ErrorKind::WrongType(name) => write!(f, "wrong type for field: {name}"),
            ErrorKind::MalformedKey => write!(f, "malformed public or private key"),
            ErrorKind::BadSignature => write!(f, "signature does not verify"),
            ErrorKind::HashMismatch => write!(f, "recomputed hash does not match claimed id"),
            ErrorKind::UnknownParticipant => write!(f, "sender or recipient is not a known participant"),
            ErrorKind::SelfPayment => write!(f, "sender and recipient must differ"),
            ErrorKind::NonPositiveAmount => write!(f, "amount must be positive"),
            ErrorKind::DuplicateInput => write!(f, "inputs are not pairwise distinct"),
            ErrorKind::InputIsOwnId => write!(f, "an input references the transaction's own id"),
            ErrorKind::UnknownUtxo(id) => write!(f, "input utxo not found in sender's set: {id}"),
            ErrorKind::InsufficientFunds => write!(f, "sum of inputs is less than the amount"),
            ErrorKind::AlreadyPending => write!(f, "transaction is already in the pending pool"),
            ErrorKind::WrongCapacity(expected, got) => {
                write!(f, "block has {got} transactions, expected {expected}")
            }
            ErrorKind::BadProofOfWork => write!(f, "block hash does not satisfy the difficulty target"),
            ErrorKind::BadBlockHash => write!(f, "recomputed block hash does not match current_hash"),
            ErrorKind::StaleBlock => write!(f, "block's parent is an earlier block (sibling or shorter fork)"),
            ErrorKind::UnknownParent => write!(f, "block's parent hash is not known locally"),
            ErrorKind::AlreadyInitialized => write!(f, "node has already been initialized"),
            ErrorKind::TooFewParticipants => write!(f, "need at least 2 participants"),
            ErrorKind::DuplicatePubkey => write!(f, "a participant with this pubkey already registered"),
            ErrorKind::BadToken => write!(f, "authentication token does not match"),
            ErrorKind::MinerUnavailable => write!(f, "no miner process is currently tracked"),
            ErrorKind::Encoding(msg) => write!(f, "encoding error: {msg}"),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Box::new(ErrorKind::Encoding(e.to_string()))
    }
}
