//! Block structure, hashing, and proof-of-work checks (C4). The stateful
//! commit/validate/rollback machinery that ties blocks to the chain and the
//! UTXO snapshots lives in [`crate::node`], since it needs the rest of the
//! node's state; this module only knows how to build and hash a block.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_bytes;
use crate::crypto::{self, leading_hex_zeros};
use crate::error::{ErrorKind, Result};
use crate::transaction::Transaction;

/// `previous_hash` of the genesis block. Not a real hash; a sentinel.
pub const GENESIS_PREV_HASH: &str = "1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Each entry is the canonical-json encoding of one transaction (§3).
    pub transactions: Vec<String>,
    pub nonce: u32,
    pub current_hash: String,
    pub previous_hash: String,
    pub index: u64,
    pub timestamp: String,
}

/// Only the fields that participate in the block hash (§3, §4.1).
#[derive(Serialize)]
struct BlockHashPreimage<'a> {
    transactions: &'a [String],
    nonce: u32,
}

impl Block {
    pub fn compute_hash(transactions: &[String], nonce: u32) -> Result<String> {
        let bytes = canonical_bytes(&BlockHashPreimage { transactions, nonce })?;
        Ok(crypto::hex_hash(&bytes))
    }

    pub fn recompute_hash(&self) -> Result<String> {
        Self::compute_hash(&self.transactions, self.nonce)
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_hash == GENESIS_PREV_HASH
    }

    /// Decode each bundled transaction back into a [`Transaction`]. Order is
    /// preserved, matching how they were encoded when the block was built.
    pub fn decode_transactions(&self) -> Result<Vec<Transaction>> {
        self.transactions
            .iter()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| Box::new(ErrorKind::Encoding(e.to_string())) as crate::error::Error)
            })
            .collect()
    }

    /// Equality over the canonical wire form (§9 design notes), same
    /// rationale as `Transaction::wire_eq`.
    pub fn wire_eq(&self, other: &Block) -> bool {
        match (
            crate::canonical::canonical_json(self),
            crate::canonical::canonical_json(other),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

pub fn encode_transactions(transactions: &[Transaction]) -> Result<Vec<String>> {
    transactions.iter().map(crate::canonical::canonical_json).collect()
}

/// A block satisfies proof-of-work iff its hash has `difficulty` leading hex
/// zeros. The genesis block is exempt (§3).
pub fn satisfies_pow(hash_hex: &str, difficulty: usize) -> bool {
    leading_hex_zeros(hash_hex, difficulty)
}

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Build the one-and-only genesis block: `nonce = 0`, `previous_hash = "1"`,
/// `index = 0`, no PoW required (§4.3).
pub fn genesis_block(genesis_tx: &Transaction) -> Result<Block> {
    let encoded = encode_transactions(std::slice::from_ref(genesis_tx))?;
    let current_hash = Block::compute_hash(&encoded, 0)?;

    Ok(Block {
        transactions: encoded,
        nonce: 0,
        current_hash,
        previous_hash: GENESIS_PREV_HASH.to_string(),
        index: 0,
        timestamp: now_timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::transaction;

    #[test]
    fn genesis_block_has_sentinel_parent_and_waives_pow() {
        let keypair = KeyPair::generate().unwrap();
        let pubkey = keypair.public_pem().unwrap();
        let genesis_tx = transaction::create_genesis(&keypair, &pubkey, 2).unwrap();
        let block = genesis_block(&genesis_tx).unwrap();

        assert!(block.is_genesis());
        assert_eq!(block.index, 0);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.recompute_hash().unwrap(), block.current_hash);
    }

    #[test]
    fn hash_recomputation_is_sensitive_to_nonce() {
        let a = Block::compute_hash(&["tx".to_string()], 1).unwrap();
        let b = Block::compute_hash(&["tx".to_string()], 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn pow_requires_exact_leading_zero_count() {
        assert!(satisfies_pow("00000abc", 5));
        assert!(!satisfies_pow("0000fabc", 5));
        assert!(satisfies_pow("00000abc", 4));
    }

    #[test]
    fn decode_transactions_round_trips_through_canonical_json() {
        let keypair = KeyPair::generate().unwrap();
        let pubkey = keypair.public_pem().unwrap();
        let genesis_tx = transaction::create_genesis(&keypair, &pubkey, 2).unwrap();
        let block = genesis_block(&genesis_tx).unwrap();

        let decoded = block.decode_transactions().unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].wire_eq(&genesis_tx));
    }
}
