//! Network-wide constants. These are fixed at compile time because every
//! node in a noobcash deployment must agree on them; there is no runtime
//! negotiation of consensus parameters.

/// Transactions required to fill a non-genesis block.
pub const BLOCK_CAPACITY: usize = 4;

/// Leading hex zeros a block's `current_hash` must have to satisfy PoW.
pub const DIFFICULTY: usize = 5;

/// Per-participant endowment at genesis, in coins.
pub const GENESIS_ENDOWMENT_PER_PARTICIPANT: u32 = 100;
