//! The miner subprocess binary: reads one [`noobcash::miner::MinerRequest`]
//! as a line of JSON on stdin, runs the proof-of-work search, and prints the
//! resulting [`noobcash::miner::MinerCallback`] on stdout before exiting.
//!
//! This process owns nothing but the batch it was handed; it never touches
//! the parent's chain, pool, or UTXO maps. It is meant to be spawned and
//! killed by [`noobcash::miner::MinerSupervisor`].

use std::io::{self, Read};

use noobcash::config::DIFFICULTY;
use noobcash::miner::{self, MinerRequest};

fn main() {
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        eprintln!("noobcash-miner: failed to read request: {e}");
        std::process::exit(1);
    }

    let req: MinerRequest = match serde_json::from_str(input.trim()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("noobcash-miner: malformed request: {e}");
            std::process::exit(1);
        }
    };

    match miner::search(&req, DIFFICULTY) {
        Ok(callback) => {
            if let Err(e) = miner::emit_callback(&callback) {
                eprintln!("noobcash-miner: failed to emit callback: {e}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("noobcash-miner: search failed: {e}");
            std::process::exit(1);
        }
    }
}
