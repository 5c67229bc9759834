//! Miner subprocess (C6): an isolated PoW search over a fixed transaction
//! batch, externally startable and killable (§4.5).
//!
//! The actual OS process is the `noobcash-miner` binary (`src/bin/miner.rs`),
//! which links this module for the search itself. [`MinerSupervisor`] is the
//! process-management half that the node controller (C10) drives: `start`,
//! `stop`, `start_if_needed`.
//!
//! The miner's real-world contract is to POST its result to `/create_block/`
//! on its parent (§4.5) -- that HTTP hop is the transport binding this spec
//! puts out of scope (§1). Concretely the child instead prints the
//! `/create_block/` request body as one line of canonical JSON on stdout when
//! it succeeds; [`MinerSupervisor`] reads that line off the child's stdout
//! pipe and hands it back as a [`MinerCallback`], which is exactly the
//! payload an HTTP layer would have received at that endpoint. Whoever wires
//! up the real transport can swap "read the child's stdout" for "receive the
//! POST" without touching the search itself.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::block;
use crate::canonical::canonical_json;
use crate::crypto;
use crate::error::{ErrorKind, Result};
use crate::transaction::Transaction;

/// Everything the child process needs: the batch to mine, its own
/// authentication token to stamp on the eventual callback, and the
/// participant id used to seed the nonce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerRequest {
    pub transactions: Vec<Transaction>,
    pub token: String,
    pub participant_id: u32,
}

/// The body the miner would POST to `/create_block/` (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerCallback {
    pub token: String,
    pub transactions: Vec<String>,
    pub nonce: u32,
    pub sha: String,
    pub timestamp: String,
}

/// Run the PoW search to completion: seed the nonce from the participant id,
/// increment until `sha384(canonical({transactions, nonce}))` has
/// `difficulty` leading hex zeros (§3, §4.5) -- the same preimage
/// `Block::compute_hash` uses, so the block this callback builds recomputes
/// to the same hash. `timestamp` is stamped only on success; it plays no
/// part in the hash.
pub fn search(req: &MinerRequest, difficulty: usize) -> Result<MinerCallback> {
    let encoded = block::encode_transactions(&req.transactions)?;
    let mut nonce = crypto::seed_nonce(req.participant_id);

    loop {
        let sha = block::Block::compute_hash(&encoded, nonce)?;

        if block::satisfies_pow(&sha, difficulty) {
            return Ok(MinerCallback {
                token: req.token.clone(),
                transactions: encoded,
                nonce,
                sha,
                timestamp: now_rfc3339(),
            });
        }

        nonce = nonce.wrapping_add(1);
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Supervises the external miner process from the node's side: `start` is
/// idempotent, `stop` sends SIGTERM and tolerates "no such process",
/// `start_if_needed` only starts when the pool has a full batch (§4.5).
pub struct MinerSupervisor {
    child: Option<Child>,
    miner_bin: String,
}

impl MinerSupervisor {
    pub fn new(miner_bin: impl Into<String>) -> Self {
        Self {
            child: None,
            miner_bin: miner_bin.into(),
        }
    }

    fn is_alive(&mut self) -> bool {
        match &mut self.child {
            None => false,
            Some(child) => matches!(child.try_wait(), Ok(None)),
        }
    }

    /// Idempotent: a no-op if the tracked child is still alive.
    pub fn start(&mut self, req: &MinerRequest) -> Result<()> {
        if self.is_alive() {
            return Ok(());
        }

        let mut child = Command::new(&self.miner_bin)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|_| Box::new(ErrorKind::MinerUnavailable))?;

        let payload = serde_json::to_string(req)?;
        if let Some(stdin) = child.stdin.as_mut() {
            let _ = writeln!(stdin, "{payload}");
        }

        self.child = Some(child);
        Ok(())
    }

    /// SIGTERM, tolerating "no such process" (the child may have already
    /// exited on its own after finding a block).
    pub fn stop(&mut self) {
        if let Some(child) = &self.child {
            let pid = nix::unistd::Pid::from_raw(child.id() as i32);
            let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
        }
        self.child = None;
    }

    /// Only starts the miner once the pool has a full batch to hand it.
    pub fn start_if_needed(&mut self, req: &MinerRequest, pending_len: usize, capacity: usize) -> Result<()> {
        if pending_len >= capacity {
            self.start(req)?;
        }
        Ok(())
    }

    /// Non-blocking poll for a finished miner: if the child has exited
    /// successfully and printed a callback line, parse and return it.
    pub fn poll_result(&mut self) -> Option<MinerCallback> {
        let child = self.child.as_mut()?;

        match child.try_wait() {
            Ok(Some(status)) if status.success() => {
                let stdout = child.stdout.take()?;
                let mut reader = BufReader::new(stdout);
                let mut line = String::new();
                reader.read_line(&mut line).ok()?;
                self.child = None;
                serde_json::from_str(line.trim()).ok()
            }
            Ok(Some(status)) => {
                log::warn!("miner exited without a result: {status}");
                self.child = None;
                None
            }
            _ => None,
        }
    }
}

/// Convenience for the child binary: print the callback exactly as the
/// supervisor expects to read it.
pub fn emit_callback(callback: &MinerCallback) -> Result<()> {
    println!("{}", canonical_json(callback)?);
    Ok(())
}
