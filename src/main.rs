//! Node process entry point. The interactive operator CLI and the HTTP
//! transport that binds `noobcash::rpc`'s DTOs to real routes are out of
//! scope for this crate (§1 of the design notes); this binary only brings up
//! logging and a bare `NodeState`, ready for a transport layer to drive
//! through `noobcash::node`.

use std::error::Error;

use noobcash::crypto::KeyPair;
use noobcash::state::NodeState;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let keypair = KeyPair::generate()?;
    let state = NodeState::new_uninit(keypair)?;

    log::info!(
        "noobcash node ready, pubkey fingerprint = {}",
        noobcash::crypto::hex_hash(state.own_pubkey.as_bytes())
    );

    Ok(())
}
