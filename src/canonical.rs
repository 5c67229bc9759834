//! Canonical JSON encoding (C2): deterministic, byte-exact serialization used
//! both as the wire form and as the hash preimage for transactions and
//! blocks. Keys must sort lexicographically and whitespace must be absent.
//!
//! `serde_json::Map` is backed by a `BTreeMap` as long as the crate's
//! `preserve_order` feature is disabled (it is, see Cargo.toml), so routing
//! any `Serialize` value through `serde_json::Value` before printing it
//! sorts every object's keys, recursively, for free. `to_string` already
//! omits all non-significant whitespace.

use serde::Serialize;

use crate::error::Result;

/// Serialize `value` to its canonical JSON string: sorted keys, no
/// whitespace. Used for both the wire form and hash preimages -- the caller
/// decides which fields end up in `value` by constructing the right preimage
/// struct (see [`crate::transaction::TxHashPreimage`] and
/// [`crate::block::BlockHashPreimage`]).
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let as_value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&as_value)?)
}

/// Same as [`canonical_json`] but returns the UTF-8 bytes directly, which is
/// all a hash function actually wants.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(canonical_json(value)?.into_bytes())
}
