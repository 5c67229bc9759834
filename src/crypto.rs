//! Crypto primitives (C1): SHA-384 hashing, RSA-2048 keypairs, PKCS#1-v1.5
//! signing/verification and base64 framing. Everything above this module
//! works in terms of hex hashes and PEM strings; the `rsa`/`sha2` types
//! never leak past this file.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::signature::{Keypair, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha384};

use crate::error::{ErrorKind, Result};

pub const RSA_BITS: usize = 2048;

pub type Hash384 = [u8; 48];

/// A node's own RSA-2048 keypair. Key *storage* is out of scope (§1); this
/// type only ever lives in memory for the lifetime of the process.
pub struct KeyPair {
    signing_key: SigningKey<Sha384>,
    pub_key: RsaPublicKey,
}

impl KeyPair {
    pub fn generate() -> Result<Self> {
        let mut rng = rand::thread_rng();
        let priv_key = RsaPrivateKey::new(&mut rng, RSA_BITS)
            .map_err(|_| Box::new(ErrorKind::MalformedKey))?;
        let pub_key = RsaPublicKey::from(&priv_key);
        let signing_key = SigningKey::<Sha384>::new(priv_key);

        Ok(Self {
            signing_key,
            pub_key,
        })
    }

    /// The PEM encoding of the public key. This string *is* the participant's
    /// identity throughout the network.
    pub fn public_pem(&self) -> Result<String> {
        self.pub_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|_| Box::new(ErrorKind::MalformedKey))
    }

    /// Sign a SHA-384 hash (hex-encoded, matching the preimage used for
    /// transaction/block ids) and return the base64 PKCS#1-v1.5 signature.
    pub fn sign_hex_hash(&self, hash_hex: &str) -> String {
        let sig = self.signing_key.sign(hash_hex.as_bytes());
        BASE64.encode(sig.to_bytes())
    }
}

pub fn sha384(bytes: &[u8]) -> Hash384 {
    let mut hasher = Sha384::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0_u8; 48];
    out.copy_from_slice(&digest);
    out
}

pub fn hex_hash(bytes: &[u8]) -> String {
    hex::encode(sha384(bytes))
}

fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_public_key_pem(pem).map_err(|_| Box::new(ErrorKind::MalformedKey))
}

/// Verify a base64 PKCS#1-v1.5 signature over a hex hash string, given the
/// signer's PEM-encoded public key.
pub fn verify_hex_hash(pem: &str, hash_hex: &str, signature_b64: &str) -> Result<bool> {
    let pub_key = public_key_from_pem(pem)?;
    let verifying_key = VerifyingKey::<Sha384>::new(pub_key);

    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|_| Box::new(ErrorKind::BadSignature))?;
    let signature =
        Signature::try_from(sig_bytes.as_slice()).map_err(|_| Box::new(ErrorKind::BadSignature))?;

    Ok(verifying_key.verify(hash_hex.as_bytes(), &signature).is_ok())
}

/// An opaque per-node authentication token, generated once at bootstrap and
/// required on `/create_transaction/` and `/create_block/` (§6).
pub fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Matches the seed formula the miner subprocess uses: `(random u32 *
/// participant_id) mod 2^32`.
pub fn seed_nonce(participant_id: u32) -> u32 {
    let r = rand::thread_rng().next_u32();
    r.wrapping_mul(participant_id)
}

pub fn leading_hex_zeros(hash_hex: &str, difficulty: usize) -> bool {
    hash_hex.as_bytes().iter().take(difficulty).all(|b| *b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = KeyPair::generate().unwrap();
        let pubkey = keypair.public_pem().unwrap();
        let hash = hex_hash(b"hello noobcash");
        let sig = keypair.sign_hex_hash(&hash);

        assert!(verify_hex_hash(&pubkey, &hash, &sig).unwrap());
    }

    #[test]
    fn verify_rejects_signature_from_a_different_key() {
        let signer = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let other_pub = other.public_pem().unwrap();

        let hash = hex_hash(b"hello noobcash");
        let sig = signer.sign_hex_hash(&hash);

        assert!(!verify_hex_hash(&other_pub, &hash, &sig).unwrap());
    }

    #[test]
    fn hex_hash_is_deterministic() {
        assert_eq!(hex_hash(b"abc"), hex_hash(b"abc"));
        assert_ne!(hex_hash(b"abc"), hex_hash(b"abd"));
    }

    #[test]
    fn leading_hex_zeros_checks_exact_prefix() {
        assert!(leading_hex_zeros("00000", 5));
        assert!(!leading_hex_zeros("0000a", 5));
    }
}

