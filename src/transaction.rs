//! Transaction engine (C3): build, sign, verify, and apply transactions
//! against a UTXO map.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::canonical::canonical_bytes;
use crate::crypto::{self, KeyPair};
use crate::error::{ErrorKind, Result};
use crate::peers::Participants;

pub type Pubkey = String;
pub type TxId = String;

/// An unspent output: an atomic credit tagged with its originating
/// transaction id and owner pubkey (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Utxo {
    pub id: TxId,
    pub who: Pubkey,
    pub amount: Decimal,
}

/// Map from owner pubkey to that owner's unspent outputs. Used for both the
/// committed (`valid_utxos`) and provisional (`utxos`) snapshots (§3).
pub type UtxoMap = HashMap<Pubkey, Vec<Utxo>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub amount: Decimal,
    pub inputs: Vec<TxId>,
    pub id: TxId,
    pub signature: String,
    pub outputs: [Utxo; 2],
}

/// Only the fields that participate in the id hash (§3, §4.1). Field order
/// here is irrelevant -- [`canonical_bytes`] re-sorts keys alphabetically --
/// but this struct fixes exactly which fields are hashed.
#[derive(Serialize)]
struct TxHashPreimage<'a> {
    sender: &'a str,
    recipient: &'a str,
    amount: Decimal,
    inputs: &'a [TxId],
}

impl Transaction {
    fn hash_preimage_bytes(
        sender: &str,
        recipient: &str,
        amount: Decimal,
        inputs: &[TxId],
    ) -> Result<Vec<u8>> {
        canonical_bytes(&TxHashPreimage {
            sender,
            recipient,
            amount,
            inputs,
        })
    }

    pub fn compute_id(
        sender: &str,
        recipient: &str,
        amount: Decimal,
        inputs: &[TxId],
    ) -> Result<TxId> {
        let bytes = Self::hash_preimage_bytes(sender, recipient, amount, inputs)?;
        Ok(crypto::hex_hash(&bytes))
    }

    /// Equality over the canonical wire form, not over in-memory structure
    /// (§9 design notes): two transactions are the same transaction iff they
    /// serialize identically.
    pub fn wire_eq(&self, other: &Transaction) -> bool {
        match (
            crate::canonical::canonical_json(self),
            crate::canonical::canonical_json(other),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Build the two derived outputs for a transaction: change back to the
/// sender and the payment to the recipient (§3). `change` may be zero.
fn make_outputs(id: &str, sender: &str, recipient: &str, amount: Decimal, change: Decimal) -> [Utxo; 2] {
    [
        Utxo {
            id: id.to_string(),
            who: sender.to_string(),
            amount: change,
        },
        Utxo {
            id: id.to_string(),
            who: recipient.to_string(),
            amount,
        },
    ]
}

/// Spend-all policy (§4.2): every unspent output of `sender` becomes an
/// input. Fails if the recipient is unknown, equals the sender, or the
/// budget can't cover `amount`. Does not touch any shared state; the caller
/// (the node controller) is responsible for atomically applying the result.
pub fn create(
    keypair: &KeyPair,
    sender_pubkey: &str,
    recipient: &str,
    amount: Decimal,
    participants: &Participants,
    utxos: &UtxoMap,
) -> Result<Transaction> {
    if recipient == sender_pubkey {
        return Err(Box::new(ErrorKind::SelfPayment));
    }
    if !participants.contains_pubkey(recipient) {
        return Err(Box::new(ErrorKind::UnknownParticipant));
    }
    if amount <= Decimal::ZERO {
        return Err(Box::new(ErrorKind::NonPositiveAmount));
    }

    let sender_utxos = utxos.get(sender_pubkey).cloned().unwrap_or_default();
    let inputs: Vec<TxId> = sender_utxos.iter().map(|u| u.id.clone()).collect();
    let budget: Decimal = sender_utxos.iter().map(|u| u.amount).sum();

    if budget < amount {
        return Err(Box::new(ErrorKind::InsufficientFunds));
    }

    let id = Transaction::compute_id(sender_pubkey, recipient, amount, &inputs)?;
    let signature = keypair.sign_hex_hash(&id);
    let change = budget - amount;
    let outputs = make_outputs(&id, sender_pubkey, recipient, amount, change);

    Ok(Transaction {
        sender: sender_pubkey.to_string(),
        recipient: recipient.to_string(),
        amount,
        inputs,
        id,
        signature,
        outputs,
    })
}

/// Self-directed genesis transaction (§4.2): sender == recipient == the
/// coordinator's own pubkey, no inputs, a single output crediting the full
/// endowment. Only ever called once, by id 0, at bootstrap.
pub fn create_genesis(keypair: &KeyPair, coordinator_pubkey: &str, num_participants: u32) -> Result<Transaction> {
    let amount = Decimal::from(crate::config::GENESIS_ENDOWMENT_PER_PARTICIPANT) * Decimal::from(num_participants);
    let inputs: Vec<TxId> = vec![];
    let id = Transaction::compute_id(coordinator_pubkey, coordinator_pubkey, amount, &inputs)?;
    let signature = keypair.sign_hex_hash(&id);

    let outputs = [
        Utxo {
            id: id.clone(),
            who: coordinator_pubkey.to_string(),
            amount,
        },
        Utxo {
            id: id.clone(),
            who: coordinator_pubkey.to_string(),
            amount: Decimal::ZERO,
        },
    ];

    Ok(Transaction {
        sender: coordinator_pubkey.to_string(),
        recipient: coordinator_pubkey.to_string(),
        amount,
        inputs,
        id,
        signature,
        outputs,
    })
}

/// Validate `tx` against `utxos` and `participants` following the
/// short-circuit order laid out in §4.2. Does not mutate `utxos`; on success
/// the caller applies the transaction with [`apply`].
pub fn validate(tx: &Transaction, participants: &Participants, utxos: &UtxoMap) -> Result<()> {
    // identities known
    if !participants.contains_pubkey(&tx.sender) || !participants.contains_pubkey(&tx.recipient) {
        return Err(Box::new(ErrorKind::UnknownParticipant));
    }
    if tx.sender == tx.recipient {
        return Err(Box::new(ErrorKind::SelfPayment));
    }

    // amount > 0
    if tx.amount <= Decimal::ZERO {
        return Err(Box::new(ErrorKind::NonPositiveAmount));
    }

    // hash recomputation matches id
    let expected_id = Transaction::compute_id(&tx.sender, &tx.recipient, tx.amount, &tx.inputs)?;
    if expected_id != tx.id {
        return Err(Box::new(ErrorKind::HashMismatch));
    }

    // signature verifies against sender
    if !crypto::verify_hex_hash(&tx.sender, &tx.id, &tx.signature)? {
        return Err(Box::new(ErrorKind::BadSignature));
    }

    // inputs are a set
    let mut seen = std::collections::HashSet::new();
    for input in &tx.inputs {
        if !seen.insert(input) {
            return Err(Box::new(ErrorKind::DuplicateInput));
        }
    }

    // id not among inputs
    if tx.inputs.iter().any(|i| i == &tx.id) {
        return Err(Box::new(ErrorKind::InputIsOwnId));
    }

    // each input resolves to an entry in utxos[sender], consumed as encountered
    let sender_utxos = utxos.get(&tx.sender).cloned().unwrap_or_default();
    let mut remaining = sender_utxos;
    let mut input_sum = Decimal::ZERO;

    for input_id in &tx.inputs {
        let pos = remaining
            .iter()
            .position(|u| &u.id == input_id)
            .ok_or_else(|| Box::new(ErrorKind::UnknownUtxo(input_id.clone())))?;
        let utxo = remaining.remove(pos);
        input_sum += utxo.amount;
    }

    // sum(inputs) >= amount, i.e. change >= 0
    if input_sum < tx.amount {
        return Err(Box::new(ErrorKind::InsufficientFunds));
    }
    let change = input_sum - tx.amount;

    // outputs derivable from id and amounts
    let expected_outputs = make_outputs(&tx.id, &tx.sender, &tx.recipient, tx.amount, change);
    if tx.outputs != expected_outputs {
        return Err(Box::new(ErrorKind::HashMismatch));
    }

    Ok(())
}

/// Apply an already-validated transaction: atomically replace the sender's
/// utxo set with the lone change output and append the recipient's output
/// (§4.2). The caller must have already validated `tx` against this exact
/// `utxos` map.
pub fn apply(tx: &Transaction, utxos: &mut UtxoMap) {
    utxos.insert(tx.sender.clone(), vec![tx.outputs[0].clone()]);
    utxos
        .entry(tx.recipient.clone())
        .or_default()
        .push(tx.outputs[1].clone());
}

/// Seed every participant's committed balance at genesis from the genesis
/// transaction's sole real credit.
pub fn build_genesis_utxos(genesis_tx: &Transaction) -> UtxoMap {
    let mut map = UtxoMap::new();
    map.insert(genesis_tx.sender.clone(), vec![genesis_tx.outputs[0].clone()]);
    map
}

pub fn balance_of(utxos: &UtxoMap, pubkey: &str) -> Decimal {
    utxos
        .get(pubkey)
        .map(|v| v.iter().map(|u| u.amount).sum())
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::Participant;

    fn two_party_fixture() -> (KeyPair, KeyPair, Participants, UtxoMap) {
        let coordinator = KeyPair::generate().unwrap();
        let peer = KeyPair::generate().unwrap();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let mut participants = Participants::new();
        participants.insert(Participant {
            id: 0,
            host: "http://coord".into(),
            pubkey: coordinator_pub.clone(),
        });
        participants.insert(Participant {
            id: 1,
            host: "http://peer".into(),
            pubkey: peer_pub,
        });

        let genesis = create_genesis(&coordinator, &coordinator_pub, 2).unwrap();
        let utxos = build_genesis_utxos(&genesis);

        (coordinator, peer, participants, utxos)
    }

    #[test]
    fn genesis_credits_full_endowment_to_coordinator() {
        let (coordinator, _peer, _participants, utxos) = two_party_fixture();
        let pubkey = coordinator.public_pem().unwrap();
        assert_eq!(balance_of(&utxos, &pubkey), Decimal::from(200));
    }

    #[test]
    fn create_then_validate_round_trips() {
        let (coordinator, peer, participants, mut utxos) = two_party_fixture();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let tx = create(&coordinator, &coordinator_pub, &peer_pub, Decimal::from(30), &participants, &utxos).unwrap();
        apply(&tx, &mut utxos);

        assert_eq!(balance_of(&utxos, &coordinator_pub), Decimal::from(170));
        assert_eq!(balance_of(&utxos, &peer_pub), Decimal::from(30));

        // a fresh validate against the post-apply utxos must fail: the
        // inputs it just spent are gone.
        assert!(validate(&tx, &participants, &utxos).is_err());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let (coordinator, peer, participants, utxos) = two_party_fixture();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let err = create(&coordinator, &coordinator_pub, &peer_pub, Decimal::ZERO, &participants, &utxos).unwrap_err();
        assert!(matches!(*err, ErrorKind::NonPositiveAmount));
    }

    #[test]
    fn self_payment_is_rejected() {
        let (coordinator, _peer, participants, utxos) = two_party_fixture();
        let coordinator_pub = coordinator.public_pem().unwrap();

        let err =
            create(&coordinator, &coordinator_pub, &coordinator_pub, Decimal::from(1), &participants, &utxos)
                .unwrap_err();
        assert!(matches!(*err, ErrorKind::SelfPayment));
    }

    #[test]
    fn spend_all_exceeding_budget_is_rejected() {
        let (coordinator, peer, participants, utxos) = two_party_fixture();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let err =
            create(&coordinator, &coordinator_pub, &peer_pub, Decimal::from(201), &participants, &utxos).unwrap_err();
        assert!(matches!(*err, ErrorKind::InsufficientFunds));
    }

    #[test]
    fn double_spend_of_same_utxo_is_rejected_on_second_validate() {
        let (coordinator, peer, participants, mut utxos) = two_party_fixture();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let first = create(&coordinator, &coordinator_pub, &peer_pub, Decimal::from(200), &participants, &utxos).unwrap();
        // Simulate a second transaction built against the same starting
        // utxos (e.g. a race before either is applied).
        let second = create(&coordinator, &coordinator_pub, &peer_pub, Decimal::from(50), &participants, &utxos).unwrap();

        apply(&first, &mut utxos);
        assert!(validate(&second, &participants, &utxos).is_err());
    }

    #[test]
    fn tampered_amount_fails_hash_check() {
        let (coordinator, peer, participants, utxos) = two_party_fixture();
        let coordinator_pub = coordinator.public_pem().unwrap();
        let peer_pub = peer.public_pem().unwrap();

        let mut tx = create(&coordinator, &coordinator_pub, &peer_pub, Decimal::from(30), &participants, &utxos).unwrap();
        tx.amount = Decimal::from(9999);

        let err = validate(&tx, &participants, &utxos).unwrap_err();
        assert!(matches!(*err, ErrorKind::HashMismatch));
    }
}
