//! Locking and unlocking templates for BRC-29 payments.
//!
//! A sender locks to the hash of the recipient's derived child key;
//! the recipient unlocks with the matching child private key. Change
//! outputs are the degenerate case where both parties are the wallet
//! itself.

use crate::Error;
use satchel_codec::envelope::{Counterparty, ProtocolId, SecurityLevel};
use satchel_crypto::hash::hash160;
use satchel_crypto::KeyDeriver;
use satchel_primitives::sighash::{sighash_forkid, SIGHASH_ALL_FORKID};
use satchel_primitives::{Script, Transaction};

/// BRC-29 protocol name; the derivation invoice becomes
/// `2-3241645161d8-{keyID}`.
pub const BRC29_PROTOCOL_NAME: &str = "3241645161d8";

/// Planning length of a P2PKH unlocking script: a 72-byte DER
/// signature push plus a 33-byte key push, with one byte of slack for
/// signatures that serialize a byte longer.
pub const P2PKH_UNLOCKING_SCRIPT_LENGTH: u64 = 107;

/// The BRC-29 derivation protocol.
pub fn brc29_protocol() -> ProtocolId {
    ProtocolId::new(SecurityLevel::Counterparty, BRC29_PROTOCOL_NAME)
}

/// Key id from the BRC-29 derivation prefix and suffix.
pub fn key_id(prefix: &str, suffix: &str) -> String {
    format!("{prefix} {suffix}")
}

/// Locking script paying the counterparty's derived child key.
pub fn lock_for_counterparty(
    deriver: &KeyDeriver,
    prefix: &str,
    suffix: &str,
    counterparty: &Counterparty,
) -> Result<Script, Error> {
    let child =
        deriver.derive_public(&brc29_protocol(), &key_id(prefix, suffix), counterparty, false)?;
    Ok(Script::p2pkh(&hash160(&child.serialize())))
}

/// Locking script paying the wallet's own derived child key, as used
/// for change.
pub fn lock_for_self(deriver: &KeyDeriver, prefix: &str, suffix: &str) -> Result<Script, Error> {
    let child = deriver.derive_public(
        &brc29_protocol(),
        &key_id(prefix, suffix),
        &Counterparty::Myself,
        true,
    )?;
    Ok(Script::p2pkh(&hash160(&child.serialize())))
}

/// Unlocking-script producer for an output locked with the matching
/// derivation context.
pub fn unlock<'a>(
    deriver: &'a KeyDeriver,
    prefix: &str,
    suffix: &str,
    counterparty: Counterparty,
) -> UnlockingTemplate<'a> {
    UnlockingTemplate {
        deriver,
        key_id: key_id(prefix, suffix),
        counterparty,
    }
}

pub struct UnlockingTemplate<'a> {
    deriver: &'a KeyDeriver,
    key_id: String,
    counterparty: Counterparty,
}

impl UnlockingTemplate<'_> {
    /// Fee-planning length of the script this template will produce.
    pub fn estimated_length(&self) -> u64 {
        P2PKH_UNLOCKING_SCRIPT_LENGTH
    }

    /// `<sig || sighashType> <pubkey>` for input `vin`, committing to
    /// the spent output's locking script and value.
    pub fn sign(
        &self,
        tx: &Transaction,
        vin: usize,
        locking_script: &Script,
        satoshis: u64,
    ) -> Result<Script, Error> {
        let child =
            self.deriver
                .derive_private(&brc29_protocol(), &self.key_id, &self.counterparty)?;
        let child_pub = self.deriver.public_key_of(&child);

        // Refuse to sign for an output the derived key cannot spend.
        let expected = Script::p2pkh(&hash160(&child_pub.serialize()));
        if *locking_script != expected {
            return Err(Error::KeyMismatch);
        }

        let digest = sighash_forkid(tx, vin, locking_script, satoshis, SIGHASH_ALL_FORKID)?;
        let mut sig_with_type = self
            .deriver
            .sign_digest(&child, &digest)
            .serialize_der()
            .to_vec();
        sig_with_type.push(SIGHASH_ALL_FORKID as u8);

        let mut script = Script::new();
        script
            .push_data(&sig_with_type)
            .push_data(&child_pub.serialize());
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_crypto::RootKey;
    use satchel_primitives::transaction::{OutPoint, TxInput, TxOutput, Txid};

    fn deriver(seed: u8) -> KeyDeriver {
        KeyDeriver::new(RootKey::new([seed; 32])).unwrap()
    }

    #[test]
    fn lock_is_p2pkh() {
        let kd = deriver(0x42);
        let script = lock_for_self(&kd, "prefix", "0").unwrap();
        assert!(script.is_p2pkh());
    }

    #[test]
    fn matched_lock_unlock_verifies() {
        let alice = deriver(0x11);
        let bob = deriver(0x22);
        let alice_key = Counterparty::Other(alice.identity_public_key().serialize());
        let bob_key = Counterparty::Other(bob.identity_public_key().serialize());

        // Alice locks a payment to Bob.
        let lock = lock_for_counterparty(&alice, "inv-1", "0", &bob_key).unwrap();

        let mut tx = Transaction::default();
        tx.inputs
            .push(TxInput::new(OutPoint::new(Txid::from_raw_tx(b"prev"), 0)));
        tx.outputs.push(TxOutput::new(900, Script::default()));

        // Bob produces the unlocking script with his derivation.
        let unlocking = unlock(&bob, "inv-1", "0", alice_key)
            .sign(&tx, 0, &lock, 1000)
            .unwrap();

        // sig push + key push land in the expected size window.
        assert!(unlocking.len() >= 105 && unlocking.len() <= 107);
    }

    #[test]
    fn mismatched_context_refused() {
        let alice = deriver(0x11);
        let bob = deriver(0x22);
        let bob_key = Counterparty::Other(bob.identity_public_key().serialize());
        let lock = lock_for_counterparty(&alice, "inv-1", "0", &bob_key).unwrap();

        let mut tx = Transaction::default();
        tx.inputs
            .push(TxInput::new(OutPoint::new(Txid::from_raw_tx(b"prev"), 0)));
        tx.outputs.push(TxOutput::new(900, Script::default()));

        // Bob derives with the wrong suffix; the key cannot spend.
        let alice_key = Counterparty::Other(alice.identity_public_key().serialize());
        let result = unlock(&bob, "inv-1", "1", alice_key).sign(&tx, 0, &lock, 1000);
        assert!(matches!(result, Err(Error::KeyMismatch)));
    }

    #[test]
    fn distinct_suffixes_distinct_locks() {
        let kd = deriver(0x42);
        let a = lock_for_self(&kd, "p", "0").unwrap();
        let b = lock_for_self(&kd, "p", "1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn signature_commits_to_value() {
        let kd = deriver(0x42);
        let lock = lock_for_self(&kd, "p", "0").unwrap();

        let mut tx = Transaction::default();
        tx.inputs
            .push(TxInput::new(OutPoint::new(Txid::from_raw_tx(b"prev"), 0)));
        tx.outputs.push(TxOutput::new(1, Script::default()));

        let template = unlock(&kd, "p", "0", Counterparty::Myself);
        let a = template.sign(&tx, 0, &lock, 1000).unwrap();
        let b = template.sign(&tx, 0, &lock, 2000).unwrap();
        assert_ne!(a, b);
    }
}
