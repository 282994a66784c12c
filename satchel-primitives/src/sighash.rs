//! BIP-143 signature hashes with the BSV FORKID scheme.
//!
//! With FORKID set (mandatory on BSV), the preimage commits to the
//! value of the spent output and to aggregate hashes of prevouts,
//! sequences and outputs, rather than to a mutated copy of the
//! transaction.

use crate::script::Script;
use crate::transaction::Transaction;
use crate::Error;
use satchel_codec::Writer;
use satchel_crypto::hash::{sha256d, Hash};

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_FORKID: u32 = 0x40;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// The default for every wallet-produced signature.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

const BASE_TYPE_MASK: u32 = 0x1F;

fn hash_prevouts(tx: &Transaction) -> Hash<32> {
    let mut w = Writer::new();
    for input in &tx.inputs {
        w.put_bytes(input.prev_out.txid.internal());
        w.put_u32(input.prev_out.vout);
    }
    sha256d(&w.into_bytes())
}

fn hash_sequence(tx: &Transaction) -> Hash<32> {
    let mut w = Writer::new();
    for input in &tx.inputs {
        w.put_u32(input.sequence);
    }
    sha256d(&w.into_bytes())
}

fn hash_outputs(tx: &Transaction) -> Hash<32> {
    let mut w = Writer::new();
    for output in &tx.outputs {
        w.put_u64(output.satoshis);
        w.put_var_bytes(output.locking_script.as_bytes());
    }
    sha256d(&w.into_bytes())
}

fn hash_single_output(tx: &Transaction, vin: usize) -> Hash<32> {
    let mut w = Writer::new();
    let output = &tx.outputs[vin];
    w.put_u64(output.satoshis);
    w.put_var_bytes(output.locking_script.as_bytes());
    sha256d(&w.into_bytes())
}

/// The double-SHA-256 digest an input signature commits to.
///
/// `script_code` is the locking script of the output being spent and
/// `satoshis` its value.
pub fn sighash_forkid(
    tx: &Transaction,
    vin: usize,
    script_code: &Script,
    satoshis: u64,
    sighash_type: u32,
) -> Result<Hash<32>, Error> {
    let input = tx.inputs.get(vin).ok_or(Error::InputIndex(vin))?;

    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;
    let base_type = sighash_type & BASE_TYPE_MASK;

    let zero = Hash::new([0u8; 32]);
    let prevouts = if anyone_can_pay {
        zero
    } else {
        hash_prevouts(tx)
    };
    let sequences = if anyone_can_pay || base_type == SIGHASH_NONE || base_type == SIGHASH_SINGLE {
        zero
    } else {
        hash_sequence(tx)
    };
    let outputs = match base_type {
        SIGHASH_NONE => zero,
        SIGHASH_SINGLE if vin < tx.outputs.len() => hash_single_output(tx, vin),
        SIGHASH_SINGLE => zero,
        _ => hash_outputs(tx),
    };

    let mut w = Writer::new();
    w.put_u32(tx.version);
    w.put_bytes(prevouts.as_ref());
    w.put_bytes(sequences.as_ref());
    w.put_bytes(input.prev_out.txid.internal());
    w.put_u32(input.prev_out.vout);
    w.put_var_bytes(script_code.as_bytes());
    w.put_u64(satoshis);
    w.put_u32(input.sequence);
    w.put_bytes(outputs.as_ref());
    w.put_u32(tx.lock_time);
    w.put_u32(sighash_type);

    Ok(sha256d(&w.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{OutPoint, TxInput, TxOutput, Txid};
    use satchel_crypto::hash::hash160;

    fn sample_tx() -> Transaction {
        let txid = Txid::from_raw_tx(b"parent");
        Transaction {
            version: 1,
            inputs: vec![TxInput::new(OutPoint::new(txid, 0))],
            outputs: vec![TxOutput::new(
                900,
                Script::p2pkh(&hash160(&[2u8; 33])),
            )],
            lock_time: 0,
        }
    }

    #[test]
    fn digest_changes_with_value() {
        let tx = sample_tx();
        let script = Script::p2pkh(&hash160(&[2u8; 33]));
        let a = sighash_forkid(&tx, 0, &script, 1000, SIGHASH_ALL_FORKID).unwrap();
        let b = sighash_forkid(&tx, 0, &script, 1001, SIGHASH_ALL_FORKID).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_stable_for_same_input() {
        let tx = sample_tx();
        let script = Script::p2pkh(&hash160(&[2u8; 33]));
        let a = sighash_forkid(&tx, 0, &script, 1000, SIGHASH_ALL_FORKID).unwrap();
        let b = sighash_forkid(&tx, 0, &script, 1000, SIGHASH_ALL_FORKID).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_input_rejected() {
        let tx = sample_tx();
        let script = Script::default();
        assert!(matches!(
            sighash_forkid(&tx, 5, &script, 1000, SIGHASH_ALL_FORKID),
            Err(Error::InputIndex(5))
        ));
    }
}
