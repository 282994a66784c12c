//! Serialized-size estimation for fee calculation.
//!
//! Mirrors the constants of the consensus encoding: a 40-byte fixed
//! input overhead (outpoint + sequence), an 8-byte output value, and
//! an 8-byte envelope for version plus lock time.

use crate::Error;
use satchel_codec::varint_len;

const INPUT_OVERHEAD: u64 = 40;
const OUTPUT_OVERHEAD: u64 = 8;
const ENVELOPE: u64 = 8;

/// Serialized size of one input given its unlocking script length.
pub fn transaction_input_size(unlocking_script_len: u64) -> u64 {
    INPUT_OVERHEAD + unlocking_script_len + varint_len(unlocking_script_len) as u64
}

/// Serialized size of one output given its locking script length.
pub fn transaction_output_size(locking_script_len: u64) -> u64 {
    OUTPUT_OVERHEAD + locking_script_len + varint_len(locking_script_len) as u64
}

/// Serialized size of a whole transaction from per-element script
/// lengths.
pub fn transaction_size(
    input_script_lens: impl IntoIterator<Item = u64>,
    output_script_lens: impl IntoIterator<Item = u64>,
) -> Result<u64, Error> {
    let mut size: u64 = ENVELOPE;
    let mut inputs: u64 = 0;
    for len in input_script_lens {
        inputs += 1;
        size = size
            .checked_add(transaction_input_size(len))
            .ok_or(Error::TransactionSize)?;
    }
    let mut outputs: u64 = 0;
    for len in output_script_lens {
        outputs += 1;
        size = size
            .checked_add(transaction_output_size(len))
            .ok_or(Error::TransactionSize)?;
    }
    size = size
        .checked_add(varint_len(inputs) as u64)
        .and_then(|s| s.checked_add(varint_len(outputs) as u64))
        .ok_or(Error::TransactionSize)?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// P2PKH unlocking scripts run 106-107 bytes; 107 is the planning
    /// figure.
    pub const P2PKH_UNLOCK_LEN: u64 = 107;
    pub const P2PKH_LOCK_LEN: u64 = 25;

    #[test]
    fn empty_transaction_is_envelope_plus_counts() {
        assert_eq!(transaction_size([], []).unwrap(), 10);
    }

    #[test]
    fn one_in_one_out_p2pkh() {
        let size = transaction_size([P2PKH_UNLOCK_LEN], [P2PKH_LOCK_LEN]).unwrap();
        // 8 + 1 + 1 + (40 + 107 + 1) + (8 + 25 + 1)
        assert_eq!(size, 192);
    }

    #[test]
    fn varint_boundary_in_script_len() {
        // A 253-byte script needs a 3-byte varint.
        assert_eq!(transaction_input_size(253), 40 + 253 + 3);
        assert_eq!(transaction_input_size(252), 40 + 252 + 1);
    }

    #[test]
    fn matches_real_serialization() {
        use crate::script::Script;
        use crate::transaction::{OutPoint, Transaction, TxInput, TxOutput, Txid};

        let mut unlocking = Script::new();
        unlocking.push_data(&[0xAB; 71]).push_data(&[0xCD; 33]);
        let tx = Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_out: OutPoint::new(Txid::from_raw_tx(b"x"), 1),
                unlocking_script: unlocking.clone(),
                sequence: 0xFFFF_FFFF,
            }],
            outputs: vec![TxOutput::new(
                1000,
                Script::from_bytes(vec![0u8; 25]),
            )],
            lock_time: 0,
        };
        let estimated =
            transaction_size([unlocking.len() as u64], [25]).unwrap();
        assert_eq!(estimated, tx.to_bytes().len() as u64);
    }
}
