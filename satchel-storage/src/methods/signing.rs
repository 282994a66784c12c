//! Signing of wallet-owned inputs from their stored derivation
//! context.

use crate::provider::rows;
use crate::StorageError;
use rusqlite::Connection;
use satchel_codec::envelope::Counterparty;
use satchel_crypto::KeyDeriver;
use satchel_primitives::{Script, Transaction};
use satchel_txbuilder::template::unlock;

/// Fill in the unlocking script of every input the wallet reserved
/// under `reference`, using each output row's derivation context.
/// Inputs belonging to other parties are left untouched.
pub(crate) fn sign_reserved_inputs(
    c: &Connection,
    deriver: &KeyDeriver,
    user_id: i64,
    reference: &str,
    tx: &mut Transaction,
) -> Result<(), StorageError> {
    for vin in 0..tx.inputs.len() {
        if !tx.inputs[vin].unlocking_script.is_empty() {
            continue;
        }
        let prev = tx.inputs[vin].prev_out;
        let record =
            match rows::find_output_by_outpoint(c, user_id, &prev.txid.to_string(), prev.vout)? {
                Some(record) => record,
                None => continue,
            };
        if record.reserved_by.as_deref() != Some(reference) {
            continue;
        }
        let (prefix, suffix) = match (&record.derivation_prefix, &record.derivation_suffix) {
            (Some(p), Some(s)) => (p.clone(), s.clone()),
            _ => {
                return Err(StorageError::InvalidArgument(format!(
                    "output {} has no derivation context",
                    record.output_id
                )))
            }
        };
        let counterparty = match &record.sender_identity_key {
            Some(key) => Counterparty::from_hex(key).ok_or_else(|| {
                StorageError::InvalidArgument(format!(
                    "output {} has a malformed sender key",
                    record.output_id
                ))
            })?,
            None => Counterparty::Myself,
        };
        let locking_script = record
            .locking_script
            .as_deref()
            .map(Script::from_hex)
            .transpose()
            .map_err(|e| StorageError::InvalidArgument(e.to_string()))?
            .ok_or_else(|| {
                StorageError::InvalidArgument(format!(
                    "output {} has no locking script",
                    record.output_id
                ))
            })?;

        let template = unlock(deriver, &prefix, &suffix, counterparty);
        let script = template.sign(tx, vin, &locking_script, record.satoshis as u64)?;
        tx.inputs[vin].unlocking_script = script;
    }
    Ok(())
}
