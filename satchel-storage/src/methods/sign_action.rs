//! Complete a draft action with caller-provided unlocking scripts.

use super::process_action::{process_in_tx, ProcessActionResult};
use super::signing::sign_reserved_inputs;
use crate::provider::rows;
use crate::{StorageError, StorageProvider};
use satchel_codec::envelope::{ActionStatus, SignActionArgs};
use satchel_crypto::KeyDeriver;
use satchel_primitives::{Script, Transaction};

/// Apply the caller's spends to the stored draft, sign the wallet's
/// own inputs, and process the finalized transaction.
pub fn sign_action(
    provider: &StorageProvider,
    deriver: &KeyDeriver,
    user_id: i64,
    args: &SignActionArgs,
) -> Result<ProcessActionResult, StorageError> {
    provider.with_tx(|c| {
        let action = rows::find_action_by_reference(c, user_id, &args.reference)?
            .ok_or(StorageError::NotFound("action"))?;
        if action.status != ActionStatus::Unsigned {
            return Err(StorageError::InvalidTransition {
                from: action.status,
                to: ActionStatus::Signed,
            });
        }
        let raw = action
            .raw_tx
            .as_deref()
            .ok_or(StorageError::NotFound("draft transaction"))?;
        let mut tx = Transaction::from_bytes(raw)?;

        for (vin, spend) in &args.spends {
            let vin = *vin as usize;
            let input = tx
                .inputs
                .get_mut(vin)
                .ok_or_else(|| StorageError::InvalidArgument(format!("no input {vin}")))?;
            input.unlocking_script = Script::from_hex(&spend.unlocking_script)
                .map_err(|e| StorageError::InvalidArgument(format!("bad unlocking script: {e}")))?;
            if let Some(sequence) = spend.sequence_number {
                input.sequence = sequence;
            }
        }

        sign_reserved_inputs(c, deriver, user_id, &args.reference, &mut tx)?;

        // Every input must now carry a script.
        if let Some(vin) = tx.inputs.iter().position(|i| i.unlocking_script.is_empty()) {
            return Err(StorageError::InvalidArgument(format!(
                "input {vin} is still unsigned"
            )));
        }

        process_in_tx(
            c,
            user_id,
            action.action_id,
            &args.reference,
            &tx,
            false,
            true,
        )
    })
}
