//! Persist a finalized, signed transaction: record the txid, spend
//! the inputs, activate the created outputs and enqueue broadcast.

use crate::provider::rows;
use crate::StorageError;
use rusqlite::Connection;
use satchel_codec::envelope::ActionStatus;
use satchel_primitives::Transaction;
use tracing::info;

pub struct ProcessActionArgs {
    pub reference: String,
    pub raw_tx: Vec<u8>,
    pub no_send: bool,
    pub accept_delayed_broadcast: bool,
}

#[derive(Debug, Clone)]
pub struct ProcessActionResult {
    pub txid: String,
    pub action_id: i64,
    /// `"txid.vout"` of withheld change, on `noSend` actions.
    pub no_send_change: Vec<String>,
    /// A broadcast request was enqueued and the caller asked for an
    /// immediate post rather than the background tick.
    pub wants_immediate_post: bool,
}

/// Steps 1-3 of processing, inside the caller's transaction.
/// Broadcast itself happens post-commit.
pub(crate) fn process_in_tx(
    c: &Connection,
    user_id: i64,
    action_id: i64,
    reference: &str,
    tx: &Transaction,
    no_send: bool,
    accept_delayed_broadcast: bool,
) -> Result<ProcessActionResult, StorageError> {
    let raw = tx.to_bytes();
    let txid = tx.txid().to_string();

    rows::set_action_transaction(c, action_id, &txid, &raw)?;
    let status = if no_send {
        ActionStatus::Nosend
    } else {
        ActionStatus::Signed
    };
    rows::update_action_status(c, action_id, status)?;

    // Spend the wallet-owned inputs.
    for input in &tx.inputs {
        let prev = input.prev_out;
        if let Some(record) =
            rows::find_output_by_outpoint(c, user_id, &prev.txid.to_string(), prev.vout)?
        {
            rows::mark_spent(c, record.output_id, action_id)?;
        }
    }

    // The action's basket-owned outputs become spendable wallet
    // property; outputs paid away stay inert.
    rows::activate_outputs(c, action_id)?;
    rows::release_outputs(c, reference)?;

    let mut no_send_change = Vec::new();
    if no_send {
        for output in rows::outputs_for_action(c, action_id)? {
            if output.change {
                no_send_change.push(output.outpoint(&txid));
            }
        }
    } else {
        rows::insert_req(c, user_id, action_id, &txid, &raw)?;
    }

    info!(txid, action_id, no_send, "action processed");
    Ok(ProcessActionResult {
        txid,
        action_id,
        no_send_change,
        wants_immediate_post: !no_send && !accept_delayed_broadcast,
    })
}

/// Persist a transaction signed out of band against its draft action.
pub fn process_action(
    provider: &crate::StorageProvider,
    user_id: i64,
    args: &ProcessActionArgs,
) -> Result<ProcessActionResult, StorageError> {
    let tx = Transaction::from_bytes(&args.raw_tx)?;
    provider.with_tx(|c| {
        let action = rows::find_action_by_reference(c, user_id, &args.reference)?
            .ok_or(StorageError::NotFound("action"))?;
        // An action that already carries a txid must agree with the
        // raw bytes resubmitted to us.
        if let Some(expected) = &action.txid {
            let actual = tx.txid().to_string();
            if *expected != actual {
                return Err(StorageError::TxidMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        process_in_tx(
            c,
            user_id,
            action.action_id,
            &args.reference,
            &tx,
            args.no_send,
            args.accept_delayed_broadcast,
        )
    })
}
