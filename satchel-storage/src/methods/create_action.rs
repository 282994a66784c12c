//! Draft construction: validate the caller's action spec, fund it
//! through change generation, build the transaction, persist the
//! draft and either sign it internally or hand back signing material.

use super::generate_change::{generate_change, ChangeParams, DEFAULT_FEE_RATE_SAT_PER_KB};
use super::process_action::{process_in_tx, ProcessActionResult};
use super::signing::sign_reserved_inputs;
use super::{new_derivation_part, new_reference};
use crate::entities::{output_purpose, DEFAULT_BASKET_NAME};
use crate::provider::rows::{self, NewAction, NewOutput};
use crate::{StorageError, StorageProvider};
use satchel_codec::envelope::{
    ActionStatus, CreateActionArgs, CreateActionResult, SignableTransaction,
};
use satchel_crypto::KeyDeriver;
use satchel_primitives::beef::build_atomic_beef;
use satchel_primitives::transaction::{DEFAULT_VERSION, OutPoint, Transaction, TxInput, TxOutput};
use satchel_primitives::Script;
use satchel_txbuilder::{lock_for_self, P2PKH_UNLOCKING_SCRIPT_LENGTH};
use tracing::debug;

/// What `createAction` produced, plus what the orchestrator still owes
/// the caller: an immediate broadcast or a `sendWith` batch.
pub struct CreateActionOutcome {
    pub result: CreateActionResult,
    pub action_id: i64,
    pub reference: String,
    pub processed: Option<ProcessActionResult>,
    pub send_with: Vec<String>,
}

struct ResolvedInput {
    outpoint: OutPoint,
    satoshis: u64,
    unlocking_script: Option<Script>,
    script_len: u64,
    sequence: u32,
}

pub fn create_action(
    provider: &StorageProvider,
    deriver: &KeyDeriver,
    user_id: i64,
    args: &CreateActionArgs,
) -> Result<CreateActionOutcome, StorageError> {
    if args.description.is_empty() {
        return Err(StorageError::InvalidArgument(
            "description must not be empty".into(),
        ));
    }
    if args.outputs.is_empty() && args.inputs.is_empty() {
        return Err(StorageError::InvalidArgument(
            "an action needs at least one input or output".into(),
        ));
    }

    let options = args.options.clone().unwrap_or_default();
    let no_send = options.no_send.unwrap_or(false);
    let sign_and_process = options.sign_and_process.unwrap_or(true);
    let accept_delayed = options.accept_delayed_broadcast.unwrap_or(true);
    let send_with = options.send_with.clone().unwrap_or_default();

    // Parse the caller's output scripts up front; a bad script must
    // fail before anything is persisted or reserved.
    let mut user_outputs: Vec<(Script, u64)> = Vec::with_capacity(args.outputs.len());
    for output in &args.outputs {
        let script = Script::from_hex(&output.locking_script)
            .map_err(|e| StorageError::InvalidArgument(format!("bad locking script: {e}")))?;
        user_outputs.push((script, output.satoshis));
    }

    let reference = new_reference();
    let derivation_prefix = new_derivation_part();

    provider.with_tx(|c| {
        let basket = rows::find_or_create_basket(c, user_id, DEFAULT_BASKET_NAME)?;

        // Resolve caller-specified inputs to wallet outputs.
        let mut resolved: Vec<ResolvedInput> = Vec::with_capacity(args.inputs.len());
        for input in &args.inputs {
            let outpoint = OutPoint::parse(&input.outpoint)
                .map_err(|e| StorageError::InvalidArgument(e.to_string()))?;
            let record = rows::find_output_by_outpoint(
                c,
                user_id,
                &outpoint.txid.to_string(),
                outpoint.vout,
            )?
            .ok_or_else(|| {
                StorageError::InvalidArgument(format!("unknown input {}", input.outpoint))
            })?;
            if !record.spendable {
                return Err(StorageError::InvalidArgument(format!(
                    "input {} is not spendable",
                    input.outpoint
                )));
            }
            let unlocking_script = input
                .unlocking_script
                .as_deref()
                .map(Script::from_hex)
                .transpose()
                .map_err(|e| StorageError::InvalidArgument(format!("bad unlocking script: {e}")))?;
            let script_len = unlocking_script
                .as_ref()
                .map(|s| s.len() as u64)
                .or(input.unlocking_script_length.map(u64::from))
                .unwrap_or(P2PKH_UNLOCKING_SCRIPT_LENGTH);
            resolved.push(ResolvedInput {
                outpoint,
                satoshis: record.satoshis as u64,
                unlocking_script,
                script_len,
                sequence: input.sequence_number.unwrap_or(0xFFFF_FFFF),
            });
        }

        // Fund the difference through change selection.
        let target: u64 = user_outputs.iter().map(|(_, sat)| *sat).sum();
        let funding = generate_change(
            c,
            user_id,
            &basket,
            &ChangeParams {
                target_satoshis: target,
                provided_input_satoshis: resolved.iter().map(|i| i.satoshis).sum(),
                provided_input_script_lens: resolved.iter().map(|i| i.script_len).collect(),
                output_script_lens: user_outputs.iter().map(|(s, _)| s.len() as u64).collect(),
                fee_rate_sat_per_kb: DEFAULT_FEE_RATE_SAT_PER_KB,
                reference: reference.clone(),
            },
        )?;

        // Reserve the provided inputs under the same reference so a
        // concurrent action cannot double-spend them.
        let provided_ids: Vec<i64> = resolved
            .iter()
            .map(|input| {
                rows::find_output_by_outpoint(
                    c,
                    user_id,
                    &input.outpoint.txid.to_string(),
                    input.outpoint.vout,
                )
                .map(|r| r.map(|r| r.output_id))
            })
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .flatten()
            .collect();
        rows::reserve_outputs(c, user_id, &provided_ids, &reference)?;

        // Assemble the draft transaction: caller inputs, then change
        // inputs; caller outputs, then change outputs.
        let mut tx = Transaction {
            version: args.version.unwrap_or(DEFAULT_VERSION),
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: args.lock_time.unwrap_or(0),
        };
        for input in &resolved {
            tx.inputs.push(TxInput {
                prev_out: input.outpoint,
                unlocking_script: input.unlocking_script.clone().unwrap_or_default(),
                sequence: input.sequence,
            });
        }
        for selected in &funding.selected {
            let owner = rows::find_action_by_id(c, selected.action_id)?
                .and_then(|a| a.txid)
                .ok_or(StorageError::NotFound("funding input txid"))?;
            let txid = owner
                .parse()
                .map_err(|_| StorageError::InvalidArgument("stored txid malformed".into()))?;
            tx.inputs
                .push(TxInput::new(OutPoint::new(txid, selected.vout)));
        }
        for (script, satoshis) in &user_outputs {
            tx.outputs.push(TxOutput::new(*satoshis, script.clone()));
        }
        let change_base = tx.outputs.len() as u32;
        let mut change_scripts = Vec::new();
        for (i, satoshis) in funding.change_satoshis.iter().enumerate() {
            let suffix = i.to_string();
            let script = lock_for_self(deriver, &derivation_prefix, &suffix)?;
            tx.outputs.push(TxOutput::new(*satoshis, script.clone()));
            change_scripts.push((suffix, script));
        }

        // Net effect on the user: wallet-owned creations minus
        // wallet-owned spends.
        let created: i64 = funding.change_satoshis.iter().map(|v| *v as i64).sum::<i64>()
            + args
                .outputs
                .iter()
                .filter(|o| o.basket.is_some())
                .map(|o| o.satoshis as i64)
                .sum::<i64>();
        let spent: i64 =
            funding.selected_satoshis() as i64 + resolved.iter().map(|i| i.satoshis as i64).sum::<i64>();
        let net = created - spent;

        let action_id = rows::insert_action(
            c,
            &NewAction {
                user_id,
                reference: &reference,
                description: &args.description,
                version: tx.version,
                lock_time: tx.lock_time,
                status: ActionStatus::Unsigned,
                satoshis: net,
                is_outgoing: true,
                input_beef: None,
            },
        )?;

        for label in &args.labels {
            let label_id = rows::find_or_create_label(c, user_id, label)?;
            rows::label_action(c, action_id, label_id)?;
        }

        // Persist the planned outputs: the caller's, then change.
        for (vout, output) in args.outputs.iter().enumerate() {
            let basket_id = match &output.basket {
                Some(name) => Some(rows::find_or_create_basket(c, user_id, name)?.basket_id),
                None => None,
            };
            let output_id = rows::insert_output(
                c,
                &NewOutput {
                    user_id,
                    action_id,
                    vout: vout as u32,
                    satoshis: output.satoshis as i64,
                    locking_script: Some(&output.locking_script),
                    spendable: false,
                    change: false,
                    basket_id,
                    purpose: output_purpose::PAYMENT,
                    custom_instructions: output.custom_instructions.as_deref(),
                    derivation_prefix: None,
                    derivation_suffix: None,
                    sender_identity_key: None,
                },
            )?;
            for tag in output.tags.iter().flatten() {
                let tag_id = rows::find_or_create_tag(c, user_id, tag)?;
                rows::tag_output(c, output_id, tag_id)?;
            }
        }
        for (i, (suffix, script)) in change_scripts.iter().enumerate() {
            let script_hex = script.to_string();
            rows::insert_output(
                c,
                &NewOutput {
                    user_id,
                    action_id,
                    vout: change_base + i as u32,
                    satoshis: funding.change_satoshis[i] as i64,
                    locking_script: Some(&script_hex),
                    spendable: false,
                    change: true,
                    basket_id: Some(basket.basket_id),
                    purpose: output_purpose::CHANGE,
                    custom_instructions: None,
                    derivation_prefix: Some(&derivation_prefix),
                    derivation_suffix: Some(suffix),
                    sender_identity_key: None,
                },
            )?;
        }

        let needs_external_signature = resolved.iter().any(|i| i.unlocking_script.is_none());

        if needs_external_signature || !sign_and_process {
            rows::set_action_raw_tx(c, action_id, &tx.to_bytes())?;
            let atomic = build_atomic_beef(&tx.to_bytes(), None);
            debug!(reference, "draft returned for external signing");
            return Ok(CreateActionOutcome {
                result: CreateActionResult {
                    signable_transaction: Some(SignableTransaction {
                        tx: atomic.to_bytes(),
                        reference: reference.clone(),
                    }),
                    ..Default::default()
                },
                action_id,
                reference: reference.clone(),
                processed: None,
                send_with,
            });
        }

        // Fully wallet-funded: sign our inputs and process in place.
        sign_reserved_inputs(c, deriver, user_id, &reference, &mut tx)?;
        let processed = process_in_tx(
            c,
            user_id,
            action_id,
            &reference,
            &tx,
            no_send,
            accept_delayed,
        )?;
        let atomic = build_atomic_beef(&tx.to_bytes(), None);

        Ok(CreateActionOutcome {
            result: CreateActionResult {
                txid: Some(processed.txid.clone()),
                tx: Some(atomic.to_bytes()),
                no_send_change: (!processed.no_send_change.is_empty())
                    .then(|| processed.no_send_change.clone()),
                ..Default::default()
            },
            action_id,
            reference: reference.clone(),
            processed: Some(processed),
            send_with,
        })
    })
}
