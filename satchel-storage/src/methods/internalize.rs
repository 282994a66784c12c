//! Record an externally produced transaction's outputs as wallet
//! property.

use super::new_reference;
use crate::entities::{output_purpose, DEFAULT_BASKET_NAME};
use crate::provider::rows::{self, NewAction, NewOutput};
use crate::{StorageError, StorageProvider};
use satchel_codec::envelope::{
    ActionStatus, Counterparty, InternalizeActionArgs, InternalizeProtocol,
};
use satchel_crypto::hash::hash160;
use satchel_crypto::KeyDeriver;
use satchel_primitives::{AtomicBeef, Script, Transaction};
use satchel_txbuilder::template::{brc29_protocol, key_id};
use tracing::info;

/// Validate and persist the wallet-destined outputs of an external
/// transaction. Any failed check rolls the whole internalize back.
pub fn internalize_action(
    provider: &StorageProvider,
    deriver: &KeyDeriver,
    user_id: i64,
    args: &InternalizeActionArgs,
) -> Result<bool, StorageError> {
    if args.outputs.is_empty() {
        return Err(StorageError::InvalidArgument(
            "nothing to internalize".into(),
        ));
    }
    let atomic = AtomicBeef::from_bytes(&args.tx)?;
    let raw = atomic.subject_raw_tx()?.to_vec();
    let tx = Transaction::from_bytes(&raw)?;
    let txid = atomic.subject.to_string();
    let bump = atomic.beef.bump_for(&atomic.subject).cloned();

    provider.with_tx(|c| {
        let reference = new_reference();
        // A mined proof in the BEEF makes the action immediately
        // complete; otherwise review picks it up later.
        let status = if bump.is_some() {
            ActionStatus::Completed
        } else {
            ActionStatus::Unproven
        };

        let mut total: i64 = 0;
        let mut planned: Vec<NewOutputPlan> = Vec::with_capacity(args.outputs.len());
        for spec in &args.outputs {
            let vout = spec.output_index;
            let output = tx.outputs.get(vout as usize).ok_or_else(|| {
                StorageError::InvalidArgument(format!("transaction has no output {vout}"))
            })?;

            let plan = match spec.protocol {
                InternalizeProtocol::WalletPayment => {
                    let remittance = spec.payment_remittance.as_ref().ok_or_else(|| {
                        StorageError::InvalidArgument(format!(
                            "output {vout} is a wallet payment without remittance"
                        ))
                    })?;
                    let sender = Counterparty::from_hex(&remittance.sender_identity_key)
                        .ok_or_else(|| StorageError::ScriptMismatch {
                            vout,
                            reason: "malformed sender identity key".into(),
                        })?;
                    // Re-derive the locking script the sender must have
                    // used and require an exact match.
                    let child = deriver.derive_public(
                        &brc29_protocol(),
                        &key_id(&remittance.derivation_prefix, &remittance.derivation_suffix),
                        &sender,
                        true,
                    )?;
                    let expected = Script::p2pkh(&hash160(&child.serialize()));
                    if output.locking_script != expected {
                        return Err(StorageError::ScriptMismatch {
                            vout,
                            reason: "locking script does not pay the derived key".into(),
                        });
                    }
                    NewOutputPlan {
                        vout,
                        satoshis: output.satoshis as i64,
                        locking_script: output.locking_script.to_string(),
                        basket: DEFAULT_BASKET_NAME.to_string(),
                        custom_instructions: None,
                        tags: Vec::new(),
                        derivation: Some((
                            remittance.derivation_prefix.clone(),
                            remittance.derivation_suffix.clone(),
                            remittance.sender_identity_key.clone(),
                        )),
                    }
                }
                InternalizeProtocol::BasketInsertion => {
                    let remittance = spec.insertion_remittance.as_ref().ok_or_else(|| {
                        StorageError::InvalidArgument(format!(
                            "output {vout} is a basket insertion without remittance"
                        ))
                    })?;
                    if output.locking_script.is_empty() {
                        return Err(StorageError::ScriptMismatch {
                            vout,
                            reason: "empty locking script".into(),
                        });
                    }
                    NewOutputPlan {
                        vout,
                        satoshis: output.satoshis as i64,
                        locking_script: output.locking_script.to_string(),
                        basket: remittance.basket.clone(),
                        custom_instructions: remittance.custom_instructions.clone(),
                        tags: remittance.tags.clone(),
                        derivation: None,
                    }
                }
            };
            total += plan.satoshis;
            planned.push(plan);
        }

        let action_id = rows::insert_action(
            c,
            &NewAction {
                user_id,
                reference: &reference,
                description: &args.description,
                version: tx.version,
                lock_time: tx.lock_time,
                status,
                satoshis: total,
                is_outgoing: false,
                input_beef: Some(&args.tx),
            },
        )?;
        rows::set_action_transaction(c, action_id, &txid, &raw)?;

        for label in &args.labels {
            let label_id = rows::find_or_create_label(c, user_id, label)?;
            rows::label_action(c, action_id, label_id)?;
        }

        for plan in &planned {
            let basket = rows::find_or_create_basket(c, user_id, &plan.basket)?;
            let (prefix, suffix, sender) = match &plan.derivation {
                Some((p, s, k)) => (Some(p.as_str()), Some(s.as_str()), Some(k.as_str())),
                None => (None, None, None),
            };
            let output_id = rows::insert_output(
                c,
                &NewOutput {
                    user_id,
                    action_id,
                    vout: plan.vout,
                    satoshis: plan.satoshis,
                    locking_script: Some(&plan.locking_script),
                    spendable: true,
                    change: false,
                    basket_id: Some(basket.basket_id),
                    purpose: output_purpose::INTERNALIZED,
                    custom_instructions: plan.custom_instructions.as_deref(),
                    derivation_prefix: prefix,
                    derivation_suffix: suffix,
                    sender_identity_key: sender,
                },
            )?;
            for tag in &plan.tags {
                let tag_id = rows::find_or_create_tag(c, user_id, tag)?;
                rows::tag_output(c, output_id, tag_id)?;
            }
        }

        if let Some(bump) = &bump {
            rows::insert_proven_tx(c, &txid, bump.block_height, &bump.to_bytes())?;
        }

        info!(txid, outputs = planned.len(), "action internalized");
        Ok(true)
    })
}

struct NewOutputPlan {
    vout: u32,
    satoshis: i64,
    locking_script: String,
    basket: String,
    custom_instructions: Option<String>,
    tags: Vec<String>,
    derivation: Option<(String, String, String)>,
}
