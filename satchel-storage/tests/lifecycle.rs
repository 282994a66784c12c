//! End-to-end lifecycle over in-memory storage and mocked services:
//! internalize incoming funds, create and sign an action, broadcast,
//! review to completion, abort, purge.

use chrono::Duration;
use satchel_codec::envelope::{
    ActionOutput, ActionStatus, Counterparty, CreateActionArgs, CreateActionOptions,
    InternalizeActionArgs, InternalizeOutput, InternalizeProtocol, ListActionsArgs,
    ListOutputsArgs, PaymentRemittance,
};
use satchel_crypto::{KeyDeriver, RootKey};
use satchel_primitives::beef::build_atomic_beef;
use satchel_primitives::merkle::{MerklePath, PathLeaf};
use satchel_primitives::transaction::{OutPoint, Transaction, TxInput, TxOutput, Txid};
use satchel_services::mock::MockChainServices;
use satchel_services::Interrupt;
use satchel_storage::methods;
use satchel_storage::StorageProvider;
use satchel_txbuilder::lock_for_counterparty;

fn user_deriver() -> KeyDeriver {
    KeyDeriver::new(RootKey::new([0x42; 32])).unwrap()
}

fn sender_deriver() -> KeyDeriver {
    KeyDeriver::new(RootKey::new([0x11; 32])).unwrap()
}

/// Build an external payment of `satoshis` to the user and
/// internalize it, seeding the wallet with spendable funds.
fn seed_funds(
    provider: &StorageProvider,
    deriver: &KeyDeriver,
    user_id: i64,
    satoshis: u64,
) -> String {
    let sender = sender_deriver();
    let recipient = Counterparty::Other(deriver.identity_public_key().serialize());
    let lock = lock_for_counterparty(&sender, "seed", "0", &recipient).unwrap();

    let tx = Transaction {
        version: 1,
        inputs: vec![TxInput::new(OutPoint::new(Txid::from_raw_tx(b"ext"), 0))],
        outputs: vec![TxOutput::new(satoshis, lock)],
        lock_time: 0,
    };
    let txid = tx.txid().to_string();
    let atomic = build_atomic_beef(&tx.to_bytes(), None);

    let accepted = methods::internalize_action(
        provider,
        deriver,
        user_id,
        &InternalizeActionArgs {
            tx: atomic.to_bytes(),
            outputs: vec![InternalizeOutput {
                output_index: 0,
                protocol: InternalizeProtocol::WalletPayment,
                payment_remittance: Some(PaymentRemittance {
                    derivation_prefix: "seed".into(),
                    derivation_suffix: "0".into(),
                    sender_identity_key: sender.identity_hex(),
                }),
                insertion_remittance: None,
            }],
            description: "incoming payment".into(),
            labels: vec!["seed".into()],
        },
    )
    .unwrap();
    assert!(accepted);
    txid
}

fn payment_args(satoshis: u64) -> CreateActionArgs {
    CreateActionArgs {
        description: "pay a merchant".into(),
        inputs: vec![],
        outputs: vec![ActionOutput {
            locking_script: "76a914000000000000000000000000000000000000000088ac".into(),
            satoshis,
            output_description: "merchant output".into(),
            basket: None,
            custom_instructions: None,
            tags: None,
        }],
        version: None,
        lock_time: None,
        labels: vec!["payment".into()],
        options: None,
    }
}

#[test]
fn first_use_creates_default_basket_and_label() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();

    let baskets = provider.find_output_baskets(user.user_id).unwrap();
    assert_eq!(baskets.len(), 1);
    assert_eq!(baskets[0].name, "default");
    assert_eq!(baskets[0].number_of_desired_utxos, 32);

    let labels = provider.find_tx_labels(user.user_id).unwrap();
    assert_eq!(labels.len(), 1);

    // Second resolution reuses the same user row.
    let again = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    assert_eq!(again.user_id, user.user_id);
    assert_eq!(provider.find_output_baskets(user.user_id).unwrap().len(), 1);
}

#[test]
fn empty_wallet_lists_nothing() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();

    let actions = methods::list_actions(&provider, user.user_id, &ListActionsArgs::default())
        .unwrap();
    assert_eq!(actions.total_actions, 0);
    assert!(actions.actions.is_empty());

    let outputs = methods::list_outputs(
        &provider,
        user.user_id,
        &ListOutputsArgs {
            basket: "default".into(),
            tags: vec![],
            tag_query_mode: None,
            include_locking_scripts: None,
            include_tags: None,
            limit: None,
            offset: None,
        },
    )
    .unwrap();
    assert_eq!(outputs.total_outputs, 0);
}

#[test]
fn internalize_makes_funds_spendable() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();

    seed_funds(&provider, &deriver, user.user_id, 10_000);
    assert_eq!(provider.balance(user.user_id, "default").unwrap(), 10_000);

    let outputs = methods::list_outputs(
        &provider,
        user.user_id,
        &ListOutputsArgs {
            basket: "default".into(),
            tags: vec![],
            tag_query_mode: None,
            include_locking_scripts: Some(true),
            include_tags: None,
            limit: None,
            offset: None,
        },
    )
    .unwrap();
    assert_eq!(outputs.total_outputs, 1);
    assert!(outputs.outputs[0].spendable);
    assert!(outputs.outputs[0].locking_script.is_some());
}

#[test]
fn internalize_rejects_wrong_script() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    let sender = sender_deriver();

    // Lock derived with the wrong suffix: the remittance cannot
    // reproduce it.
    let recipient = Counterparty::Other(deriver.identity_public_key().serialize());
    let lock = lock_for_counterparty(&sender, "seed", "999", &recipient).unwrap();
    let tx = Transaction {
        version: 1,
        inputs: vec![TxInput::new(OutPoint::new(Txid::from_raw_tx(b"ext"), 0))],
        outputs: vec![TxOutput::new(5000, lock)],
        lock_time: 0,
    };
    let atomic = build_atomic_beef(&tx.to_bytes(), None);

    let err = methods::internalize_action(
        &provider,
        &deriver,
        user.user_id,
        &InternalizeActionArgs {
            tx: atomic.to_bytes(),
            outputs: vec![InternalizeOutput {
                output_index: 0,
                protocol: InternalizeProtocol::WalletPayment,
                payment_remittance: Some(PaymentRemittance {
                    derivation_prefix: "seed".into(),
                    derivation_suffix: "0".into(),
                    sender_identity_key: sender.identity_hex(),
                }),
                insertion_remittance: None,
            }],
            description: "bad payment".into(),
            labels: vec![],
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        satchel_storage::StorageError::ScriptMismatch { vout: 0, .. }
    ));

    // Rolled back: no funds, no action.
    assert_eq!(provider.balance(user.user_id, "default").unwrap(), 0);
    let actions = methods::list_actions(&provider, user.user_id, &ListActionsArgs::default())
        .unwrap();
    assert_eq!(actions.total_actions, 0);
}

#[tokio::test]
async fn create_post_review_completes() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let outcome =
        methods::create_action(&provider, &deriver, user.user_id, &payment_args(2000)).unwrap();
    let txid = outcome.result.txid.clone().expect("signed internally");
    assert!(outcome.result.tx.is_some());
    assert!(outcome.result.signable_transaction.is_none());

    // Conservation: inputs = outputs + fee on the final transaction.
    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Signed);
    let tx = Transaction::from_bytes(action.raw_tx.as_ref().unwrap()).unwrap();
    assert_eq!(tx.txid().to_string(), txid);
    let change: u64 = tx.outputs.iter().skip(1).map(|o| o.satoshis).sum();
    assert!(10_000 > 2000 + change);

    // Broadcast through the mock and verify the accept path.
    let mut services = MockChainServices::with_height(850_000);
    let parsed_txid: Txid = txid.parse().unwrap();
    services.add_merkle_path(
        txid.clone(),
        MerklePath::new(
            850_000,
            vec![vec![
                PathLeaf::of_txid(0, parsed_txid),
                PathLeaf::of_duplicate(1),
            ]],
        ),
    );

    let results =
        methods::attempt_to_post_reqs_to_network(&provider, &services, &Interrupt::none())
            .await
            .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].accepted);
    assert_eq!(services.posted().len(), 1);

    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Unproven);

    // Review finds the proof and completes the action.
    let summary = methods::review_status(
        &provider,
        &services,
        &Interrupt::none(),
        &methods::ReviewParams {
            review_after: Duration::zero(),
        },
    )
    .await
    .unwrap();
    assert_eq!(summary.completed, 1);

    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Completed);
    assert!(provider.find_proven_tx(&txid).unwrap().is_some());

    // Change from the payment is spendable again.
    let balance = provider.balance(user.user_id, "default").unwrap();
    assert!(balance > 0 && balance < 8000);
}

#[tokio::test]
async fn rejected_broadcast_fails_action_and_frees_inputs() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let outcome =
        methods::create_action(&provider, &deriver, user.user_id, &payment_args(2000)).unwrap();
    let txid = outcome.result.txid.clone().unwrap();

    let mut services = MockChainServices::default();
    services.reject_txid(txid.clone(), "double spend");

    let results =
        methods::attempt_to_post_reqs_to_network(&provider, &services, &Interrupt::none())
            .await
            .unwrap();
    assert!(!results[0].accepted);

    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Failed);

    // The seeded input is back in the pool.
    assert_eq!(provider.balance(user.user_id, "default").unwrap(), 10_000);
}

#[test]
fn abort_releases_reservation() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    // Force a signable draft so the action stays unsigned.
    let mut args = payment_args(2000);
    args.options = Some(CreateActionOptions {
        sign_and_process: Some(false),
        ..Default::default()
    });
    let outcome = methods::create_action(&provider, &deriver, user.user_id, &args).unwrap();
    assert!(outcome.result.signable_transaction.is_some());

    let aborted = methods::abort_action(&provider, user.user_id, &outcome.reference).unwrap();
    assert!(aborted);

    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Failed);

    // Funds are available again for a full-balance payment.
    let retry = methods::create_action(&provider, &deriver, user.user_id, &payment_args(9000));
    assert!(retry.is_ok());
}

#[test]
fn abort_terminal_action_is_rejected() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let mut args = payment_args(2000);
    args.options = Some(CreateActionOptions {
        sign_and_process: Some(false),
        ..Default::default()
    });
    let outcome = methods::create_action(&provider, &deriver, user.user_id, &args).unwrap();
    methods::abort_action(&provider, user.user_id, &outcome.reference).unwrap();

    let err = methods::abort_action(&provider, user.user_id, &outcome.reference).unwrap_err();
    assert!(matches!(
        err,
        satchel_storage::StorageError::InvalidTransition { .. }
    ));
}

#[test]
fn purge_removes_failed_actions_only_after_cutoff() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let mut args = payment_args(2000);
    args.options = Some(CreateActionOptions {
        sign_and_process: Some(false),
        ..Default::default()
    });
    let outcome = methods::create_action(&provider, &deriver, user.user_id, &args).unwrap();
    methods::abort_action(&provider, user.user_id, &outcome.reference).unwrap();

    // A generous window keeps the fresh failure.
    let kept = methods::purge_data(
        &provider,
        &methods::PurgeParams {
            purge_failed_after: Duration::days(14),
            purge_nosend_after: Duration::days(14),
        },
    )
    .unwrap();
    assert_eq!(kept.actions_purged, 0);

    // A future clock sweeps it away.
    let swept = methods::purge_data_at(
        &provider,
        &methods::PurgeParams {
            purge_failed_after: Duration::days(14),
            purge_nosend_after: Duration::days(14),
        },
        chrono::Utc::now() + Duration::days(30),
    )
    .unwrap();
    assert_eq!(swept.actions_purged, 1);

    assert!(provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .is_none());
}

#[test]
fn reservations_are_exclusive() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let output_id = provider
        .with_tx(|c| {
            Ok(satchel_storage::provider::rows::spendable_pool(c, user.user_id)?[0].output_id)
        })
        .unwrap();

    provider
        .reserve_outputs(user.user_id, &[output_id], "holder-a")
        .unwrap();
    // Re-reserving under the same holder is fine; another holder
    // conflicts.
    provider
        .reserve_outputs(user.user_id, &[output_id], "holder-a")
        .unwrap();
    let err = provider
        .reserve_outputs(user.user_id, &[output_id], "holder-b")
        .unwrap_err();
    assert!(matches!(
        err,
        satchel_storage::StorageError::ReservationConflict { .. }
    ));

    // Release is idempotent and frees the output.
    provider.release_outputs("holder-a").unwrap();
    provider.release_outputs("holder-a").unwrap();
    provider
        .reserve_outputs(user.user_id, &[output_id], "holder-b")
        .unwrap();
}

#[test]
fn sign_action_completes_a_draft() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let mut args = payment_args(2000);
    args.options = Some(CreateActionOptions {
        sign_and_process: Some(false),
        ..Default::default()
    });
    let outcome = methods::create_action(&provider, &deriver, user.user_id, &args).unwrap();
    let signable = outcome.result.signable_transaction.unwrap();
    assert_eq!(signable.reference, outcome.reference);

    // All inputs are wallet-owned, so no external spends are needed.
    let processed = methods::sign_action(
        &provider,
        &deriver,
        user.user_id,
        &satchel_codec::envelope::SignActionArgs {
            spends: Default::default(),
            reference: outcome.reference.clone(),
        },
    )
    .unwrap();

    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Signed);
    assert_eq!(action.txid.as_deref(), Some(processed.txid.as_str()));

    // The draft's transaction bytes hash to the recorded txid.
    let tx = Transaction::from_bytes(action.raw_tx.as_ref().unwrap()).unwrap();
    assert_eq!(tx.txid().to_string(), processed.txid);
}

#[test]
fn no_send_action_is_terminal_and_returns_change() {
    let provider = StorageProvider::open_in_memory().unwrap();
    let deriver = user_deriver();
    let user = provider
        .find_or_create_user(&deriver.identity_hex())
        .unwrap();
    seed_funds(&provider, &deriver, user.user_id, 10_000);

    let mut args = payment_args(2000);
    args.options = Some(CreateActionOptions {
        no_send: Some(true),
        ..Default::default()
    });
    let outcome = methods::create_action(&provider, &deriver, user.user_id, &args).unwrap();

    let action = provider
        .find_action_by_reference(user.user_id, &outcome.reference)
        .unwrap()
        .unwrap();
    assert_eq!(action.status, ActionStatus::Nosend);
    assert!(outcome.result.no_send_change.is_some());

    // Nothing was queued for broadcast.
    let processed = outcome.processed.unwrap();
    assert!(!processed.wants_immediate_post);
}
