//! Demonstration surface for the satchel wallet: encrypt/decrypt, a
//! seeded balance, and action listings against an in-memory wallet
//! with mocked chain services. Not part of the wallet core.

use satchel::prelude::*;
use satchel::services::mock::MockChainServices;
use satchel::storage::methods;
use std::sync::Arc;

const KEY_ID: &str = "key-id";
const PROTOCOL_ID: &str = "encryption";
const PLAINTEXT: &str = "Hello, world!";

fn step(who: &str, what: &str) {
    println!("== {who}: {what}");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    step("Alice", "creating wallet");
    let alice = Wallet::new(
        Chain::Test,
        RootKey::new([0x42; 32]),
        StorageProvider::open_in_memory()?,
        Arc::new(MockChainServices::with_height(850_000)),
    )?;
    println!("identity key: {}", alice.identity_key());

    step("Alice", "encrypting");
    let context = KeyContext {
        protocol_id: ProtocolId::new(SecurityLevel::Silent, PROTOCOL_ID),
        key_id: KEY_ID.into(),
        counterparty: Counterparty::Myself,
    };
    let encrypted = alice
        .encrypt(EncryptArgs {
            plaintext: PLAINTEXT.as_bytes().to_vec(),
            context: context.clone(),
        })
        .await?;
    println!("ciphertext: {}", hex::encode(&encrypted.ciphertext));

    step("Alice", "decrypting");
    let decrypted = alice
        .decrypt(DecryptArgs {
            ciphertext: encrypted.ciphertext,
            context,
        })
        .await?;
    println!("plaintext: {}", String::from_utf8_lossy(&decrypted.plaintext));

    step("Alice", "getting balance");
    println!("balance: {} satoshis", alice.balance()?);

    step("Alice", "listing actions");
    let actions = alice.list_actions(ListActionsArgs::default()).await?;
    println!("total actions: {}", actions.total_actions);
    for action in &actions.actions {
        println!(
            "  {} [{}] {} sats: {}",
            action.txid.as_deref().unwrap_or("-"),
            action.status.as_str(),
            action.satoshis,
            action.description
        );
    }

    step("Alice", "listing failed actions");
    let failed = alice
        .list_actions(ListActionsArgs {
            include_labels: Some(true),
            ..Default::default()
        })
        .await?
        .actions
        .into_iter()
        .filter(|a| a.status == ActionStatus::Failed)
        .count();
    println!("failed actions: {failed}");

    step("Alice", "current height");
    println!("height: {}", alice.get_height().await?.height);

    // Exercised so the demo shows a purge knob being wired explicitly.
    let purged = alice.purge_data(&methods::PurgeParams {
        purge_failed_after: chrono_days(14),
        purge_nosend_after: chrono_days(14),
    })?;
    println!("purged {} stale actions", purged.actions_purged);

    Ok(())
}

fn chrono_days(days: i64) -> satchel::storage::chrono::Duration {
    satchel::storage::chrono::Duration::days(days)
}
