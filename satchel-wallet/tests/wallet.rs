//! Method-surface tests against an in-memory wallet with mocked
//! chain services.

use satchel_codec::envelope::*;
use satchel_codec::{MethodId, RequestFrame};
use satchel_crypto::{KeyDeriver, RootKey};
use satchel_services::mock::MockChainServices;
use satchel_services::{Chain, Interrupt};
use satchel_storage::{CertificateRecord, StorageProvider};
use satchel_wallet::Wallet;
use std::collections::BTreeMap;
use std::sync::Arc;

fn wallet() -> Wallet {
    wallet_with_services(MockChainServices::default())
}

fn wallet_with_services(services: MockChainServices) -> Wallet {
    Wallet::new(
        Chain::Main,
        RootKey::new([0x42; 32]),
        StorageProvider::open_in_memory().unwrap(),
        Arc::new(services),
    )
    .unwrap()
}

fn context(counterparty: Counterparty) -> KeyContext {
    KeyContext {
        protocol_id: ProtocolId::new(SecurityLevel::Counterparty, "ctx"),
        key_id: "default".into(),
        counterparty,
    }
}

#[tokio::test]
async fn encrypt_decrypt_round_trip_self() {
    let wallet = wallet();
    let plaintext = b"secret message".to_vec();

    let encrypted = wallet
        .encrypt(EncryptArgs {
            plaintext: plaintext.clone(),
            context: context(Counterparty::Myself),
        })
        .await
        .unwrap();
    assert_ne!(encrypted.ciphertext, plaintext);
    assert_eq!(
        &encrypted.ciphertext[..5],
        &[0x42, 0x49, 0x45, 0x31, 0x02]
    );

    let decrypted = wallet
        .decrypt(DecryptArgs {
            ciphertext: encrypted.ciphertext,
            context: context(Counterparty::Myself),
        })
        .await
        .unwrap();
    assert_eq!(decrypted.plaintext, plaintext);
}

#[tokio::test]
async fn get_network_json_and_wire() {
    let wallet = wallet();
    let result = wallet.get_network().await.unwrap();
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"network":"mainnet"}"#
    );

    // Wire vector: request 0x1b 0x00-length payload, response 0x00 0x00.
    let frame = RequestFrame::new(MethodId::GetNetwork, vec![]).encode();
    assert_eq!(frame, vec![0x1B]);
    let response = wallet.handle_wire(&frame, &Interrupt::none()).await;
    assert_eq!(response, vec![0x00, 0x00]);
}

#[tokio::test]
async fn get_height_uses_services() {
    let wallet = wallet_with_services(MockChainServices::with_height(850_000));
    let result = wallet.get_height().await.unwrap();
    assert_eq!(result.height, 850_000);
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"height":850000}"#
    );
}

#[tokio::test]
async fn hmac_round_trip_and_tamper_detection() {
    let wallet = wallet();
    let data = b"auth data".to_vec();

    let created = wallet
        .create_hmac(CreateHmacArgs {
            data: data.clone(),
            context: context(Counterparty::Myself),
        })
        .await
        .unwrap();
    assert_eq!(created.hmac.len(), 32);

    let valid = wallet
        .verify_hmac(VerifyHmacArgs {
            data: data.clone(),
            hmac: created.hmac.clone(),
            context: context(Counterparty::Myself),
        })
        .await
        .unwrap();
    assert!(valid.valid);

    let mut tampered = created.hmac;
    tampered[0] ^= 1;
    let invalid = wallet
        .verify_hmac(VerifyHmacArgs {
            data,
            hmac: tampered,
            context: context(Counterparty::Myself),
        })
        .await
        .unwrap();
    assert!(!invalid.valid);
}

#[tokio::test]
async fn signature_round_trip() {
    let wallet = wallet();
    let data = b"signed payload".to_vec();

    let created = wallet
        .create_signature(CreateSignatureArgs {
            data: Some(data.clone()),
            hash_to_directly_sign: None,
            context: context(Counterparty::Anyone),
        })
        .await
        .unwrap();

    let valid = wallet
        .verify_signature(VerifySignatureArgs {
            data: Some(data.clone()),
            hash_to_directly_verify: None,
            signature: created.signature.clone(),
            for_self: Some(true),
            context: context(Counterparty::Anyone),
        })
        .await
        .unwrap();
    assert!(valid.valid);

    let mut flipped = data;
    flipped[0] ^= 1;
    let invalid = wallet
        .verify_signature(VerifySignatureArgs {
            data: Some(flipped),
            hash_to_directly_verify: None,
            signature: created.signature,
            for_self: Some(true),
            context: context(Counterparty::Anyone),
        })
        .await
        .unwrap();
    assert!(!invalid.valid);
}

#[tokio::test]
async fn public_key_matches_private_derivation() {
    let wallet = wallet();
    let result = wallet
        .get_public_key(GetPublicKeyArgs {
            identity_key: None,
            protocol_id: Some(ProtocolId::new(SecurityLevel::Counterparty, "ctx")),
            key_id: Some("default".into()),
            counterparty: Some(Counterparty::Myself),
            for_self: Some(true),
        })
        .await
        .unwrap();

    // Independent derivation from the same root.
    let deriver = KeyDeriver::new(RootKey::new([0x42; 32])).unwrap();
    let child = deriver
        .derive_private(
            &ProtocolId::new(SecurityLevel::Counterparty, "ctx"),
            "default",
            &Counterparty::Myself,
        )
        .unwrap();
    let expected = hex::encode(deriver.public_key_of(&child).serialize());
    assert_eq!(result.public_key, expected);
}

#[tokio::test]
async fn identity_key_query() {
    let wallet = wallet();
    let result = wallet
        .get_public_key(GetPublicKeyArgs {
            identity_key: Some(true),
            protocol_id: None,
            key_id: None,
            counterparty: None,
            for_self: None,
        })
        .await
        .unwrap();
    assert_eq!(result.public_key, wallet.identity_key());
    assert_eq!(result.public_key.len(), 66);
}

#[tokio::test]
async fn empty_wallet_list_actions_shape() {
    let wallet = wallet();
    let result = wallet
        .list_actions(ListActionsArgs::default())
        .await
        .unwrap();
    assert_eq!(
        serde_json::to_string(&result).unwrap(),
        r#"{"totalActions":0,"actions":[]}"#
    );
}

#[tokio::test]
async fn list_actions_offset_past_end_keeps_total() {
    let wallet = wallet();
    let result = wallet
        .list_actions(ListActionsArgs {
            offset: Some(100),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(result.total_actions, 0);
    assert!(result.actions.is_empty());
}

#[tokio::test]
async fn wait_for_authentication_is_immediate() {
    let wallet = wallet();
    let result = wallet.wait_for_authentication().await.unwrap();
    assert!(result.authenticated);
}

#[tokio::test]
async fn unknown_wire_method_yields_error_frame() {
    let wallet = wallet();
    let response = wallet.handle_wire(&[0xEE], &Interrupt::none()).await;
    assert_ne!(response[0], 0);
}

#[tokio::test]
async fn wire_encrypt_round_trip() {
    let wallet = wallet();
    let args = EncryptArgs {
        plaintext: b"over the wire".to_vec(),
        context: context(Counterparty::Myself),
    };
    let frame = RequestFrame::new(MethodId::Encrypt, satchel_codec::to_bytes(&args)).encode();
    let response = wallet.handle_wire(&frame, &Interrupt::none()).await;
    assert_eq!(response[0], 0);

    let encrypted: EncryptResult = satchel_codec::from_bytes(&response[1..]).unwrap();
    let decrypted = wallet
        .decrypt(DecryptArgs {
            ciphertext: encrypted.ciphertext,
            context: context(Counterparty::Myself),
        })
        .await
        .unwrap();
    assert_eq!(decrypted.plaintext, b"over the wire");
}

#[tokio::test]
async fn canceled_call_surfaces_as_canceled() {
    let wallet = wallet();
    let (handle, interrupt) = Interrupt::channel();
    handle.trigger();
    let err = wallet
        .create_action(
            CreateActionArgs {
                description: "canceled".into(),
                inputs: vec![],
                outputs: vec![],
                version: None,
                lock_time: None,
                labels: vec![],
                options: None,
            },
            &interrupt,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, satchel_wallet::ErrorCode::Canceled);
}

#[tokio::test]
async fn certificate_custody_flow() {
    let wallet = wallet();
    let verifier = KeyDeriver::new(RootKey::new([0x77; 32])).unwrap();

    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), "Alice".to_string());
    fields.insert("email".to_string(), "alice@example.com".to_string());
    wallet
        .hold_certificate(CertificateRecord {
            certificate_id: 0,
            user_id: 0,
            certificate_type: "identity".into(),
            serial_number: "serial-1".into(),
            subject: wallet.identity_key(),
            certifier: "02".repeat(33),
            revocation_outpoint: None,
            signature: None,
            fields,
        })
        .unwrap();

    let discovered = wallet
        .discover_by_identity_key(DiscoverByIdentityKeyArgs {
            identity_key: wallet.identity_key(),
            limit: None,
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(discovered.total_certificates, 1);

    let proof = wallet
        .prove_certificate(ProveCertificateArgs {
            certificate_type: "identity".into(),
            serial_number: "serial-1".into(),
            certifier: "02".repeat(33),
            fields_to_reveal: vec!["name".into()],
            verifier: verifier.identity_hex(),
        })
        .await
        .unwrap();
    assert!(proof.keyring_for_verifier.contains_key("name"));
    assert!(!proof.keyring_for_verifier.contains_key("email"));

    let relinquished = wallet
        .relinquish_certificate(RelinquishCertificateArgs {
            certificate_type: "identity".into(),
            serial_number: "serial-1".into(),
            certifier: "02".repeat(33),
        })
        .await
        .unwrap();
    assert!(relinquished.relinquished);

    let after = wallet
        .discover_by_identity_key(DiscoverByIdentityKeyArgs {
            identity_key: wallet.identity_key(),
            limit: None,
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(after.total_certificates, 0);
}

#[tokio::test]
async fn reveal_counterparty_linkage_is_encrypted() {
    let wallet = wallet();
    let counterparty = KeyDeriver::new(RootKey::new([0x33; 32])).unwrap();
    let verifier = KeyDeriver::new(RootKey::new([0x55; 32])).unwrap();

    let revelation = wallet
        .reveal_counterparty_key_linkage(RevealCounterpartyKeyLinkageArgs {
            counterparty: counterparty.identity_hex(),
            verifier: verifier.identity_hex(),
        })
        .await
        .unwrap();
    assert_eq!(revelation.prover, wallet.identity_key());
    // BIE1 envelope, not the raw 33-byte linkage.
    assert_eq!(&revelation.encrypted_linkage[..4], b"BIE1");
    assert!(revelation.encrypted_linkage.len() > 33);
}
