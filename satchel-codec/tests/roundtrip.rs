use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use satchel_codec::envelope::*;
use satchel_codec::{from_bytes, to_bytes};

fn arb_counterparty() -> impl Strategy<Value = Counterparty> {
    prop_oneof![
        Just(Counterparty::Myself),
        Just(Counterparty::Anyone),
        any::<[u8; 33]>().prop_map(Counterparty::Other),
    ]
}

fn arb_context() -> impl Strategy<Value = KeyContext> {
    (
        prop_oneof![
            Just(SecurityLevel::Silent),
            Just(SecurityLevel::App),
            Just(SecurityLevel::Counterparty),
        ],
        "[a-z ]{1,24}",
        "[a-z0-9-]{1,16}",
        arb_counterparty(),
    )
        .prop_map(|(level, name, key_id, counterparty)| KeyContext {
            protocol_id: ProtocolId::new(level, name),
            key_id,
            counterparty,
        })
}

proptest! {
    #[test]
    fn encrypt_args_round_trip(
        plaintext in vec(any::<u8>(), 0..512),
        context in arb_context(),
    ) {
        let args = EncryptArgs { plaintext, context };
        prop_assert_eq!(from_bytes::<EncryptArgs>(&to_bytes(&args)).unwrap(), args);
    }

    #[test]
    fn create_action_args_round_trip(
        description in "[ -~]{1,64}",
        satoshis in 1u64..21_000_000_000u64,
        script in vec(any::<u8>(), 1..80),
        basket in option::of("[a-z]{1,12}"),
        labels in vec("[a-z]{1,10}", 0..4),
        no_send in option::of(any::<bool>()),
    ) {
        let args = CreateActionArgs {
            description,
            inputs: vec![],
            outputs: vec![ActionOutput {
                locking_script: hex::encode(script),
                satoshis,
                output_description: "out".into(),
                basket,
                custom_instructions: None,
                tags: None,
            }],
            version: Some(1),
            lock_time: None,
            labels,
            options: no_send.map(|no_send| CreateActionOptions {
                no_send: Some(no_send),
                ..Default::default()
            }),
        };
        prop_assert_eq!(from_bytes::<CreateActionArgs>(&to_bytes(&args)).unwrap(), args);
    }

    #[test]
    fn list_results_round_trip(
        total in any::<u32>(),
        satoshis in any::<i64>(),
        outgoing in any::<bool>(),
    ) {
        let result = ListActionsResult {
            total_actions: total,
            actions: vec![ActionEntry {
                txid: Some("aa".repeat(32)),
                satoshis,
                status: ActionStatus::Completed,
                is_outgoing: outgoing,
                description: "d".into(),
                version: 1,
                lock_time: 0,
                labels: None,
            }],
        };
        prop_assert_eq!(
            from_bytes::<ListActionsResult>(&to_bytes(&result)).unwrap(),
            result
        );
    }

    #[test]
    fn truncated_input_never_panics(
        plaintext in vec(any::<u8>(), 0..64),
        context in arb_context(),
        cut in 0usize..32,
    ) {
        let args = EncryptArgs { plaintext, context };
        let bytes = to_bytes(&args);
        let cut = cut.min(bytes.len());
        // Any prefix must decode cleanly or fail with a codec error.
        let _ = from_bytes::<EncryptArgs>(&bytes[..bytes.len() - cut]);
    }
}

#[test]
fn internalize_args_round_trip() {
    let args = InternalizeActionArgs {
        tx: vec![0xBE, 0xEF],
        outputs: vec![InternalizeOutput {
            output_index: 0,
            protocol: InternalizeProtocol::WalletPayment,
            payment_remittance: Some(PaymentRemittance {
                derivation_prefix: "prefix".into(),
                derivation_suffix: "suffix".into(),
                sender_identity_key: "02".repeat(33),
            }),
            insertion_remittance: None,
        }],
        description: "incoming payment".into(),
        labels: vec!["payment".into()],
    };
    assert_eq!(
        from_bytes::<InternalizeActionArgs>(&to_bytes(&args)).unwrap(),
        args
    );
}
