use satchel_services::{Chain, ChainServices, RetryPolicy, ServiceConfig, ServiceError, Services};
use std::time::Duration;

fn config_for(server: &mockito::ServerGuard) -> ServiceConfig {
    ServiceConfig {
        chain: Chain::Test,
        arc_url: server.url(),
        arc_api_key: Some("test".into()),
        bhs_url: server.url(),
        tx_api_url: server.url(),
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        },
    }
}

#[tokio::test]
async fn get_height_reads_the_tip() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/api/v1/chain/tip/longest")
        .with_status(200)
        .with_body(r#"{"height":850000,"hash":"00"}"#)
        .create_async()
        .await;

    let services = Services::new(config_for(&server)).unwrap();
    assert_eq!(services.get_height().await.unwrap(), 850_000);
}

#[tokio::test]
async fn get_raw_tx_retries_transient_errors() {
    let mut server = mockito::Server::new_async().await;
    let _flaky = server
        .mock("GET", "/tx/abcd/hex")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let _ok = server
        .mock("GET", "/tx/abcd/hex")
        .with_status(200)
        .with_body("beefcafe")
        .create_async()
        .await;

    let services = Services::new(config_for(&server)).unwrap();
    let raw = services.get_raw_tx("abcd").await.unwrap();
    assert_eq!(raw, vec![0xBE, 0xEF, 0xCA, 0xFE]);
}

#[tokio::test]
async fn missing_merkle_path_is_none() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", mockito::Matcher::Regex("/api/v1/chain/merklepath/.*".into()))
        .with_status(404)
        .create_async()
        .await;

    let services = Services::new(config_for(&server)).unwrap();
    assert_eq!(services.get_merkle_path("ab").await.unwrap(), None);
}

#[tokio::test]
async fn not_found_raw_tx_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/tx/dead/hex")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let services = Services::new(config_for(&server)).unwrap();
    assert!(matches!(
        services.get_raw_tx("dead").await,
        Err(ServiceError::Rejected { status: 404, .. })
    ));
}

#[tokio::test]
async fn arc_rejection_is_a_result_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/v1/tx")
        .with_status(409)
        .with_body(r#"{"txid":"ab","detail":"double spend"}"#)
        .create_async()
        .await;

    let services = Services::new(config_for(&server)).unwrap();
    let result = services.post_beef(&[0u8; 8]).await.unwrap();
    assert!(!result.accepted);
    assert_eq!(result.message.as_deref(), Some("double spend"));
}

#[tokio::test]
async fn utxo_status_shape() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", mockito::Matcher::Regex("/script/.*/unspent".into()))
        .with_status(200)
        .with_body(r#"[{"tx_hash":"aa","tx_pos":1,"value":1000}]"#)
        .create_async()
        .await;

    let services = Services::new(config_for(&server)).unwrap();
    let status = services.get_utxo_status(&"cd".repeat(32)).await.unwrap();
    assert_eq!(status.details.len(), 1);
    assert_eq!(status.details[0].outpoint, "aa.1");
    assert!(!status.details[0].spent);
}
