//! Production [`ChainServices`] implementation over HTTP.
//!
//! Three collaborators with narrow contracts: ARC accepts BEEF
//! submissions, the block-headers service answers tip height, merkle
//! paths and root confirmation, and a transaction API answers raw-tx,
//! script and status lookups.

use crate::config::{Chain, ServiceConfig};
use crate::retry::with_retry;
use crate::types::*;
use crate::{ChainServices, ServiceError};
use async_trait::async_trait;
use satchel_primitives::{AtomicBeef, MerklePath};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Services {
    config: ServiceConfig,
    client: reqwest::Client,
}

impl Services {
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// Services against the public default endpoints for `chain`.
    pub fn default_for(chain: Chain) -> Result<Self, ServiceError> {
        Self::new(ServiceConfig::default_for(chain))
    }

    /// Services configured from `WALLET_*` environment variables.
    pub fn from_env() -> Result<Self, ServiceError> {
        Self::new(ServiceConfig::from_env()?)
    }

    pub fn chain(&self) -> Chain {
        self.config.chain
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn classify(status: reqwest::StatusCode, body: String) -> ServiceError {
        if status.as_u16() == 429 || status.is_server_error() {
            ServiceError::Unavailable(format!("status {status}"))
        } else {
            ServiceError::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, ServiceError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::classify(status, body));
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ServiceError> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }
}

/// Subject txid of a BEEF payload, for result rows when the
/// broadcaster never echoes one back.
fn beef_txid(beef: &[u8]) -> String {
    AtomicBeef::from_bytes(beef)
        .map(|atomic| atomic.subject.to_string())
        .unwrap_or_default()
}

#[derive(Deserialize)]
struct TipResponse {
    height: u32,
}

#[derive(Deserialize)]
struct ArcResponse {
    txid: Option<String>,
    #[serde(rename = "txStatus")]
    tx_status: Option<String>,
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Deserialize)]
struct WocUnspent {
    tx_hash: String,
    tx_pos: u32,
}

#[derive(Deserialize)]
struct WocHistory {
    tx_hash: String,
    height: Option<i64>,
}

#[derive(Deserialize)]
struct WocTx {
    confirmations: Option<u32>,
}

#[derive(Deserialize)]
struct RootVerify {
    #[serde(rename = "confirmationState")]
    confirmation_state: String,
}

/// ARC states that mean the transaction will never be accepted.
const ARC_TERMINAL_STATES: &[&str] = &["REJECTED", "DOUBLE_SPEND_ATTEMPTED"];

#[async_trait]
impl ChainServices for Services {
    async fn get_height(&self) -> Result<u32, ServiceError> {
        let url = format!("{}/api/v1/chain/tip/longest", self.config.bhs_url);
        let tip: TipResponse =
            with_retry(&self.config.retry, "get_height", || self.get_json(&url)).await?;
        Ok(tip.height)
    }

    async fn get_raw_tx(&self, txid: &str) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}/tx/{}/hex", self.config.tx_api_url, txid);
        let body = with_retry(&self.config.retry, "get_raw_tx", || self.get_text(&url)).await?;
        hex::decode(body.trim()).map_err(|e| ServiceError::InvalidResponse(e.to_string()))
    }

    async fn get_merkle_path(&self, txid: &str) -> Result<Option<MerklePath>, ServiceError> {
        let url = format!("{}/api/v1/chain/merklepath/{}", self.config.bhs_url, txid);
        let result = with_retry(&self.config.retry, "get_merkle_path", || {
            self.get_json::<MerklePath>(&url)
        })
        .await;
        match result {
            Ok(path) => Ok(Some(path)),
            // Not found simply means unmined.
            Err(ServiceError::Rejected { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_utxo_status(&self, script_hash: &str) -> Result<UtxoStatus, ServiceError> {
        let url = format!("{}/script/{}/unspent", self.config.tx_api_url, script_hash);
        let unspent: Vec<WocUnspent> =
            with_retry(&self.config.retry, "get_utxo_status", || self.get_json(&url)).await?;
        Ok(UtxoStatus {
            details: unspent
                .into_iter()
                .map(|u| UtxoStatusDetail {
                    outpoint: format!("{}.{}", u.tx_hash, u.tx_pos),
                    spent: false,
                })
                .collect(),
        })
    }

    async fn get_script_history(&self, script_hash: &str) -> Result<ScriptHistory, ServiceError> {
        let url = format!("{}/script/{}/history", self.config.tx_api_url, script_hash);
        let entries: Vec<WocHistory> = with_retry(&self.config.retry, "get_script_history", || {
            self.get_json(&url)
        })
        .await?;
        let mut history = ScriptHistory::default();
        for entry in entries {
            match entry.height {
                Some(h) if h > 0 => history.confirmed.push(HistoryEntry {
                    txid: entry.tx_hash,
                    height: Some(h as u32),
                }),
                _ => history.unconfirmed.push(HistoryEntry {
                    txid: entry.tx_hash,
                    height: None,
                }),
            }
        }
        Ok(history)
    }

    async fn get_transaction_status(
        &self,
        txid: &str,
    ) -> Result<TransactionStatus, ServiceError> {
        let url = format!("{}/tx/{}", self.config.tx_api_url, txid);
        let result = with_retry(&self.config.retry, "get_transaction_status", || {
            self.get_json::<WocTx>(&url)
        })
        .await;
        match result {
            Ok(tx) => Ok(match tx.confirmations {
                Some(n) if n > 0 => TransactionStatus {
                    status: TxStatusKind::Mined,
                    confirmations: Some(n),
                },
                _ => TransactionStatus {
                    status: TxStatusKind::Mempool,
                    confirmations: None,
                },
            }),
            Err(ServiceError::Rejected { status: 404, .. }) => Ok(TransactionStatus {
                status: TxStatusKind::Unknown,
                confirmations: None,
            }),
            Err(err) => Err(err),
        }
    }

    async fn post_beef(&self, beef: &[u8]) -> Result<PostBeefResult, ServiceError> {
        let url = format!("{}/v1/tx", self.config.arc_url);
        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "rawTx": hex::encode(beef) }));
        if let Some(key) = &self.config.arc_api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;

        if status.as_u16() == 429 || status.is_server_error() {
            return Err(ServiceError::Unavailable(format!("arc status {status}")));
        }

        let parsed: ArcResponse = serde_json::from_str(&body).unwrap_or(ArcResponse {
            txid: None,
            tx_status: None,
            title: None,
            detail: None,
        });
        let txid = parsed.txid.unwrap_or_else(|| beef_txid(beef));
        let message = parsed.detail.or(parsed.title).or(parsed.tx_status.clone());

        if !status.is_success() {
            // A definite no from the broadcaster is a result, not an
            // error; the pipeline maps it to a failed action.
            debug!(%status, txid, "arc rejected submission");
            return Ok(PostBeefResult {
                accepted: false,
                txid,
                message,
            });
        }
        let accepted = parsed
            .tx_status
            .as_deref()
            .map(|s| !ARC_TERMINAL_STATES.contains(&s))
            .unwrap_or(true);
        Ok(PostBeefResult {
            accepted,
            txid,
            message,
        })
    }

    async fn post_beef_array(
        &self,
        beefs: &[Vec<u8>],
    ) -> Result<Vec<PostBeefResult>, ServiceError> {
        let mut results = Vec::with_capacity(beefs.len());
        for beef in beefs {
            match self.post_beef(beef).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    warn!(%err, "batch element failed to submit");
                    results.push(PostBeefResult {
                        accepted: false,
                        txid: beef_txid(beef),
                        message: Some(err.to_string()),
                    });
                }
            }
        }
        Ok(results)
    }

    async fn is_valid_root_for_height(
        &self,
        root: &str,
        height: u32,
    ) -> Result<bool, ServiceError> {
        let url = format!("{}/api/v1/chain/merkleroot/verify", self.config.bhs_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!([{ "merkleRoot": root, "blockHeight": height }]))
            .send()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::classify(status, body));
        }
        let verdict: RootVerify = serde_json::from_str(&body)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        Ok(verdict.confirmation_state == "CONFIRMED")
    }
}

/// Opaque handle BEEF verification uses to confirm merkle roots.
#[derive(Clone)]
pub struct ChainTracker {
    services: Arc<dyn ChainServices>,
}

impl ChainTracker {
    pub fn new(services: Arc<dyn ChainServices>) -> Self {
        Self { services }
    }

    pub async fn is_valid_root_for_height(
        &self,
        root: &str,
        height: u32,
    ) -> Result<bool, ServiceError> {
        self.services.is_valid_root_for_height(root, height).await
    }
}
