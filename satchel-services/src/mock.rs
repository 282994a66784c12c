//! In-memory [`ChainServices`] for tests and the demo harness.

use crate::types::*;
use crate::{ChainServices, ServiceError};
use async_trait::async_trait;
use satchel_primitives::MerklePath;
use std::collections::HashMap;
use std::sync::Mutex;

/// Canned chain state. Every submitted BEEF is recorded so tests can
/// assert on what reached the broadcaster.
pub struct MockChainServices {
    pub height: u32,
    raw_txs: HashMap<String, Vec<u8>>,
    merkle_paths: HashMap<String, MerklePath>,
    /// txids the broadcaster should reject, with the message.
    rejects: HashMap<String, String>,
    accept_all: bool,
    posted: Mutex<Vec<Vec<u8>>>,
}

impl Default for MockChainServices {
    fn default() -> Self {
        Self::with_height(850_000)
    }
}

impl MockChainServices {
    pub fn with_height(height: u32) -> Self {
        Self {
            height,
            raw_txs: HashMap::new(),
            merkle_paths: HashMap::new(),
            rejects: HashMap::new(),
            accept_all: true,
            posted: Mutex::new(Vec::new()),
        }
    }

    pub fn add_raw_tx(&mut self, txid: impl Into<String>, raw: Vec<u8>) -> &mut Self {
        self.raw_txs.insert(txid.into(), raw);
        self
    }

    pub fn add_merkle_path(&mut self, txid: impl Into<String>, path: MerklePath) -> &mut Self {
        self.merkle_paths.insert(txid.into(), path);
        self
    }

    pub fn reject_txid(&mut self, txid: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.rejects.insert(txid.into(), message.into());
        self
    }

    /// BEEF payloads submitted so far, in order.
    pub fn posted(&self) -> Vec<Vec<u8>> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainServices for MockChainServices {
    async fn get_height(&self) -> Result<u32, ServiceError> {
        Ok(self.height)
    }

    async fn get_raw_tx(&self, txid: &str) -> Result<Vec<u8>, ServiceError> {
        self.raw_txs
            .get(txid)
            .cloned()
            .ok_or_else(|| ServiceError::Rejected {
                status: 404,
                body: format!("unknown txid {txid}"),
            })
    }

    async fn get_merkle_path(&self, txid: &str) -> Result<Option<MerklePath>, ServiceError> {
        Ok(self.merkle_paths.get(txid).cloned())
    }

    async fn get_utxo_status(&self, _script_hash: &str) -> Result<UtxoStatus, ServiceError> {
        Ok(UtxoStatus::default())
    }

    async fn get_script_history(&self, _script_hash: &str) -> Result<ScriptHistory, ServiceError> {
        Ok(ScriptHistory::default())
    }

    async fn get_transaction_status(
        &self,
        txid: &str,
    ) -> Result<TransactionStatus, ServiceError> {
        if self.merkle_paths.contains_key(txid) {
            Ok(TransactionStatus {
                status: TxStatusKind::Mined,
                confirmations: Some(6),
            })
        } else if self.raw_txs.contains_key(txid) {
            Ok(TransactionStatus {
                status: TxStatusKind::Mempool,
                confirmations: None,
            })
        } else {
            Ok(TransactionStatus {
                status: TxStatusKind::Unknown,
                confirmations: None,
            })
        }
    }

    async fn post_beef(&self, beef: &[u8]) -> Result<PostBeefResult, ServiceError> {
        self.posted.lock().unwrap().push(beef.to_vec());
        let txid = satchel_primitives::AtomicBeef::from_bytes(beef)
            .map(|atomic| atomic.subject.to_string())
            .unwrap_or_default();
        if let Some(message) = self.rejects.get(&txid) {
            return Ok(PostBeefResult {
                accepted: false,
                txid,
                message: Some(message.clone()),
            });
        }
        if !self.accept_all {
            return Err(ServiceError::Unavailable("mock broadcaster down".into()));
        }
        Ok(PostBeefResult {
            accepted: true,
            txid,
            message: None,
        })
    }

    async fn post_beef_array(
        &self,
        beefs: &[Vec<u8>],
    ) -> Result<Vec<PostBeefResult>, ServiceError> {
        let mut results = Vec::with_capacity(beefs.len());
        for beef in beefs {
            results.push(self.post_beef(beef).await?);
        }
        Ok(results)
    }

    async fn is_valid_root_for_height(
        &self,
        _root: &str,
        _height: u32,
    ) -> Result<bool, ServiceError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mocked_height_round_trip() {
        let services = MockChainServices::with_height(850_000);
        assert_eq!(services.get_height().await.unwrap(), 850_000);
    }

    #[tokio::test]
    async fn unknown_raw_tx_is_not_found() {
        let services = MockChainServices::default();
        assert!(matches!(
            services.get_raw_tx("00".repeat(32).as_str()).await,
            Err(ServiceError::Rejected { status: 404, .. })
        ));
    }
}
