//! Facade over the external chain collaborators: the ARC broadcaster,
//! the block-headers service, and a transaction/script lookup API.
//! The wallet reaches the network only through the [`ChainServices`]
//! trait, so tests substitute [`mock::MockChainServices`] without
//! touching the rest of the stack.

pub mod assemble;
pub mod config;
pub mod interrupt;
pub mod mock;
pub mod retry;
pub mod services;
pub mod types;

pub use assemble::build_atomic_beef_for_txid;
pub use config::{Chain, ServiceConfig};
pub use interrupt::{Interrupt, InterruptHandle};
pub use retry::RetryPolicy;
pub use services::{ChainTracker, Services};
pub use types::*;

use async_trait::async_trait;
use satchel_primitives::MerklePath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Upstream 5xx or network failure, surfaced after the retry
    /// budget is spent. Retriable by the caller's next tick.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Upstream 4xx other than 429. Not retriable.
    #[error("request rejected: status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Terminal broadcaster rejection of a transaction.
    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    /// Upstream answered but the payload was not understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Cancellation observed at a suspension point.
    #[error("canceled")]
    Canceled,
}

impl ServiceError {
    /// Whether a retry may succeed without operator intervention.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

/// Chain-facing operations the wallet core consumes.
#[async_trait]
pub trait ChainServices: Send + Sync {
    /// Current chain tip height.
    async fn get_height(&self) -> Result<u32, ServiceError>;

    /// Raw transaction bytes by id.
    async fn get_raw_tx(&self, txid: &str) -> Result<Vec<u8>, ServiceError>;

    /// Best-effort merkle path; `None` while unmined.
    async fn get_merkle_path(&self, txid: &str) -> Result<Option<MerklePath>, ServiceError>;

    /// Spend state of every known outpoint paying `script_hash`.
    async fn get_utxo_status(&self, script_hash: &str) -> Result<UtxoStatus, ServiceError>;

    /// Confirmed and unconfirmed history of a script hash.
    async fn get_script_history(&self, script_hash: &str) -> Result<ScriptHistory, ServiceError>;

    async fn get_transaction_status(&self, txid: &str)
        -> Result<TransactionStatus, ServiceError>;

    /// Submit one BEEF. Terminal rejections come back as
    /// `accepted: false`, not as an error.
    async fn post_beef(&self, beef: &[u8]) -> Result<PostBeefResult, ServiceError>;

    /// Submit a batch, preserving order; each element carries its own
    /// outcome.
    async fn post_beef_array(&self, beefs: &[Vec<u8>]) -> Result<Vec<PostBeefResult>, ServiceError>;

    /// Whether `root` is the merkle root at `height`.
    async fn is_valid_root_for_height(&self, root: &str, height: u32)
        -> Result<bool, ServiceError>;
}
