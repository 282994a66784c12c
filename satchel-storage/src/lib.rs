//! Persistence and the algorithmic storage methods of the wallet:
//! the SQLite-backed [`StorageProvider`] with the entity model of
//! users, baskets, actions, outputs, labels, tags, proven
//! transactions and broadcast requests, and the methods layer that
//! drives change generation, action processing, internalization,
//! listing, broadcast and review.

pub mod entities;
pub mod methods;
pub mod provider;
pub mod schema;

/// Shared re-export so dependents use one clock/duration type for the
/// review and purge windows.
pub use chrono;

pub use entities::*;
pub use provider::StorageProvider;

use satchel_codec::envelope::ActionStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The spendable pool cannot cover the target plus fee.
    #[error("insufficient funds: need {needed} more satoshis, {available} available")]
    InsufficientFunds { needed: u64, available: u64 },

    /// Another in-flight action holds one of the requested outputs.
    #[error("output {output_id} already reserved by {reserved_by}")]
    ReservationConflict { output_id: i64, reserved_by: String },

    /// An internalized output's script does not match its remittance.
    #[error("script mismatch at output {vout}: {reason}")]
    ScriptMismatch { vout: u32, reason: String },

    /// Transition not admitted by the action state machine.
    #[error("invalid status transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: ActionStatus,
        to: ActionStatus,
    },

    /// Raw transaction bytes disagree with the recorded txid.
    #[error("txid mismatch: expected {expected}, raw tx hashes to {actual}")]
    TxidMismatch { expected: String, actual: String },

    #[error(transparent)]
    Primitives(#[from] satchel_primitives::Error),

    #[error(transparent)]
    Template(#[from] satchel_txbuilder::Error),

    #[error(transparent)]
    Crypto(#[from] satchel_crypto::CryptoError),

    #[error(transparent)]
    Service(#[from] satchel_services::ServiceError),
}
