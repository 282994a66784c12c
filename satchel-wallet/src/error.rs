//! The structured error surface every method call resolves to.

use thiserror::Error;

/// Stable error codes carried on the wire and in the JSON error
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    InvalidArgument = 1,
    Unauthorized = 2,
    InsufficientFunds = 3,
    ReservationConflict = 4,
    ScriptMismatch = 5,
    BroadcastRejected = 6,
    BroadcastTransient = 7,
    ServiceUnavailable = 8,
    StorageConflict = 9,
    Canceled = 10,
    MalformedFrame = 11,
    UnknownMethod = 12,
    TransactionSize = 13,
    Internal = 14,
}

#[derive(Debug, Error)]
#[error("{description}")]
pub struct WalletError {
    pub code: ErrorCode,
    pub description: String,
}

impl WalletError {
    pub fn new(code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn invalid(description: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, description)
    }
}

impl From<satchel_codec::Error> for WalletError {
    fn from(err: satchel_codec::Error) -> Self {
        let code = match err {
            satchel_codec::Error::UnknownMethod(_) => ErrorCode::UnknownMethod,
            _ => ErrorCode::MalformedFrame,
        };
        Self::new(code, err.to_string())
    }
}

impl From<satchel_crypto::CryptoError> for WalletError {
    fn from(err: satchel_crypto::CryptoError) -> Self {
        Self::new(ErrorCode::InvalidArgument, err.to_string())
    }
}

impl From<satchel_primitives::Error> for WalletError {
    fn from(err: satchel_primitives::Error) -> Self {
        let code = match err {
            satchel_primitives::Error::TransactionSize => ErrorCode::TransactionSize,
            _ => ErrorCode::InvalidArgument,
        };
        Self::new(code, err.to_string())
    }
}

impl From<satchel_services::ServiceError> for WalletError {
    fn from(err: satchel_services::ServiceError) -> Self {
        use satchel_services::ServiceError::*;
        let code = match &err {
            Unavailable(_) => ErrorCode::ServiceUnavailable,
            Rejected { .. } | InvalidResponse(_) | Config(_) => ErrorCode::ServiceUnavailable,
            BroadcastRejected(_) => ErrorCode::BroadcastRejected,
            Canceled => ErrorCode::Canceled,
        };
        Self::new(code, err.to_string())
    }
}

impl From<satchel_storage::StorageError> for WalletError {
    fn from(err: satchel_storage::StorageError) -> Self {
        use satchel_storage::StorageError::*;
        match err {
            InsufficientFunds { .. } => Self::new(ErrorCode::InsufficientFunds, err.to_string()),
            ReservationConflict { .. } => {
                Self::new(ErrorCode::ReservationConflict, err.to_string())
            }
            ScriptMismatch { .. } => Self::new(ErrorCode::ScriptMismatch, err.to_string()),
            InvalidArgument(_) | NotFound(_) | TxidMismatch { .. } => {
                Self::new(ErrorCode::InvalidArgument, err.to_string())
            }
            InvalidTransition { .. } => Self::new(ErrorCode::StorageConflict, err.to_string()),
            Sql(_) => Self::new(ErrorCode::StorageConflict, err.to_string()),
            Primitives(inner) => inner.into(),
            Template(inner) => match inner {
                satchel_txbuilder::Error::Crypto(c) => c.into(),
                satchel_txbuilder::Error::Primitives(p) => p.into(),
                satchel_txbuilder::Error::KeyMismatch => {
                    Self::new(ErrorCode::ScriptMismatch, inner.to_string())
                }
            },
            Crypto(inner) => inner.into(),
            Service(inner) => inner.into(),
        }
    }
}

/// JSON error shape `{code, description}`.
#[derive(Debug, serde::Serialize)]
pub struct ErrorShape {
    pub code: u8,
    pub description: String,
}

impl From<&WalletError> for ErrorShape {
    fn from(err: &WalletError) -> Self {
        Self {
            code: err.code as u8,
            description: err.description.clone(),
        }
    }
}
