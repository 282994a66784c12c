//! BRC-29 payment templates: P2PKH locking scripts bound to BRC-42
//! derived keys, the unlocking-script producer that signs them, and
//! Base58Check addresses for display.

pub mod address;
pub mod template;

pub use template::{
    brc29_protocol, key_id, lock_for_counterparty, lock_for_self, unlock, UnlockingTemplate,
    BRC29_PROTOCOL_NAME, P2PKH_UNLOCKING_SCRIPT_LENGTH,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("crypto error: {0}")]
    Crypto(#[from] satchel_crypto::CryptoError),

    #[error("primitives error: {0}")]
    Primitives(#[from] satchel_primitives::Error),

    /// The output being unlocked is not a P2PKH lock for the derived
    /// key.
    #[error("locking script does not pay the derived key")]
    KeyMismatch,
}
