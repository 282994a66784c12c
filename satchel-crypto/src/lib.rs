//! Cryptographic primitives for the satchel wallet: SHA-256 family
//! hashing, HMAC, BRC-42 key derivation over secp256k1, ECDSA
//! signatures and the BIE1 authenticated-encryption envelope.

pub mod derive;
pub mod ecdsa;
pub mod hash;
pub mod symmetric;

/// Shared re-export so dependents use one curve implementation.
pub use secp256k1;

pub use derive::{KeyDeriver, RootKey};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Counterparty key bytes do not describe a valid compressed point.
    #[error("invalid counterparty key: {0}")]
    InvalidCounterparty(String),

    /// Root key bytes are not a valid secp256k1 secret.
    #[error("invalid root key: {0}")]
    InvalidRootKey(&'static str),

    /// Protocol identifier violates the BRC-43 rules.
    #[error("invalid protocol: {0}")]
    InvalidProtocol(&'static str),

    /// Key identifier violates the BRC-43 rules.
    #[error("invalid key id: {0}")]
    InvalidKeyId(&'static str),

    /// Underlying curve operation failed (off-curve point, zero
    /// scalar after tweak, malformed signature bytes).
    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),

    /// Ciphertext failed authentication or carries an unknown header.
    #[error("decryption failed: {0}")]
    Decrypt(&'static str),

    /// A caller-supplied digest has the wrong length.
    #[error("invalid digest: {0}")]
    InvalidDigest(&'static str),
}
