//! ECDSA signing and verification over derived keys.
//!
//! Signatures are deterministic (RFC 6979) and low-S as produced by
//! the secp256k1 signing context, which BSV consensus requires.

use crate::derive::KeyDeriver;
use crate::hash::{sha256, Hash};
use crate::CryptoError;
use satchel_codec::envelope::{Counterparty, ProtocolId};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, SecretKey};

/// What gets signed: raw data hashed here, or a digest the caller
/// already produced.
pub enum SignInput<'a> {
    Data(&'a [u8]),
    Digest(&'a [u8]),
}

impl SignInput<'_> {
    fn digest(&self) -> Result<Hash<32>, CryptoError> {
        match self {
            SignInput::Data(data) => Ok(sha256(data)),
            SignInput::Digest(bytes) => {
                let arr: [u8; 32] = (*bytes)
                    .try_into()
                    .map_err(|_| CryptoError::InvalidDigest("must be 32 bytes"))?;
                Ok(Hash::new(arr))
            }
        }
    }
}

impl KeyDeriver {
    /// DER signature over `input` with the child key for the context.
    pub fn sign(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
        input: SignInput<'_>,
    ) -> Result<Vec<u8>, CryptoError> {
        let child = self.derive_private(protocol, key_id, counterparty)?;
        Ok(self
            .sign_digest(&child, &input.digest()?)
            .serialize_der()
            .to_vec())
    }

    /// Verify a DER signature against the derived public key for the
    /// context. With `for_self` the wallet's own child key is used,
    /// matching signatures it produced itself.
    pub fn verify(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
        for_self: bool,
        input: SignInput<'_>,
        signature: &[u8],
    ) -> Result<bool, CryptoError> {
        let key = self.derive_public(protocol, key_id, counterparty, for_self)?;
        let signature = match Signature::from_der(signature) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        Ok(self.verify_digest(&key, &input.digest()?, &signature))
    }

    /// Deterministic low-S signature over a prepared digest with an
    /// already-derived child key.
    pub fn sign_digest(&self, key: &SecretKey, digest: &Hash<32>) -> Signature {
        let message = Message::from_digest(**digest);
        self.secp().sign_ecdsa(&message, key)
    }

    pub fn verify_digest(&self, key: &PublicKey, digest: &Hash<32>, signature: &Signature) -> bool {
        let message = Message::from_digest(**digest);
        self.secp().verify_ecdsa(&message, signature, key).is_ok()
    }

    /// Public half of an already-derived child key.
    pub fn public_key_of(&self, key: &SecretKey) -> PublicKey {
        PublicKey::from_secret_key(self.secp(), key)
    }
}
