//! BRC-42 key derivation.
//!
//! Child keys are derived from the wallet's master key `m`, a
//! counterparty public key `C` and an invoice string built from the
//! protocol id and key id. The shared secret is `ECDH(m, C)`; the
//! per-invocation scalar is `HMAC-SHA256(S, invoice) mod n`; the child
//! private key is `m + scalar` and the counterparty's child public key
//! is `C + scalar·G`.

use crate::hash::{hmac_sha256, sha256};
use crate::CryptoError;
use satchel_codec::envelope::{Counterparty, ProtocolId};
use secp256k1::{All, PublicKey, Scalar, Secp256k1, SecretKey};
use zeroize::{Zeroize, Zeroizing};

/// Order of the secp256k1 group, big-endian.
const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
    0x41, 0x41,
];

/// Master private key material, wiped from memory on drop.
pub struct RootKey([u8; 32]);

impl RootKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|_| CryptoError::InvalidRootKey("must be 32 hex bytes"))?;
        Ok(Self(bytes))
    }

    fn secret_key(&self) -> Result<SecretKey, CryptoError> {
        Ok(SecretKey::from_slice(&self.0)?)
    }
}

impl Drop for RootKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Derives per-invocation keys from the master key.
///
/// Owns the only copy of the master secret. Scalars produced during
/// derivation live in [`Zeroizing`] buffers and the secret itself is
/// erased on drop.
pub struct KeyDeriver {
    secp: Secp256k1<All>,
    root: SecretKey,
    identity: PublicKey,
}

impl Drop for KeyDeriver {
    fn drop(&mut self) {
        self.root.non_secure_erase();
    }
}

impl KeyDeriver {
    pub fn new(root: RootKey) -> Result<Self, CryptoError> {
        let secp = Secp256k1::new();
        let root = root.secret_key()?;
        let identity = PublicKey::from_secret_key(&secp, &root);
        Ok(Self {
            secp,
            root,
            identity,
        })
    }

    /// The wallet's identity key, `m·G`.
    pub fn identity_public_key(&self) -> PublicKey {
        self.identity
    }

    /// Compressed hex rendering of the identity key.
    pub fn identity_hex(&self) -> String {
        hex::encode(self.identity.serialize())
    }

    /// Resolve a counterparty reference to a concrete public key.
    ///
    /// `"self"` is the wallet's own identity key and `"anyone"` is the
    /// public key of the unit scalar, so that anyone can reproduce the
    /// derivation.
    pub fn resolve_counterparty(&self, counterparty: &Counterparty) -> Result<PublicKey, CryptoError> {
        match counterparty {
            Counterparty::Myself => Ok(self.identity),
            Counterparty::Anyone => {
                let one = SecretKey::from_slice(&{
                    let mut b = [0u8; 32];
                    b[31] = 1;
                    b
                })?;
                Ok(PublicKey::from_secret_key(&self.secp, &one))
            }
            Counterparty::Other(bytes) => PublicKey::from_slice(bytes)
                .map_err(|e| CryptoError::InvalidCounterparty(e.to_string())),
        }
    }

    /// `"{securityLevel}-{protocolName}-{keyID}"` after validation.
    pub fn invoice_number(protocol: &ProtocolId, key_id: &str) -> Result<String, CryptoError> {
        let name = normalize_protocol_name(&protocol.name)?;
        if key_id.is_empty() {
            return Err(CryptoError::InvalidKeyId("must not be empty"));
        }
        if key_id.len() > 800 {
            return Err(CryptoError::InvalidKeyId("longer than 800 bytes"));
        }
        Ok(format!(
            "{}-{}-{}",
            protocol.security_level as u8, name, key_id
        ))
    }

    /// HMAC-SHA256 over the invoice keyed by the compressed ECDH point,
    /// reduced mod n.
    fn per_invocation_scalar(
        &self,
        counterparty: &PublicKey,
        invoice: &str,
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let shared = counterparty.mul_tweak(&self.secp, &Scalar::from(self.root))?;
        let digest = hmac_sha256(&shared.serialize(), invoice.as_bytes());
        let mut scalar = Zeroizing::new(*digest);
        reduce_mod_n(&mut scalar);
        Ok(scalar)
    }

    /// Child private key for `(protocol, keyID, counterparty)`.
    pub fn derive_private(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
    ) -> Result<SecretKey, CryptoError> {
        let counterparty = self.resolve_counterparty(counterparty)?;
        let invoice = Self::invoice_number(protocol, key_id)?;
        let scalar = self.per_invocation_scalar(&counterparty, &invoice)?;
        let tweak = Scalar::from_be_bytes(*scalar).map_err(|_| secp256k1::Error::InvalidTweak)?;
        Ok(self.root.add_tweak(&tweak)?)
    }

    /// Child public key. With `for_self` the wallet's own child key is
    /// derived (`m·G + scalar·G`); otherwise the counterparty's
    /// (`C + scalar·G`).
    pub fn derive_public(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
        for_self: bool,
    ) -> Result<PublicKey, CryptoError> {
        let resolved = self.resolve_counterparty(counterparty)?;
        let invoice = Self::invoice_number(protocol, key_id)?;
        let scalar = self.per_invocation_scalar(&resolved, &invoice)?;
        let tweak = Scalar::from_be_bytes(*scalar).map_err(|_| secp256k1::Error::InvalidTweak)?;
        let base = if for_self { self.identity } else { resolved };
        Ok(base.add_exp_tweak(&self.secp, &tweak)?)
    }

    /// Symmetric key shared between the two derived child keys:
    /// SHA-256 of the compressed point `child_priv · child_pub_of_counterparty`.
    ///
    /// Both parties arrive at `(m_a + s)(m_b + s)·G` and therefore the
    /// same key.
    pub fn derive_symmetric_key(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let child_priv = self.derive_private(protocol, key_id, counterparty)?;
        let child_pub = self.derive_public(protocol, key_id, counterparty, false)?;
        let point = child_pub.mul_tweak(&self.secp, &Scalar::from(child_priv))?;
        Ok(Zeroizing::new(*sha256(&point.serialize())))
    }

    /// Compressed ECDH point between the identity key and
    /// `counterparty`: the root linkage disclosed by
    /// `revealCounterpartyKeyLinkage`.
    pub fn counterparty_linkage(
        &self,
        counterparty: &PublicKey,
    ) -> Result<Zeroizing<[u8; 33]>, CryptoError> {
        let shared = counterparty.mul_tweak(&self.secp, &Scalar::from(self.root))?;
        Ok(Zeroizing::new(shared.serialize()))
    }

    /// Per-invocation scalar bytes for `(protocol, keyID,
    /// counterparty)`: the specific linkage disclosed by
    /// `revealSpecificKeyLinkage`.
    pub fn specific_linkage(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let resolved = self.resolve_counterparty(counterparty)?;
        let invoice = Self::invoice_number(protocol, key_id)?;
        self.per_invocation_scalar(&resolved, &invoice)
    }

    pub(crate) fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }
}

/// Trim, lowercase and validate a BRC-43 protocol name.
fn normalize_protocol_name(name: &str) -> Result<String, CryptoError> {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return Err(CryptoError::InvalidProtocol("name must not be empty"));
    }
    if name.len() > 400 {
        return Err(CryptoError::InvalidProtocol("name longer than 400 bytes"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ')
    {
        return Err(CryptoError::InvalidProtocol(
            "name must contain only letters, numbers and spaces",
        ));
    }
    if name.ends_with(" protocol") {
        return Err(CryptoError::InvalidProtocol(
            "name must not end with \" protocol\"",
        ));
    }
    Ok(name)
}

/// Interpret `bytes` as a big-endian integer and reduce it mod n.
///
/// The HMAC output is below 2^256 < 2n, so a single conditional
/// subtraction suffices.
fn reduce_mod_n(bytes: &mut [u8; 32]) {
    let ge = bytes
        .iter()
        .zip(CURVE_ORDER.iter())
        .find(|(b, n)| b != n)
        .map(|(b, n)| b > n)
        .unwrap_or(true);
    if ge {
        let mut borrow = 0u16;
        for i in (0..32).rev() {
            let diff = 0x100 + bytes[i] as u16 - CURVE_ORDER[i] as u16 - borrow;
            bytes[i] = (diff & 0xFF) as u8;
            borrow = 1 - (diff >> 8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_codec::envelope::SecurityLevel;

    fn deriver() -> KeyDeriver {
        KeyDeriver::new(RootKey::new([0x22; 32])).unwrap()
    }

    fn protocol() -> ProtocolId {
        ProtocolId::new(SecurityLevel::Counterparty, "ctx")
    }

    #[test]
    fn public_matches_private_for_self() {
        let kd = deriver();
        let child_priv = kd
            .derive_private(&protocol(), "default", &Counterparty::Myself)
            .unwrap();
        let child_pub = kd
            .derive_public(&protocol(), "default", &Counterparty::Myself, true)
            .unwrap();
        assert_eq!(
            PublicKey::from_secret_key(kd.secp(), &child_priv),
            child_pub
        );
    }

    #[test]
    fn distinct_key_ids_distinct_keys() {
        let kd = deriver();
        let a = kd
            .derive_private(&protocol(), "key-1", &Counterparty::Anyone)
            .unwrap();
        let b = kd
            .derive_private(&protocol(), "key-2", &Counterparty::Anyone)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn symmetric_key_agreement_between_wallets() {
        let alice = KeyDeriver::new(RootKey::new([0x11; 32])).unwrap();
        let bob = KeyDeriver::new(RootKey::new([0x33; 32])).unwrap();
        let alice_pub = alice.identity_public_key().serialize();
        let bob_pub = bob.identity_public_key().serialize();

        let k_alice = alice
            .derive_symmetric_key(&protocol(), "default", &Counterparty::Other(bob_pub))
            .unwrap();
        let k_bob = bob
            .derive_symmetric_key(&protocol(), "default", &Counterparty::Other(alice_pub))
            .unwrap();
        assert_eq!(*k_alice, *k_bob);
    }

    #[test]
    fn empty_protocol_name_rejected() {
        let kd = deriver();
        let bad = ProtocolId::new(SecurityLevel::App, "   ");
        assert!(matches!(
            kd.derive_private(&bad, "default", &Counterparty::Myself),
            Err(CryptoError::InvalidProtocol(_))
        ));
    }

    #[test]
    fn malformed_counterparty_rejected() {
        let kd = deriver();
        // 33 bytes that are not a valid compressed point encoding.
        let bogus = Counterparty::Other([0xFF; 33]);
        assert!(matches!(
            kd.derive_private(&protocol(), "default", &bogus),
            Err(CryptoError::InvalidCounterparty(_))
        ));
    }

    #[test]
    fn invoice_number_format() {
        let invoice =
            KeyDeriver::invoice_number(&ProtocolId::new(SecurityLevel::Counterparty, " Ctx "), "k")
                .unwrap();
        assert_eq!(invoice, "2-ctx-k");
    }

    #[test]
    fn reduce_mod_n_is_identity_below_n() {
        let mut small = [0u8; 32];
        small[31] = 7;
        let expect = small;
        reduce_mod_n(&mut small);
        assert_eq!(small, expect);
    }

    #[test]
    fn reduce_mod_n_wraps_max() {
        let mut max = [0xFF; 32];
        reduce_mod_n(&mut max);
        // 2^256 - 1 - n, spot check the tail bytes.
        assert_ne!(max, [0xFF; 32]);
    }
}
