//! BIE1 authenticated-encryption envelope.
//!
//! Layout: ASCII magic `BIE1`, a version byte (0x02), a 12-byte random
//! nonce, then the AES-256-GCM ciphertext with its appended tag. The
//! 32-byte key is the BRC-42 symmetric key for the derivation context,
//! so the counterparty can open the envelope with its own derivation.

use crate::derive::KeyDeriver;
use crate::CryptoError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use satchel_codec::envelope::{Counterparty, ProtocolId};

const MAGIC: &[u8; 4] = b"BIE1";
const VERSION: u8 = 0x02;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

impl KeyDeriver {
    /// Seal `plaintext` for the derivation context.
    pub fn encrypt(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let key = self.derive_symmetric_key(protocol, key_id, counterparty)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Decrypt("encryption failure"))?;

        let mut out = Vec::with_capacity(MAGIC.len() + 1 + NONCE_LEN + sealed.len());
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    /// Open a BIE1 envelope produced for the same derivation context.
    pub fn decrypt(
        &self,
        protocol: &ProtocolId,
        key_id: &str,
        counterparty: &Counterparty,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < MAGIC.len() + 1 + NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decrypt("ciphertext too short"));
        }
        if &ciphertext[..4] != MAGIC {
            return Err(CryptoError::Decrypt("missing BIE1 magic"));
        }
        if ciphertext[4] != VERSION {
            return Err(CryptoError::Decrypt("unsupported envelope version"));
        }
        let nonce = &ciphertext[5..5 + NONCE_LEN];
        let sealed = &ciphertext[5 + NONCE_LEN..];

        let key = self.derive_symmetric_key(protocol, key_id, counterparty)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::Decrypt("authentication failed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::RootKey;
    use satchel_codec::envelope::SecurityLevel;

    fn deriver() -> KeyDeriver {
        KeyDeriver::new(RootKey::new([0x42; 32])).unwrap()
    }

    fn protocol() -> ProtocolId {
        ProtocolId::new(SecurityLevel::Counterparty, "ctx")
    }

    #[test]
    fn round_trip_self() {
        let kd = deriver();
        let pt = b"secret message";
        let ct = kd
            .encrypt(&protocol(), "default", &Counterparty::Myself, pt)
            .unwrap();
        assert_ne!(&ct[..], &pt[..]);
        assert_eq!(&ct[..5], &[0x42, 0x49, 0x45, 0x31, 0x02]);
        let back = kd
            .decrypt(&protocol(), "default", &Counterparty::Myself, &ct)
            .unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn cross_wallet_round_trip() {
        let alice = KeyDeriver::new(RootKey::new([0x11; 32])).unwrap();
        let bob = KeyDeriver::new(RootKey::new([0x99; 32])).unwrap();
        let to_bob = Counterparty::Other(bob.identity_public_key().serialize());
        let from_alice = Counterparty::Other(alice.identity_public_key().serialize());

        let ct = alice
            .encrypt(&protocol(), "k", &to_bob, b"cross-wallet")
            .unwrap();
        let pt = bob.decrypt(&protocol(), "k", &from_alice, &ct).unwrap();
        assert_eq!(pt, b"cross-wallet");
    }

    #[test]
    fn flipped_bit_fails_auth() {
        let kd = deriver();
        let mut ct = kd
            .encrypt(&protocol(), "default", &Counterparty::Myself, b"data")
            .unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 1;
        assert!(matches!(
            kd.decrypt(&protocol(), "default", &Counterparty::Myself, &ct),
            Err(CryptoError::Decrypt(_))
        ));
    }

    #[test]
    fn wrong_context_fails_auth() {
        let kd = deriver();
        let ct = kd
            .encrypt(&protocol(), "default", &Counterparty::Myself, b"data")
            .unwrap();
        assert!(kd
            .decrypt(&protocol(), "other-key", &Counterparty::Myself, &ct)
            .is_err());
    }

    #[test]
    fn truncated_envelope_rejected() {
        let kd = deriver();
        assert!(matches!(
            kd.decrypt(&protocol(), "default", &Counterparty::Myself, b"BIE1"),
            Err(CryptoError::Decrypt(_))
        ));
    }
}
