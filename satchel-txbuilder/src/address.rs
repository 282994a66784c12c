//! Base58Check P2PKH addresses for display and interchange.
//!
//! Version byte 0x00 on mainnet, 0x6F on testnet, followed by the
//! 20-byte key hash and a 4-byte double-SHA-256 checksum.

use satchel_codec::envelope::{Counterparty, Network};
use satchel_crypto::hash::{hash160, sha256d, Hash};
use satchel_crypto::KeyDeriver;

use crate::template::{brc29_protocol, key_id};
use crate::Error;

const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn version_byte(network: Network) -> u8 {
    match network {
        Network::Mainnet => 0x00,
        Network::Testnet => 0x6F,
    }
}

fn base58_encode(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let leading_zeros = bytes.iter().take_while(|b| **b == 0).count();
    let mut out = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        out.push('1');
    }
    for &digit in digits.iter().rev() {
        out.push(BASE58_ALPHABET[digit as usize] as char);
    }
    out
}

/// Base58Check address for a 20-byte key hash.
pub fn p2pkh_address(hash: &Hash<20>, network: Network) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(version_byte(network));
    payload.extend_from_slice(hash.as_ref());
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum.as_ref()[..4]);
    base58_encode(&payload)
}

/// Address of the counterparty's derived child key for a BRC-29
/// payment.
pub fn address_for_counterparty(
    deriver: &KeyDeriver,
    prefix: &str,
    suffix: &str,
    counterparty: &Counterparty,
    network: Network,
) -> Result<String, Error> {
    let child =
        deriver.derive_public(&brc29_protocol(), &key_id(prefix, suffix), counterparty, false)?;
    Ok(p2pkh_address(&hash160(&child.serialize()), network))
}

/// Address of the wallet's own derived child key.
pub fn address_for_self(
    deriver: &KeyDeriver,
    prefix: &str,
    suffix: &str,
    network: Network,
) -> Result<String, Error> {
    let child = deriver.derive_public(
        &brc29_protocol(),
        &key_id(prefix, suffix),
        &Counterparty::Myself,
        true,
    )?;
    Ok(p2pkh_address(&hash160(&child.serialize()), network))
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_crypto::RootKey;

    #[test]
    fn known_mainnet_vector() {
        // hash160 of the compressed generator point; the resulting
        // address is the well-known mainnet vector for that key hash.
        let hash: Hash<20> = "751e76e8199196d454941c45d1b3a323f1433bd6".parse().unwrap();
        assert_eq!(
            p2pkh_address(&hash, Network::Mainnet),
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        );
    }

    #[test]
    fn testnet_prefix_differs() {
        let hash: Hash<20> = "751e76e8199196d454941c45d1b3a323f1433bd6".parse().unwrap();
        let main = p2pkh_address(&hash, Network::Mainnet);
        let test = p2pkh_address(&hash, Network::Testnet);
        assert_ne!(main, test);
        assert!(main.starts_with('1'));
        assert!(test.starts_with('m') || test.starts_with('n'));
    }

    #[test]
    fn self_and_counterparty_roles_agree() {
        let alice = KeyDeriver::new(RootKey::new([0x11; 32])).unwrap();
        let bob = KeyDeriver::new(RootKey::new([0x22; 32])).unwrap();
        let alice_key = Counterparty::Other(alice.identity_public_key().serialize());
        let bob_key = Counterparty::Other(bob.identity_public_key().serialize());

        // The address Alice pays Bob at is the address Bob derives for
        // the payment from Alice.
        let from_alice =
            address_for_counterparty(&alice, "inv", "0", &bob_key, Network::Mainnet).unwrap();
        let bob_view = {
            let child = bob
                .derive_public(&brc29_protocol(), &key_id("inv", "0"), &alice_key, true)
                .unwrap();
            p2pkh_address(&satchel_crypto::hash::hash160(&child.serialize()), Network::Mainnet)
        };
        assert_eq!(from_alice, bob_view);
    }
}
