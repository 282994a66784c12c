//! Minimal script handling: opcodes, data pushes and the P2PKH
//! pattern the wallet locks and unlocks with.

use satchel_crypto::hash::Hash;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub mod opcodes {
    pub const OP_FALSE: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4C;
    pub const OP_PUSHDATA2: u8 = 0x4D;
    pub const OP_PUSHDATA4: u8 = 0x4E;
    pub const OP_RETURN: u8 = 0x6A;
    pub const OP_DUP: u8 = 0x76;
    pub const OP_EQUALVERIFY: u8 = 0x88;
    pub const OP_HASH160: u8 = 0xA9;
    pub const OP_CHECKSIG: u8 = 0xAC;
}

use opcodes::*;

#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push_opcode(&mut self, opcode: u8) -> &mut Self {
        self.0.push(opcode);
        self
    }

    /// Minimal-length data push.
    pub fn push_data(&mut self, data: &[u8]) -> &mut Self {
        match data.len() {
            0 => self.0.push(OP_FALSE),
            n @ 1..=0x4B => {
                self.0.push(n as u8);
                self.0.extend_from_slice(data);
            }
            n @ 0x4C..=0xFF => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(n as u8);
                self.0.extend_from_slice(data);
            }
            n @ 0x100..=0xFFFF => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
                self.0.extend_from_slice(data);
            }
            n => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(n as u32).to_le_bytes());
                self.0.extend_from_slice(data);
            }
        }
        self
    }

    /// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
    pub fn p2pkh(pubkey_hash: &Hash<20>) -> Self {
        let mut script = Script::new();
        script
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_data(pubkey_hash.as_ref())
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG);
        script
    }

    pub fn is_p2pkh(&self) -> bool {
        self.0.len() == 25
            && self.0[0] == OP_DUP
            && self.0[1] == OP_HASH160
            && self.0[2] == 20
            && self.0[23] == OP_EQUALVERIFY
            && self.0[24] == OP_CHECKSIG
    }

    /// The pubkey hash inside a P2PKH locking script.
    pub fn p2pkh_hash(&self) -> Option<Hash<20>> {
        if !self.is_p2pkh() {
            return None;
        }
        let bytes: [u8; 20] = self.0[3..23].try_into().unwrap();
        Some(Hash::new(bytes))
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2pkh_shape() {
        let hash = Hash::new([7u8; 20]);
        let script = Script::p2pkh(&hash);
        assert_eq!(script.len(), 25);
        assert!(script.is_p2pkh());
        assert_eq!(script.p2pkh_hash(), Some(hash));
    }

    #[test]
    fn non_p2pkh_rejected() {
        let mut script = Script::new();
        script.push_opcode(OP_RETURN).push_data(b"data");
        assert!(!script.is_p2pkh());
        assert_eq!(script.p2pkh_hash(), None);
    }

    #[test]
    fn pushdata_tiers() {
        let mut small = Script::new();
        small.push_data(&[0xAA; 0x4B]);
        assert_eq!(small.as_bytes()[0], 0x4B);

        let mut medium = Script::new();
        medium.push_data(&[0xAA; 0x4C]);
        assert_eq!(medium.as_bytes()[0], OP_PUSHDATA1);

        let mut large = Script::new();
        large.push_data(&[0xAA; 0x100]);
        assert_eq!(large.as_bytes()[0], OP_PUSHDATA2);
    }
}
