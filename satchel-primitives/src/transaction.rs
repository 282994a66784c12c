//! The BSV transaction model and its consensus serialization.

use crate::script::Script;
use crate::Error;
use satchel_codec::{FromWire, Reader, ToWire, Writer};
use satchel_crypto::hash::{sha256d, Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_VERSION: u32 = 1;
pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFF;

/// Transaction id.
///
/// Held in internal (hashing) byte order; rendered reversed, the way
/// ids appear everywhere outside consensus serialization.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Txid(Hash<32>);

impl Txid {
    /// Double SHA-256 of the raw transaction bytes.
    pub fn from_raw_tx(raw: &[u8]) -> Self {
        Self(sha256d(raw))
    }

    pub fn from_internal(bytes: [u8; 32]) -> Self {
        Self(Hash::new(bytes))
    }

    /// Bytes in the order they appear inside serialized transactions.
    pub fn internal(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.reversed())
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({self})")
    }
}

impl FromStr for Txid {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let display: Hash<32> = s.parse()?;
        Ok(Self(display.reversed()))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ToWire for Txid {
    fn to_wire(&self, w: &mut Writer) {
        w.put_bytes(self.internal());
    }
}

impl FromWire for Txid {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        let bytes: [u8; 32] = r.take(32)?.try_into().unwrap();
        Ok(Self::from_internal(bytes))
    }
}

/// Reference to a transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutPoint {
    pub txid: Txid,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Txid, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Parse the `"txid.vout"` rendering used across the interface.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let (txid, vout) = s
            .split_once('.')
            .ok_or_else(|| Error::MalformedOutpoint(s.into()))?;
        let txid = txid
            .parse()
            .map_err(|_| Error::MalformedOutpoint(s.into()))?;
        let vout = vout
            .parse()
            .map_err(|_| Error::MalformedOutpoint(s.into()))?;
        Ok(Self { txid, vout })
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.txid, self.vout)
    }
}

impl ToWire for OutPoint {
    fn to_wire(&self, w: &mut Writer) {
        self.txid.to_wire(w);
        w.put_u32(self.vout);
    }
}

impl FromWire for OutPoint {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        Ok(Self {
            txid: Txid::from_wire(r)?,
            vout: r.get_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub prev_out: OutPoint,
    pub unlocking_script: Script,
    pub sequence: u32,
}

impl TxInput {
    pub fn new(prev_out: OutPoint) -> Self {
        Self {
            prev_out,
            unlocking_script: Script::default(),
            sequence: DEFAULT_SEQUENCE,
        }
    }
}

impl ToWire for TxInput {
    fn to_wire(&self, w: &mut Writer) {
        self.prev_out.to_wire(w);
        w.put_var_bytes(self.unlocking_script.as_bytes());
        w.put_u32(self.sequence);
    }
}

impl FromWire for TxInput {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        Ok(Self {
            prev_out: OutPoint::from_wire(r)?,
            unlocking_script: Script::from_bytes(r.get_var_bytes()?),
            sequence: r.get_u32()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub satoshis: u64,
    pub locking_script: Script,
}

impl TxOutput {
    pub fn new(satoshis: u64, locking_script: Script) -> Self {
        Self {
            satoshis,
            locking_script,
        }
    }
}

impl ToWire for TxOutput {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u64(self.satoshis);
        w.put_var_bytes(self.locking_script.as_bytes());
    }
}

impl FromWire for TxOutput {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        Ok(Self {
            satoshis: r.get_u64()?,
            locking_script: Script::from_bytes(r.get_var_bytes()?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }
}

impl Transaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        satchel_codec::to_bytes(self)
    }

    /// Decode a transaction, requiring full consumption of the input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(satchel_codec::from_bytes(bytes)?)
    }

    /// Decode a transaction from a reader that may carry more data
    /// after it (the BEEF case).
    pub fn read(r: &mut Reader) -> Result<Self, Error> {
        Ok(Self::from_wire(r)?)
    }

    pub fn txid(&self) -> Txid {
        Txid::from_raw_tx(&self.to_bytes())
    }

    pub fn total_output_satoshis(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }
}

impl ToWire for Transaction {
    fn to_wire(&self, w: &mut Writer) {
        w.put_u32(self.version);
        w.put_seq(&self.inputs);
        w.put_seq(&self.outputs);
        w.put_u32(self.lock_time);
    }
}

impl FromWire for Transaction {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        Ok(Self {
            version: r.get_u32()?,
            inputs: r.get_seq()?,
            outputs: r.get_seq()?,
            lock_time: r.get_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;

    /// The genesis block coinbase, the best-known fixed transaction.
    const GENESIS_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";
    const GENESIS_COINBASE_TXID: &str =
        "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    #[test]
    fn genesis_coinbase_round_trip() {
        let raw = hex::decode(GENESIS_COINBASE).unwrap();
        let tx = Transaction::from_bytes(&raw).unwrap();
        assert_eq!(tx.version, 1);
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].satoshis, 5_000_000_000);
        assert_eq!(tx.to_bytes(), raw);
        assert_eq!(tx.txid().to_string(), GENESIS_COINBASE_TXID);
    }

    #[test]
    fn txid_hex_round_trip() {
        let txid: Txid = GENESIS_COINBASE_TXID.parse().unwrap();
        assert_eq!(txid.to_string(), GENESIS_COINBASE_TXID);
    }

    #[test]
    fn outpoint_string_round_trip() {
        let outpoint = OutPoint::new(GENESIS_COINBASE_TXID.parse().unwrap(), 3);
        let rendered = outpoint.to_string();
        assert_eq!(OutPoint::parse(&rendered).unwrap(), outpoint);
        assert!(OutPoint::parse("not-an-outpoint").is_err());
        assert!(OutPoint::parse("abcd.xyz").is_err());
    }

    #[test]
    fn truncated_transaction_rejected() {
        let raw = hex::decode(GENESIS_COINBASE).unwrap();
        assert!(Transaction::from_bytes(&raw[..raw.len() - 3]).is_err());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut raw = hex::decode(GENESIS_COINBASE).unwrap();
        raw.push(0);
        assert!(Transaction::from_bytes(&raw).is_err());
    }

    #[test]
    fn conservation_of_value_fields() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![
                TxOutput::new(600, Script::default()),
                TxOutput::new(400, Script::default()),
            ],
            lock_time: 0,
        };
        assert_eq!(tx.total_output_satoshis(), 1000);
    }
}
