//! BEEF bundles: a transaction together with the BUMPs needed to
//! validate it, and the AtomicBEEF wrapper that anchors a bundle to a
//! single subject txid.
//!
//! Layout (v2): 4-byte version word, varint BUMP count and BUMPs,
//! varint transaction count, then per transaction one data-format byte
//! (raw, raw + BUMP index, or txid only) and its payload. Transactions
//! appear in dependency order, parents first.

use crate::merkle::MerklePath;
use crate::transaction::{Transaction, Txid};
use crate::Error;
use satchel_codec::{Reader, ToWire, Writer};

pub const BEEF_V1: u32 = 4022206465;
pub const BEEF_V2: u32 = 4022206466;
/// Four-byte prefix before the subject txid of an AtomicBEEF.
pub const ATOMIC_PREFIX: u32 = 0x01010101;

const FORMAT_RAW: u8 = 0;
const FORMAT_RAW_WITH_BUMP: u8 = 1;
const FORMAT_TXID_ONLY: u8 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeefTx {
    Raw {
        raw: Vec<u8>,
        bump_index: Option<u64>,
    },
    /// Known-valid dependency carried by id alone.
    TxidOnly(Txid),
}

impl BeefTx {
    pub fn txid(&self) -> Txid {
        match self {
            BeefTx::Raw { raw, .. } => Txid::from_raw_tx(raw),
            BeefTx::TxidOnly(txid) => *txid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beef {
    pub version: u32,
    pub bumps: Vec<MerklePath>,
    pub txs: Vec<BeefTx>,
}

impl Default for Beef {
    fn default() -> Self {
        Self::new_v2()
    }
}

impl Beef {
    pub fn new_v2() -> Self {
        Self {
            version: BEEF_V2,
            bumps: Vec::new(),
            txs: Vec::new(),
        }
    }

    /// Add a BUMP, reusing an existing slot when an identical path is
    /// already present. Returns the BUMP's index.
    pub fn merge_bump(&mut self, bump: MerklePath) -> u64 {
        if let Some(i) = self.bumps.iter().position(|b| *b == bump) {
            return i as u64;
        }
        self.bumps.push(bump);
        (self.bumps.len() - 1) as u64
    }

    /// Add a raw transaction, replacing a txid-only placeholder if one
    /// exists for the same id.
    pub fn merge_raw_tx(&mut self, raw: Vec<u8>, bump_index: Option<u64>) -> Txid {
        let txid = Txid::from_raw_tx(&raw);
        if let Some(existing) = self.txs.iter_mut().find(|t| t.txid() == txid) {
            *existing = BeefTx::Raw { raw, bump_index };
        } else {
            self.txs.push(BeefTx::Raw { raw, bump_index });
        }
        txid
    }

    pub fn merge_txid_only(&mut self, txid: Txid) {
        if !self.txs.iter().any(|t| t.txid() == txid) {
            self.txs.push(BeefTx::TxidOnly(txid));
        }
    }

    pub fn find_transaction(&self, txid: &Txid) -> Option<&BeefTx> {
        self.txs.iter().find(|t| t.txid() == *txid)
    }

    /// Raw bytes of the transaction for `txid`, when carried in full.
    pub fn raw_tx(&self, txid: &Txid) -> Option<&[u8]> {
        match self.find_transaction(txid)? {
            BeefTx::Raw { raw, .. } => Some(raw),
            BeefTx::TxidOnly(_) => None,
        }
    }

    /// BUMP covering `txid`, when the bundle carries a mined proof.
    pub fn bump_for(&self, txid: &Txid) -> Option<&MerklePath> {
        match self.find_transaction(txid)? {
            BeefTx::Raw {
                bump_index: Some(i),
                ..
            } => self.bumps.get(*i as usize),
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(self.version);
        w.put_varint(self.bumps.len() as u64);
        for bump in &self.bumps {
            bump.to_wire(&mut w);
        }
        w.put_varint(self.txs.len() as u64);
        for tx in &self.txs {
            match tx {
                BeefTx::Raw { raw, bump_index } => {
                    match bump_index {
                        Some(i) => {
                            w.put_u8(FORMAT_RAW_WITH_BUMP);
                            w.put_bytes(raw);
                            w.put_varint(*i);
                        }
                        None => {
                            w.put_u8(FORMAT_RAW);
                            w.put_bytes(raw);
                        }
                    };
                }
                BeefTx::TxidOnly(txid) => {
                    w.put_u8(FORMAT_TXID_ONLY);
                    w.put_bytes(txid.internal());
                }
            }
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = Reader::new(bytes);
        let beef = Self::read(&mut r)?;
        if r.remaining() != 0 {
            return Err(satchel_codec::Error::TrailingBytes(r.remaining()).into());
        }
        Ok(beef)
    }

    fn read(r: &mut Reader) -> Result<Self, Error> {
        use satchel_codec::FromWire as _;

        let version = r.get_u32()?;
        if version != BEEF_V2 {
            return Err(Error::BeefVersion(version));
        }
        let n_bumps = r.get_varint()?;
        let mut bumps = Vec::with_capacity(n_bumps.min(1024) as usize);
        for _ in 0..n_bumps {
            bumps.push(MerklePath::from_wire(r)?);
        }
        let n_txs = r.get_varint()?;
        let mut txs = Vec::with_capacity(n_txs.min(1024) as usize);
        for _ in 0..n_txs {
            let format = r.get_u8()?;
            let tx = match format {
                FORMAT_RAW | FORMAT_RAW_WITH_BUMP => {
                    // Raw transactions are not length-prefixed; decode
                    // through the transaction codec and re-serialize.
                    let tx = Transaction::read(r)?;
                    let bump_index = if format == FORMAT_RAW_WITH_BUMP {
                        Some(r.get_varint()?)
                    } else {
                        None
                    };
                    BeefTx::Raw {
                        raw: tx.to_bytes(),
                        bump_index,
                    }
                }
                FORMAT_TXID_ONLY => {
                    let bytes: [u8; 32] = r.take(32)?.try_into().unwrap();
                    BeefTx::TxidOnly(Txid::from_internal(bytes))
                }
                value => {
                    return Err(satchel_codec::Error::InvalidDiscriminant {
                        what: "beef tx format",
                        value,
                    }
                    .into())
                }
            };
            txs.push(tx);
        }
        Ok(Self {
            version,
            bumps,
            txs,
        })
    }
}

/// A BEEF anchored to one subject transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicBeef {
    pub subject: Txid,
    pub beef: Beef,
}

impl AtomicBeef {
    pub fn new(subject: Txid, beef: Beef) -> Result<Self, Error> {
        if beef.find_transaction(&subject).is_none() {
            return Err(Error::SubjectMissing(subject));
        }
        Ok(Self { subject, beef })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(ATOMIC_PREFIX);
        w.put_bytes(self.subject.internal());
        w.put_bytes(&self.beef.to_bytes());
        w.into_bytes()
    }

    /// Parse AtomicBEEF, or fall back to a bare BEEF when the atomic
    /// prefix is absent (in which case the subject must be the only
    /// raw transaction carried).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() >= 36 {
            let mut r = Reader::new(bytes);
            let prefix = r.get_u32()?;
            if prefix == ATOMIC_PREFIX {
                let subject: [u8; 32] = r.take(32)?.try_into().unwrap();
                let subject = Txid::from_internal(subject);
                let beef = Beef::from_bytes(r.take(r.remaining())?)?;
                return Self::new(subject, beef);
            }
        }
        let beef = Beef::from_bytes(bytes)?;
        let subject = beef
            .txs
            .iter()
            .rev()
            .find(|t| matches!(t, BeefTx::Raw { .. }))
            .map(|t| t.txid())
            .ok_or(Error::EmptyBeef)?;
        Self::new(subject, beef)
    }

    /// Raw bytes of the subject transaction.
    pub fn subject_raw_tx(&self) -> Result<&[u8], Error> {
        self.beef
            .raw_tx(&self.subject)
            .ok_or(Error::SubjectMissing(self.subject))
    }
}

/// Assemble AtomicBEEF from a raw transaction and an optional mined
/// proof. Unmined transactions travel without a BUMP; consumers
/// tolerate the absence.
pub fn build_atomic_beef(raw_tx: &[u8], merkle_path: Option<MerklePath>) -> AtomicBeef {
    let mut beef = Beef::new_v2();
    let bump_index = merkle_path.map(|path| beef.merge_bump(path));
    let subject = beef.merge_raw_tx(raw_tx.to_vec(), bump_index);
    AtomicBeef { subject, beef }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::PathLeaf;
    use crate::script::Script;
    use crate::transaction::{OutPoint, TxInput, TxOutput};
    use satchel_crypto::hash::sha256d;

    fn sample_raw_tx() -> Vec<u8> {
        Transaction {
            version: 1,
            inputs: vec![TxInput::new(OutPoint::new(Txid::from_raw_tx(b"p"), 0))],
            outputs: vec![TxOutput::new(1234, Script::from_bytes(vec![0x6A]))],
            lock_time: 0,
        }
        .to_bytes()
    }

    fn sample_bump(txid: Txid) -> MerklePath {
        MerklePath::new(
            850_000,
            vec![vec![
                PathLeaf::of_txid(0, txid),
                PathLeaf::of_hash(1, sha256d(b"sibling")),
            ]],
        )
    }

    #[test]
    fn unmined_atomic_round_trip() {
        let raw = sample_raw_tx();
        let atomic = build_atomic_beef(&raw, None);
        let bytes = atomic.to_bytes();
        assert_eq!(&bytes[..4], &ATOMIC_PREFIX.to_le_bytes());

        let back = AtomicBeef::from_bytes(&bytes).unwrap();
        assert_eq!(back, atomic);
        assert_eq!(back.subject_raw_tx().unwrap(), &raw[..]);
        assert!(back.beef.bump_for(&back.subject).is_none());
    }

    #[test]
    fn mined_atomic_carries_bump() {
        let raw = sample_raw_tx();
        let txid = Txid::from_raw_tx(&raw);
        let atomic = build_atomic_beef(&raw, Some(sample_bump(txid)));
        let back = AtomicBeef::from_bytes(&atomic.to_bytes()).unwrap();
        let bump = back.beef.bump_for(&txid).expect("bump present");
        assert_eq!(bump.block_height, 850_000);
        assert!(bump.compute_root(&txid).is_ok());
    }

    #[test]
    fn merge_bump_dedupes() {
        let raw = sample_raw_tx();
        let txid = Txid::from_raw_tx(&raw);
        let mut beef = Beef::new_v2();
        assert_eq!(beef.merge_bump(sample_bump(txid)), 0);
        assert_eq!(beef.merge_bump(sample_bump(txid)), 0);
        assert_eq!(beef.bumps.len(), 1);
    }

    #[test]
    fn bare_beef_fallback_uses_last_raw_tx() {
        let raw = sample_raw_tx();
        let mut beef = Beef::new_v2();
        beef.merge_raw_tx(raw.clone(), None);
        let atomic = AtomicBeef::from_bytes(&beef.to_bytes()).unwrap();
        assert_eq!(atomic.subject, Txid::from_raw_tx(&raw));
    }

    #[test]
    fn v1_version_rejected() {
        let mut bytes = Beef::new_v2().to_bytes();
        bytes[..4].copy_from_slice(&BEEF_V1.to_le_bytes());
        assert!(matches!(
            Beef::from_bytes(&bytes),
            Err(Error::BeefVersion(BEEF_V1))
        ));
    }
}
