//! BUMP merkle paths: the compact proof format carried inside BEEF
//! and returned by the header service.
//!
//! Binary layout: varint block height, one byte of tree height, then
//! per level a varint leaf count and leaves of
//! `(varint offset, flags, hash)`. Flag bit 0 marks a duplicated
//! working hash (no hash bytes follow), bit 1 marks the leaf holding a
//! subject txid.

use crate::transaction::Txid;
use crate::Error;
use satchel_codec::{FromWire, Reader, ToWire, Writer};
use satchel_crypto::hash::{sha256d, Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const FLAG_DUPLICATE: u8 = 0x01;
const FLAG_TXID: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLeaf {
    pub offset: u64,
    /// Internal-order hash; absent when the working hash is duplicated.
    pub hash: Option<Hash<32>>,
    pub duplicate: bool,
    /// Marks a leaf whose hash is a subject transaction id.
    pub is_txid: bool,
}

impl PathLeaf {
    pub fn of_hash(offset: u64, hash: Hash<32>) -> Self {
        Self {
            offset,
            hash: Some(hash),
            duplicate: false,
            is_txid: false,
        }
    }

    pub fn of_txid(offset: u64, txid: Txid) -> Self {
        Self {
            offset,
            hash: Some(Hash::new(*txid.internal())),
            duplicate: false,
            is_txid: true,
        }
    }

    pub fn of_duplicate(offset: u64) -> Self {
        Self {
            offset,
            hash: None,
            duplicate: true,
            is_txid: false,
        }
    }
}

impl ToWire for PathLeaf {
    fn to_wire(&self, w: &mut Writer) {
        w.put_varint(self.offset);
        let mut flags = 0u8;
        if self.duplicate {
            flags |= FLAG_DUPLICATE;
        }
        if self.is_txid {
            flags |= FLAG_TXID;
        }
        w.put_u8(flags);
        if let Some(hash) = &self.hash {
            w.put_bytes(hash.as_ref());
        }
    }
}

impl FromWire for PathLeaf {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        let offset = r.get_varint()?;
        let flags = r.get_u8()?;
        let duplicate = flags & FLAG_DUPLICATE != 0;
        let hash = if duplicate {
            None
        } else {
            let bytes: [u8; 32] = r.take(32)?.try_into().unwrap();
            Some(Hash::new(bytes))
        };
        Ok(PathLeaf {
            offset,
            hash,
            duplicate,
            is_txid: flags & FLAG_TXID != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerklePath {
    pub block_height: u32,
    /// Levels from the leaves up; `path[0]` holds txid-bearing leaves.
    pub path: Vec<Vec<PathLeaf>>,
}

impl MerklePath {
    pub fn new(block_height: u32, path: Vec<Vec<PathLeaf>>) -> Self {
        Self { block_height, path }
    }

    pub fn tree_height(&self) -> usize {
        self.path.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        satchel_codec::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(satchel_codec::from_bytes(bytes)?)
    }

    fn leaf_at(&self, height: usize, offset: u64) -> Option<&PathLeaf> {
        self.path.get(height)?.iter().find(|l| l.offset == offset)
    }

    /// Offset of `txid` in the block's leaf row.
    pub fn leaf_offset(&self, txid: &Txid) -> Option<u64> {
        let target = Hash::new(*txid.internal());
        self.path
            .first()?
            .iter()
            .find(|l| l.hash == Some(target))
            .map(|l| l.offset)
    }

    /// Merkle root reached by walking the path from `txid`.
    pub fn compute_root(&self, txid: &Txid) -> Result<Hash<32>, Error> {
        let mut offset = self.leaf_offset(txid).ok_or(Error::PathBroken {
            height: 0,
            offset: 0,
        })?;
        let mut working = Hash::new(*txid.internal());

        for height in 0..self.path.len() {
            let sibling_offset = offset ^ 1;
            let sibling = self
                .leaf_at(height, sibling_offset)
                .ok_or(Error::PathBroken {
                    height,
                    offset: sibling_offset,
                })?;
            let sibling_hash = if sibling.duplicate {
                working
            } else {
                sibling.hash.ok_or(Error::PathBroken {
                    height,
                    offset: sibling_offset,
                })?
            };

            let mut concat = [0u8; 64];
            if sibling_offset < offset {
                concat[..32].copy_from_slice(sibling_hash.as_ref());
                concat[32..].copy_from_slice(working.as_ref());
            } else {
                concat[..32].copy_from_slice(working.as_ref());
                concat[32..].copy_from_slice(sibling_hash.as_ref());
            }
            working = sha256d(&concat);
            offset >>= 1;
        }
        Ok(working)
    }
}

impl ToWire for MerklePath {
    fn to_wire(&self, w: &mut Writer) {
        w.put_varint(self.block_height as u64);
        w.put_u8(self.path.len() as u8);
        for level in &self.path {
            w.put_seq(level);
        }
    }
}

impl FromWire for MerklePath {
    fn from_wire(r: &mut Reader) -> Result<Self, satchel_codec::Error> {
        let block_height = r.get_varint()? as u32;
        let tree_height = r.get_u8()?;
        let mut path = Vec::with_capacity(tree_height as usize);
        for _ in 0..tree_height {
            path.push(r.get_seq()?);
        }
        Ok(MerklePath { block_height, path })
    }
}

// JSON shape used by the header service: display-order hex hashes,
// flags spelled out as booleans.
#[derive(Serialize, Deserialize)]
struct LeafRepr {
    offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    txid: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    duplicate: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathRepr {
    block_height: u32,
    path: Vec<Vec<LeafRepr>>,
}

impl Serialize for MerklePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = PathRepr {
            block_height: self.block_height,
            path: self
                .path
                .iter()
                .map(|level| {
                    level
                        .iter()
                        .map(|leaf| LeafRepr {
                            offset: leaf.offset,
                            hash: leaf.hash.map(|h| h.reversed().to_string()),
                            txid: leaf.is_txid,
                            duplicate: leaf.duplicate,
                        })
                        .collect()
                })
                .collect(),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MerklePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = PathRepr::deserialize(deserializer)?;
        let path = repr
            .path
            .into_iter()
            .map(|level| {
                level
                    .into_iter()
                    .map(|leaf| {
                        let hash = leaf
                            .hash
                            .map(|s| {
                                s.parse::<Hash<32>>()
                                    .map(Hash::reversed)
                                    .map_err(serde::de::Error::custom)
                            })
                            .transpose()?;
                        Ok(PathLeaf {
                            offset: leaf.offset,
                            hash,
                            duplicate: leaf.duplicate,
                            is_txid: leaf.txid,
                        })
                    })
                    .collect::<Result<Vec<_>, D::Error>>()
            })
            .collect::<Result<Vec<_>, D::Error>>()?;
        Ok(MerklePath::new(repr.block_height, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_leaf_path(txid: &Txid, sibling: Hash<32>) -> MerklePath {
        MerklePath::new(
            850_000,
            vec![vec![
                PathLeaf::of_txid(0, *txid),
                PathLeaf::of_hash(1, sibling),
            ]],
        )
    }

    #[test]
    fn two_leaf_root() {
        let txid = Txid::from_raw_tx(b"left");
        let sibling = sha256d(b"right");
        let path = two_leaf_path(&txid, sibling);

        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(txid.internal());
        concat[32..].copy_from_slice(sibling.as_ref());
        assert_eq!(path.compute_root(&txid).unwrap(), sha256d(&concat));
    }

    #[test]
    fn duplicate_sibling_doubles_working_hash() {
        let txid = Txid::from_raw_tx(b"odd one out");
        let path = MerklePath::new(
            1,
            vec![vec![
                PathLeaf::of_txid(0, txid),
                PathLeaf::of_duplicate(1),
            ]],
        );
        let mut concat = [0u8; 64];
        concat[..32].copy_from_slice(txid.internal());
        concat[32..].copy_from_slice(txid.internal());
        assert_eq!(path.compute_root(&txid).unwrap(), sha256d(&concat));
    }

    #[test]
    fn binary_round_trip() {
        let txid = Txid::from_raw_tx(b"leaf");
        let path = two_leaf_path(&txid, sha256d(b"sibling"));
        let bytes = path.to_bytes();
        assert_eq!(MerklePath::from_bytes(&bytes).unwrap(), path);
    }

    #[test]
    fn json_round_trip_reverses_hashes() {
        let txid = Txid::from_raw_tx(b"leaf");
        let path = two_leaf_path(&txid, sha256d(b"sibling"));
        let json = serde_json::to_string(&path).unwrap();
        assert!(json.contains(&txid.to_string()));
        let back: MerklePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }

    #[test]
    fn unknown_txid_is_broken_path() {
        let txid = Txid::from_raw_tx(b"leaf");
        let path = two_leaf_path(&txid, sha256d(b"sibling"));
        let stranger = Txid::from_raw_tx(b"stranger");
        assert!(path.compute_root(&stranger).is_err());
    }
}
