//! Transaction-level primitives for the satchel wallet: the BSV
//! transaction model with consensus serialization, FORKID sighashes,
//! size estimation, BUMP merkle paths and BEEF bundles.

pub mod beef;
pub mod merkle;
pub mod script;
pub mod sighash;
pub mod size;
pub mod transaction;

pub use beef::{AtomicBeef, Beef, BeefTx};
pub use merkle::{MerklePath, PathLeaf};
pub use script::Script;
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput, Txid};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Byte-level decode failure in a transaction, BUMP or BEEF.
    #[error("codec error: {0}")]
    Codec(#[from] satchel_codec::Error),

    /// A BEEF payload declared a version this implementation does not
    /// read.
    #[error("unsupported BEEF version {0:#010x}")]
    BeefVersion(u32),

    /// The AtomicBEEF subject txid has no transaction in the bundle.
    #[error("subject txid {0} not present in BEEF")]
    SubjectMissing(Txid),

    /// A bare BEEF with no raw transactions cannot name a subject.
    #[error("BEEF carries no raw transactions")]
    EmptyBeef,

    /// A merkle path level is missing the sibling needed to compute
    /// the root.
    #[error("merkle path misses offset {offset} at height {height}")]
    PathBroken { height: usize, offset: u64 },

    /// Arithmetic overflow while estimating a transaction's size.
    #[error("transaction size overflow")]
    TransactionSize,

    /// An outpoint string was not `"txid.vout"`.
    #[error("malformed outpoint: {0}")]
    MalformedOutpoint(String),

    /// Input index outside the transaction under signature.
    #[error("input index {0} out of range")]
    InputIndex(usize),
}
