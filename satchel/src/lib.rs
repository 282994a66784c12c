//! Rust-native building blocks for BRC-100 BSV wallets.
//!
//! Satchel is a collection of crates implementing the wallet side of
//! the BRC-100 interface: deterministic key derivation, the binary
//! wire codec, transaction primitives and BEEF bundles, the services
//! facade, transactional storage with the action lifecycle, and the
//! orchestrator tying them together. This crate re-exports the
//! members as a single dependency.

#![warn(missing_docs)]

#[doc(inline)]
pub use satchel_codec as codec;

#[doc(inline)]
pub use satchel_crypto as crypto;

#[doc(inline)]
pub use satchel_primitives as primitives;

#[doc(inline)]
pub use satchel_services as services;

#[doc(inline)]
pub use satchel_storage as storage;

#[doc(inline)]
pub use satchel_txbuilder as txbuilder;

#[doc(inline)]
pub use satchel_wallet as wallet;

/// The most common entry points, one `use` away.
pub mod prelude {
    pub use satchel_codec::envelope::*;
    pub use satchel_crypto::{KeyDeriver, RootKey};
    pub use satchel_services::{Chain, ChainServices, Interrupt, ServiceConfig, Services};
    pub use satchel_storage::StorageProvider;
    pub use satchel_wallet::{Wallet, WalletError};
}
