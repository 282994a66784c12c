mod hash;
mod hasher;

pub use hash::Hash;
pub use hasher::{hash160, hmac_sha256, sha256, sha256d, Hasher};
