use crate::hash::Hash;
use cryptoxide::digest::Digest as _;
use cryptoxide::hmac::Hmac;
use cryptoxide::mac::Mac as _;
use cryptoxide::sha2::Sha256;

/// Incremental SHA-256.
///
/// ```
/// # use satchel_crypto::hash::Hasher;
/// let mut hasher = Hasher::new();
/// hasher.input(b"hello");
/// hasher.input(b" world");
/// let digest = hasher.finalize();
/// # assert_eq!(
/// #   "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
/// #   hex::encode(digest)
/// # );
/// ```
pub struct Hasher(Sha256);

impl Hasher {
    #[inline]
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    #[inline]
    pub fn input(&mut self, bytes: &[u8]) {
        self.0.input(bytes);
    }

    pub fn finalize(mut self) -> Hash<32> {
        let mut digest = [0; 32];
        self.0.result(&mut digest);
        Hash::new(digest)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of `bytes`.
#[inline]
pub fn sha256(bytes: &[u8]) -> Hash<32> {
    let mut hasher = Hasher::new();
    hasher.input(bytes);
    hasher.finalize()
}

/// Double SHA-256, the digest behind txids and sighashes.
#[inline]
pub fn sha256d(bytes: &[u8]) -> Hash<32> {
    sha256(sha256(bytes).as_ref())
}

/// RIPEMD-160 of SHA-256, the digest inside P2PKH locking scripts.
pub fn hash160(bytes: &[u8]) -> Hash<20> {
    use ripemd::{Digest as _, Ripemd160};
    let inner = sha256(bytes);
    let digest: [u8; 20] = Ripemd160::digest(inner.as_ref()).into();
    Hash::new(digest)
}

/// HMAC-SHA-256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Hash<32> {
    let mut mac = Hmac::new(Sha256::new(), key);
    mac.input(data);
    let mut digest = [0; 32];
    mac.raw_result(&mut digest);
    Hash::new(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_empty_vector() {
        assert_eq!(
            sha256(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256d_header_style() {
        // sha256d("hello") from the bitcoin wiki worked example.
        assert_eq!(
            sha256d(b"hello").to_string(),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn hash160_known_key() {
        // hash160 of the generator point compressed encoding.
        let g = hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
            .unwrap();
        assert_eq!(
            hash160(&g).to_string(),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn hmac_rfc4231_case_2() {
        let tag = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            tag.to_string(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
