//! Password hashing, random id generation and constant-time comparison.
//!
//! Hashes are hex HMAC-SHA256 digests keyed by `auth.hashing_secret`, so a
//! changed secret invalidates every stored password.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Length of generated token and check ids.
pub const ID_LEN: usize = 20;

/// Alphabet for generated ids. Note there is no `v`; existing ids were
/// minted from this exact set.
const ID_ALPHABET: &[u8] = b"abcdefghijkmnlopqrstuwxyz1234567890";

/// Hex HMAC-SHA256 of `password` keyed by `secret`.
/// Returns `None` for an empty password.
pub fn hash_password(secret: &str, password: &str) -> Option<String> {
    if password.is_empty() {
        return None;
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(password.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Random string of `len` characters from the id alphabet.
pub fn create_random_string(len: usize) -> String {
    (0..len)
        .map(|_| char::from(ID_ALPHABET[rand::random_range(0..ID_ALPHABET.len())]))
        .collect()
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
