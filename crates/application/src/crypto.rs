//! Shared token-generation and hashing helpers.
//!
//! Refresh tokens, password-reset tokens, API keys, and MFA recovery codes
//! are all random secrets that get hashed before storage so a database
//! leak does not hand out usable bearer credentials directly.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Generates a cryptographically random token, hex-encoded.
///
/// `byte_len` is the number of random bytes before encoding; the returned
/// string is twice that length.
#[must_use]
pub fn generate_token(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    // An OS RNG failure must never degrade to predictable secrets.
    getrandom::fill(&mut bytes).unwrap_or_else(|error| panic!("system RNG unavailable: {error}"));
    bytes_to_hex(&bytes)
}

/// Hashes a raw token value with SHA-256, returning the lowercase hex
/// digest used as the at-rest representation.
#[must_use]
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Compares two byte strings in time independent of where they first
/// differ, so timing cannot leak how much of a guess was correct. Used
/// for every secret-bearing comparison: token hashes, TOTP codes.
#[must_use]
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

fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
        let _ = write!(acc, "{byte:02x}");
        acc
    })
}
