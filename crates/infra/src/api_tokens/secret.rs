//! Token material: generation, hashing, display prefix.
//!
//! Tokens are `wdn_` followed by 64 hex characters (32 bytes from the OS
//! CSPRNG). Only the SHA-256 of the full plaintext is stored.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

pub const TOKEN_MARKER: &str = "wdn_";
pub const TOKEN_BYTES: usize = 32;
pub const PREFIX_LEN: usize = 12;

pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{TOKEN_MARKER}{}", hex::encode(bytes))
}

/// Lowercase hex SHA-256; always 64 characters.
pub fn hash(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn display_prefix(plaintext: &str) -> String {
    plaintext.chars().take(PREFIX_LEN).collect()
}

/// Cheap shape check run before any store lookup.
pub fn looks_like_token(candidate: &str) -> bool {
    candidate
        .strip_prefix(TOKEN_MARKER)
        .is_some_and(|rest| rest.len() == TOKEN_BYTES * 2 && rest.bytes().all(|b| b.is_ascii_hexdigit()))
}
