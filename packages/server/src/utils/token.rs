//! One-time tokens for email confirmation and password reset.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a 32-byte random token, hex encoded (URL safe as-is).
pub fn generate() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 digest of a token, as stored in `user_token.token_hash`.
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Percent-encode a value for use in an emailed link's query string.
pub fn encode_query_value(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
