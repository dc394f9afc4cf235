//! Access-token secret generation and hashing.
//!
//! Secrets are 256-bit random values, handed to the caller exactly once at
//! activation time. Only the SHA-256 hex digest is stored; lookups hash the
//! presented secret and re-check the stored digest with a constant-time
//! comparison.

use base64::{Engine as _, engine::general_purpose};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix for access-token secrets
pub const SECRET_PREFIX: &str = "mct-";

/// Generates a cryptographically secure access-token secret with 256 bits of entropy.
///
/// The secret is formatted as `mct-{base64url_encoded_random_bytes}` where the
/// random bytes are 32 bytes of cryptographically secure random data.
pub fn generate_token_secret() -> String {
    let mut secret_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut secret_bytes);

    format!("{}{}", SECRET_PREFIX, general_purpose::URL_SAFE_NO_PAD.encode(secret_bytes))
}

/// One-way hash of a token secret, hex encoded. This is the only form in
/// which secrets are persisted.
pub fn hash_token_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
