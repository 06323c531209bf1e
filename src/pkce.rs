use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::state::random_alphanumeric;

/// Length of a generated code verifier. RFC 7636 allows 43..=128.
pub const CODE_VERIFIER_LENGTH: usize = 96;

/// The only challenge method this crate emits.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Generate a random code verifier of [`CODE_VERIFIER_LENGTH`] characters,
/// drawn from `[A-Za-z0-9]` (a subset of the RFC 7636 unreserved set).
pub fn generate_code_verifier() -> String {
    random_alphanumeric(CODE_VERIFIER_LENGTH)
}

/// Derive the S256 code challenge from a verifier:
/// SHA-256 hash of the verifier, base64url-encoded without padding.
pub fn create_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
