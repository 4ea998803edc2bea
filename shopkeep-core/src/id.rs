//! Prefixed identifier generation
//!
//! IDs look like `usr_q0V1o7b5Vt3bGQ2f`: a short type prefix, an underscore and at least
//! 96 bits of URL-safe base64 randomness.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::RngCore;

const MIN_ENTROPY_BYTES: usize = 12;

/// Generate a prefixed ID with 96 bits of entropy.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; MIN_ENTROPY_BYTES];
    rand::rng().fill_bytes(&mut bytes);

    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);

    format!("{prefix}_{encoded}")
}

/// Validate that a prefixed ID has the expected prefix and enough encoded entropy.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= MIN_ENTROPY_BYTES,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prefixed_id() {
        let id = generate_prefixed_id("usr");
        assert!(id.starts_with("usr_"));
        assert!(validate_prefixed_id(&id, "usr"));
    }

    #[test]
    fn test_ids_are_unique() {
        let a = generate_prefixed_id("usr");
        let b = generate_prefixed_id("usr");
        assert_ne!(a, b);
    }

    #[test]
    fn test_validate_rejects_wrong_prefix_and_short_ids() {
        let id = generate_prefixed_id("usr");
        assert!(!validate_prefixed_id(&id, "ses"));
        assert!(!validate_prefixed_id("usr_abc", "usr"));
        assert!(!validate_prefixed_id("usrabcdefghijklmnop", "usr"));
        assert!(!validate_prefixed_id("usr_!!!!!!!!!!!!!!!!", "usr"));
    }
}
