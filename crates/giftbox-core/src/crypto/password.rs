//! Password hashing and verification.
//!
//! User passwords are hashed with Argon2id under a fresh random salt
//! (independent of the envelope's fixed KDF salt). Verification never
//! fails with an error: malformed stored material simply verifies as
//! `false`. Digest comparison is constant-time with respect to the
//! stored digest, so a mismatch cannot be located by timing.

use argon2::Argon2;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::{GiftboxError, Result};

/// Argon2id parameters for password hashing (OWASP baseline:
/// 19 MiB memory, 2 iterations, parallelism 1).
const ARGON2_MEMORY_KB: u32 = 19 * 1024;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// Length of the random per-password salt in bytes.
const SALT_LENGTH: usize = 16;

/// Length of the password digest in bytes.
const DIGEST_LENGTH: usize = 32;

/// A freshly hashed password: hex-encoded salt and digest, ready to be
/// stored on a [`crate::document::User`] record.
#[derive(Debug, Clone)]
pub struct HashedPassword {
    pub salt: String,
    pub digest: String,
}

fn digest_with_salt(password: &str, salt: &[u8]) -> Result<[u8; DIGEST_LENGTH]> {
    let params = argon2::Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(DIGEST_LENGTH),
    )
    .map_err(|e| GiftboxError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut digest = [0u8; DIGEST_LENGTH];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut digest)
        .map_err(|e| GiftboxError::Crypto(format!("Password hashing failed: {}", e)))?;

    Ok(digest)
}

/// Hash a password under a fresh random salt.
///
/// # Errors
///
/// Returns `GiftboxError::Validation` if the password is empty.
pub fn hash_password(password: &str) -> Result<HashedPassword> {
    if password.is_empty() {
        return Err(GiftboxError::Validation(
            "Password cannot be empty".to_string(),
        ));
    }

    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);

    let digest = digest_with_salt(password, &salt)?;

    Ok(HashedPassword {
        salt: hex::encode(salt),
        digest: hex::encode(digest),
    })
}

/// Check a password against a stored hex salt and hex digest.
///
/// Returns `false` (never an error) when the stored salt or digest is
/// missing, not valid hex, or the wrong length -- a restored user record
/// without credentials simply cannot authenticate.
pub fn verify_password(password: &str, salt_hex: &str, digest_hex: &str) -> bool {
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(stored) = hex::decode(digest_hex) else {
        return false;
    };
    if salt.len() < SALT_LENGTH || stored.len() != DIGEST_LENGTH {
        return false;
    }

    let Ok(computed) = digest_with_salt(password, &salt) else {
        return false;
    };

    computed.ct_eq(stored.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify_round_trip() {
        let hashed = hash_password("correct horse battery staple").unwrap();

        assert!(verify_password(
            "correct horse battery staple",
            &hashed.salt,
            &hashed.digest
        ));
        assert!(!verify_password("wrong password", &hashed.salt, &hashed.digest));
    }

    #[test]
    fn test_fresh_salt_per_hash() {
        let first = hash_password("same password").unwrap();
        let second = hash_password("same password").unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.digest, second.digest);
    }

    #[test]
    fn test_empty_password_rejected() {
        let result = hash_password("");
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_material_verifies_false() {
        // Not hex, empty, wrong lengths: all false, never a panic/error
        assert!(!verify_password("password", "", ""));
        assert!(!verify_password("password", "zzzz", "zzzz"));
        assert!(!verify_password("password", "abcd", "abcd"));

        let hashed = hash_password("password").unwrap();
        assert!(!verify_password("password", &hashed.salt, "deadbeef"));
        assert!(!verify_password("password", "deadbeef", &hashed.digest));
    }

    #[test]
    fn test_salt_and_digest_are_hex() {
        let hashed = hash_password("password").unwrap();

        assert_eq!(hex::decode(&hashed.salt).unwrap().len(), SALT_LENGTH);
        assert_eq!(hex::decode(&hashed.digest).unwrap().len(), DIGEST_LENGTH);
    }
}
