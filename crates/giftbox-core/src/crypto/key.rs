//! Key derivation using Argon2id.
//!
//! The store passphrase is stretched into a fixed-length symmetric key
//! with Argon2id, which is memory-hard and resistant to GPU-based attacks.

use argon2::Argon2;
use zeroize::ZeroizeOnDrop;

use crate::error::{GiftboxError, Result};

/// Argon2id parameters for envelope key derivation.
///
/// These values balance security and usability:
/// - Memory: 64 MB (64 * 1024 KB)
/// - Iterations: 3
/// - Parallelism: 1 (single-threaded for simplicity)
const ARGON2_MEMORY_KB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;

/// Length of derived key in bytes (32 bytes = 256 bits for XChaCha20-Poly1305).
pub const KEY_LENGTH: usize = 32;

/// Fixed salt used when no per-installation salt is supplied.
///
/// WARNING: with this salt the same passphrase derives the same key on
/// every installation. This matches the legacy on-disk format and is a
/// known structural weakness; integrators who do not need to read legacy
/// envelopes should call [`derive_key_with_salt`] with a random,
/// per-installation salt stored alongside the envelope file.
pub const FIXED_KDF_SALT: &[u8; 16] = b"giftbox.envelope";

/// A symmetric key derived from a passphrase.
///
/// Key material is zeroized from memory when dropped, reducing the
/// window of exposure.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// Avoid storing or logging this value. Use only for immediate
    /// encryption operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the envelope encryption key from a passphrase.
///
/// Uses the fixed, well-known salt ([`FIXED_KDF_SALT`]) so the result is
/// stable across installations; see the salt's docs for the trade-off.
///
/// # Errors
///
/// Returns `GiftboxError::Validation` if the passphrase is empty.
pub fn derive_key(passphrase: &str) -> Result<DerivedKey> {
    derive_key_with_salt(passphrase, FIXED_KDF_SALT)
}

/// Derive an envelope encryption key from a passphrase and an explicit salt.
///
/// Same passphrase + salt always produces the same key; the salt must be
/// at least 16 bytes.
pub fn derive_key_with_salt(passphrase: &str, salt: &[u8]) -> Result<DerivedKey> {
    if passphrase.is_empty() {
        return Err(GiftboxError::Validation(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if salt.len() < 16 {
        return Err(GiftboxError::Validation(
            "Salt must be at least 16 bytes".to_string(),
        ));
    }

    let params = argon2::Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| GiftboxError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| GiftboxError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(DerivedKey::from_bytes(key_bytes))
}
