//! Authenticated encryption envelope.
//!
//! The on-disk container is the concatenation `nonce || tag || ciphertext`
//! with fixed-length nonce and tag, so the format is self-describing
//! without a length prefix. XChaCha20-Poly1305 provides the AEAD; the
//! detached-tag API lets us place the tag ahead of the ciphertext as the
//! format requires.
//!
//! Any single-bit corruption of nonce, tag, or ciphertext fails
//! authentication and surfaces as `GiftboxError::Integrity` -- a tampered
//! envelope is never decrypted into garbage.

use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{Key, KeyInit, Tag, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::key::DerivedKey;
use crate::error::{GiftboxError, Result};

/// XChaCha20-Poly1305 nonce length in bytes.
pub const NONCE_LENGTH: usize = 24;

/// Poly1305 authentication tag length in bytes.
pub const TAG_LENGTH: usize = 16;

/// Minimum length of a well-formed envelope (empty ciphertext).
pub const HEADER_LENGTH: usize = NONCE_LENGTH + TAG_LENGTH;

/// Encrypt a plaintext payload into an envelope.
///
/// Draws a fresh random nonce per call, so sealing the same plaintext
/// twice yields different envelopes.
///
/// # Errors
///
/// Returns `GiftboxError::Crypto` if the cipher rejects the input.
pub fn seal(plaintext: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(XNonce::from_slice(&nonce), b"", &mut buffer)
        .map_err(|_| GiftboxError::Crypto("Encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(HEADER_LENGTH + buffer.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&tag);
    envelope.extend_from_slice(&buffer);
    Ok(envelope)
}

/// Decrypt an envelope back into its plaintext payload.
///
/// # Errors
///
/// Returns `GiftboxError::Integrity` if the envelope is shorter than
/// `nonce || tag` or the authentication tag does not verify (wrong key,
/// or any corruption of nonce, tag, or ciphertext).
pub fn open(envelope: &[u8], key: &DerivedKey) -> Result<Vec<u8>> {
    if envelope.len() < HEADER_LENGTH {
        return Err(GiftboxError::Integrity(format!(
            "Envelope too short: {} bytes (minimum {})",
            envelope.len(),
            HEADER_LENGTH
        )));
    }

    let (nonce, rest) = envelope.split_at(NONCE_LENGTH);
    let (tag, ciphertext) = rest.split_at(TAG_LENGTH);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            XNonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(tag),
        )
        .map_err(|_| {
            GiftboxError::Integrity("Authentication tag verification failed".to_string())
        })?;

    Ok(buffer)
}
