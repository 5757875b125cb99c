//! Cryptographic operations for giftbox.
//!
//! - **key**: Argon2id stretching of the store passphrase into the
//!   envelope key (fixed salt by default, see module docs).
//! - **envelope**: XChaCha20-Poly1305 authenticated encryption of the
//!   serialized document (`nonce || tag || ciphertext` on disk).
//! - **password**: Argon2id user-password hashing with random salts and
//!   constant-time verification.
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the encrypted store file
//! - Offline brute-force attacks on the passphrase
//! - Tampering with the store file (detected, never silently decrypted)
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - Access to the running process's memory

pub mod envelope;
pub mod key;
pub mod password;

pub use envelope::{open, seal};
pub use key::{derive_key, derive_key_with_salt, DerivedKey};
pub use password::{hash_password, verify_password, HashedPassword};
