//! # Giftbox Core
//!
//! Core library for giftbox - an encrypted, single-file gift-claiming
//! document store with bearer-token sessions.
//!
//! This crate provides the storage, crypto, and authorization logic
//! independent of any request-handling layer.
//!
//! ## Architecture
//!
//! - **crypto**: envelope encryption, key derivation, password hashing
//! - **document**: the persisted data model and its boundary views
//! - **store**: the mutex-guarded document store and all operations
//! - **session**: bearer-token issuance, resolution, and cleanup
//! - **auth**: the authenticated-user and admin gates
//!
//! ## Persistence model
//!
//! The whole document lives in memory and is re-encrypted and atomically
//! rewritten to a single file after every mutation. The on-disk format
//! is `nonce || tag || ciphertext`; the plaintext is the canonical JSON
//! document `{ users, gifts, sessions }`.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod document;
pub mod error;
pub mod fs;
pub mod session;
pub mod store;

pub use document::{
    AuthGrant, ClaimOutcome, CleanupStats, Document, Gift, GiftView, RestoreStats,
    SanitizedDocument, Session, User, UserView,
};
pub use error::{GiftboxError, Result};
pub use store::GiftStore;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
