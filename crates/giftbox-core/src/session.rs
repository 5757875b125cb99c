//! Session issuance, resolution, and cleanup.
//!
//! Tokens are 32 random bytes, hex-encoded, presented as opaque bearer
//! credentials. Sessions expire a fixed 7 days after issuance; expired
//! sessions become inert immediately but are only removed by an explicit
//! cleanup sweep. There is deliberately no single-session revocation:
//! logout happens on the client by discarding the token.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::document::{Document, Session};

/// Fixed session lifetime.
pub const SESSION_TTL_DAYS: i64 = 7;

/// Random bytes per token (hex-encoded to twice this length).
const TOKEN_BYTES: usize = 32;

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issue a new session for `user_id` and append it to the document.
///
/// The caller persists the document afterwards.
pub fn issue(doc: &mut Document, user_id: Uuid, now: DateTime<Utc>) -> String {
    let token = generate_token();
    doc.sessions.push(Session {
        token: token.clone(),
        user_id,
        expires_at: now + Duration::days(SESSION_TTL_DAYS),
    });
    token
}

/// Find the unexpired session matching `token`, if any.
///
/// A linear scan on exact string match; uniqueness of 256-bit random
/// tokens makes collisions a non-concern at this scale.
pub fn resolve<'a>(doc: &'a Document, token: &str, now: DateTime<Utc>) -> Option<&'a Session> {
    doc.sessions
        .iter()
        .find(|s| s.token == token && s.is_valid_at(now))
}

/// Remove every expired session, returning how many were dropped.
///
/// The caller persists the document afterwards.
pub fn cleanup(doc: &mut Document, now: DateTime<Utc>) -> usize {
    let before = doc.sessions.len();
    doc.sessions.retain(|s| s.is_valid_at(now));
    before - doc.sessions.len()
}
