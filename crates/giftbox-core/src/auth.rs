//! Access control predicates.
//!
//! Two gates, consumed by the request-handling layer:
//! - `authenticate`: token resolves to a live session whose user exists.
//! - `authorize_admin`: as above, plus the user's admin flag.
//!
//! There is no resource-level permission model beyond these and the
//! gift content-visibility rule.

use chrono::{DateTime, Utc};

use crate::document::{Document, User};
use crate::error::{GiftboxError, Result};
use crate::session;

/// Resolve a bearer token to its user.
///
/// # Errors
///
/// Returns `GiftboxError::Unauthorized` if the token is missing,
/// unknown, expired, or its session points at a user that no longer
/// exists (possible after a restore).
pub fn authenticate<'a>(
    doc: &'a Document,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<&'a User> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GiftboxError::Unauthorized("Missing bearer token".to_string()))?;

    let session = session::resolve(doc, token, now)
        .ok_or_else(|| GiftboxError::Unauthorized("Invalid or expired token".to_string()))?;

    doc.user_by_id(session.user_id)
        .ok_or_else(|| GiftboxError::Unauthorized("Session user no longer exists".to_string()))
}

/// Resolve a bearer token to its user and require the admin flag.
///
/// # Errors
///
/// Returns `GiftboxError::Unauthorized` as [`authenticate`] does, or
/// `GiftboxError::Forbidden` for an authenticated non-admin.
pub fn authorize_admin<'a>(
    doc: &'a Document,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<&'a User> {
    let user = authenticate(doc, token, now)?;
    if !user.is_admin {
        return Err(GiftboxError::Forbidden("Admin access required".to_string()));
    }
    Ok(user)
}
