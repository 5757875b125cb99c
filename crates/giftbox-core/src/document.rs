//! Core data model: the persisted document and its boundary views.
//!
//! The document is the single aggregate root persisted by the store. It
//! always serializes to the canonical `{ users, gifts, sessions }` JSON
//! form with all three arrays present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The persisted aggregate root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Registered users, in registration order.
    #[serde(default)]
    pub users: Vec<User>,

    /// Claimable gifts, in creation order.
    #[serde(default)]
    pub gifts: Vec<Gift>,

    /// Issued sessions, in issuance order. Expired sessions are inert
    /// but linger until an explicit cleanup.
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl Document {
    pub fn user_by_id(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Phone lookup is a case-sensitive exact match; uniqueness is
    /// enforced at registration so the first hit is the only hit.
    pub fn user_by_phone(&self, phone: &str) -> Option<&User> {
        self.users.iter().find(|u| u.phone == phone)
    }

    pub fn gift_by_id(&self, id: Uuid) -> Option<&Gift> {
        self.gifts.iter().find(|g| g.id == id)
    }

    pub fn gift_by_id_mut(&mut self, id: Uuid) -> Option<&mut Gift> {
        self.gifts.iter_mut().find(|g| g.id == id)
    }
}

/// Identity record.
///
/// The password fields default to empty strings so documents restored
/// from a backup without credential material still deserialize; those
/// users can never authenticate (verification of empty material is
/// always false) and the store does not fabricate credentials for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,

    /// Login key; unique across the document, case-sensitive.
    pub phone: String,

    /// Hex-encoded random salt for the password digest.
    #[serde(default)]
    pub password_salt: String,

    /// Hex-encoded Argon2id password digest.
    #[serde(default)]
    pub password_hash: String,

    /// Set true only for the very first registered user; never revocable
    /// through the public API.
    #[serde(default)]
    pub is_admin: bool,

    pub created_at: DateTime<Utc>,
}

/// Claimable reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gift {
    pub id: Uuid,

    /// Open tag set ("link", "text", "qr", ...). Treated as an opaque
    /// string; unknown values pass through untouched.
    pub kind: String,

    /// The reward itself (URL, message, QR payload). Disclosed only per
    /// the content-visibility rule.
    pub content: String,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,

    /// Everyone who has claimed this gift. Set semantics: a user id
    /// appears at most once; order carries no meaning.
    #[serde(default)]
    pub claimed_by: Vec<Uuid>,
}

impl Gift {
    pub fn is_claimed_by(&self, user_id: Uuid) -> bool {
        self.claimed_by.contains(&user_id)
    }
}

/// Authorization grant: an opaque bearer token with an absolute expiry.
///
/// Valid only while `now < expires_at`. There is no early revocation of
/// an individual session; logout is a client-side concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// User record as it crosses the system boundary: no password material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserView {
    pub id: Uuid,
    pub phone: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            phone: user.phone.clone(),
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

/// Visibility-filtered gift as returned by listings.
///
/// `content` and the full claimant list appear only when the viewer is
/// an admin or has claimed the gift; everyone else sees the claim count
/// alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftView {
    pub id: Uuid,
    pub kind: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub claim_count: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<Vec<Uuid>>,
}

impl GiftView {
    /// Apply the content-visibility rule for one viewer.
    ///
    /// Derived per viewer per request; nothing is cached on the gift.
    pub fn for_viewer(gift: &Gift, viewer: Option<&User>) -> Self {
        let disclosed = viewer
            .map(|u| u.is_admin || gift.is_claimed_by(u.id))
            .unwrap_or(false);

        Self {
            id: gift.id,
            kind: gift.kind.clone(),
            created_by: gift.created_by,
            created_at: gift.created_at,
            claim_count: gift.claimed_by.len(),
            content: disclosed.then(|| gift.content.clone()),
            claimed_by: disclosed.then(|| gift.claimed_by.clone()),
        }
    }
}

/// Document with password material stripped from every user, as served
/// by the admin decrypted-download operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedDocument {
    pub users: Vec<UserView>,
    pub gifts: Vec<Gift>,
    pub sessions: Vec<Session>,
}

impl From<&Document> for SanitizedDocument {
    fn from(doc: &Document) -> Self {
        Self {
            users: doc.users.iter().map(UserView::from).collect(),
            gifts: doc.gifts.clone(),
            sessions: doc.sessions.clone(),
        }
    }
}

/// Result of a successful register or login.
#[derive(Debug, Clone, Serialize)]
pub struct AuthGrant {
    pub user: UserView,
    pub token: String,
}

/// Result of a claim. `already_claimed` marks the idempotent repeat
/// case: the caller had already claimed this gift, so the content is
/// returned again without touching the document.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub content: String,
    pub already_claimed: bool,
}

/// Counts reported after a wholesale document restore.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RestoreStats {
    pub users: usize,
    pub gifts: usize,
    pub sessions: usize,
}

/// Counts reported after a session sweep.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CleanupStats {
    pub removed: usize,
    pub remaining: usize,
}
