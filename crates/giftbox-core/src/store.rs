//! Encrypted gift store.
//!
//! [`GiftStore`] exclusively owns the in-memory [`Document`] and persists
//! it through the cipher envelope after every mutation. All operations
//! run their read-mutate-persist sequence inside one mutex, so no two
//! mutations can interleave and drop an update.
//!
//! Persistence failures after a mutation are logged and swallowed: the
//! in-memory document stays authoritative for the life of the process,
//! though it will not survive a restart if the write never lands.
//!
//! A store file that fails authentication at startup is abandoned and
//! replaced with a freshly persisted empty document. This keeps the
//! service bootable at the cost of silent data loss on a corrupt or
//! re-keyed file; operators who care about the old contents should copy
//! the file aside before first start with a new passphrase.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth;
use crate::crypto::key::DerivedKey;
use crate::crypto::{self, envelope};
use crate::document::{
    AuthGrant, ClaimOutcome, CleanupStats, Document, Gift, GiftView, RestoreStats,
    SanitizedDocument, User, UserView,
};
use crate::error::{GiftboxError, Result};
use crate::fs as atomic_fs;
use crate::session;

/// The authenticated-encryption-backed document store.
pub struct GiftStore {
    path: PathBuf,
    key: DerivedKey,
    doc: Mutex<Document>,
}

impl GiftStore {
    /// Open (or initialize) the store at `path`.
    ///
    /// - No file yet: starts with an empty document and persists it
    ///   immediately.
    /// - File present but unauthenticable or malformed: logs a warning,
    ///   falls back to an empty document, and persists that (see module
    ///   docs for the data-loss caveat).
    ///
    /// # Errors
    ///
    /// Returns `GiftboxError::Validation` for an empty passphrase, or an
    /// I/O error if the file cannot be read or the initial persist fails.
    pub fn open(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self> {
        let path = path.into();
        let key = crypto::derive_key(passphrase)?;

        let doc = match fs::read(&path) {
            Ok(bytes) => match Self::decode(&bytes, &key) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Store file unreadable; falling back to an empty document"
                    );
                    let doc = Document::default();
                    Self::persist(&path, &key, &doc)?;
                    doc
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No store file; initializing empty document");
                let doc = Document::default();
                Self::persist(&path, &key, &doc)?;
                doc
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            key,
            doc: Mutex::new(doc),
        })
    }

    fn decode(bytes: &[u8], key: &DerivedKey) -> Result<Document> {
        let plaintext = envelope::open(bytes, key)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// Serialize, seal, and atomically swap the file on disk.
    fn persist(path: &Path, key: &DerivedKey, doc: &Document) -> Result<()> {
        let plaintext = serde_json::to_vec(doc)?;
        let sealed = envelope::seal(&plaintext, key)?;
        atomic_fs::write_atomic(path, &sealed)?;
        Ok(())
    }

    /// Persist after a mutation; failures are logged, not propagated.
    fn persist_logged(&self, doc: &Document) {
        if let Err(e) = Self::persist(&self.path, &self.key, doc) {
            error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist document; in-memory state remains authoritative"
            );
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Document> {
        // A panicked holder has already completed or abandoned its
        // mutation; the document itself is still structurally sound.
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new user and issue a session.
    ///
    /// The very first user ever registered into an empty document
    /// becomes the admin; the flag is explicit, not positional, and is
    /// never granted again through this path.
    ///
    /// # Errors
    ///
    /// Returns `GiftboxError::Validation` for missing fields or an
    /// already-registered phone number.
    pub fn register(&self, phone: &str, password: &str) -> Result<AuthGrant> {
        if phone.is_empty() {
            return Err(GiftboxError::Validation(
                "Phone number cannot be empty".to_string(),
            ));
        }

        let hashed = crypto::hash_password(password)?;

        let mut doc = self.lock();
        if doc.user_by_phone(phone).is_some() {
            return Err(GiftboxError::Validation(
                "Phone number already registered".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            password_salt: hashed.salt,
            password_hash: hashed.digest,
            is_admin: doc.users.is_empty(),
            created_at: now,
        };
        let view = UserView::from(&user);
        doc.users.push(user);

        let token = session::issue(&mut doc, view.id, now);
        self.persist_logged(&doc);

        Ok(AuthGrant { user: view, token })
    }

    /// Authenticate by phone and password and issue a session.
    ///
    /// # Errors
    ///
    /// Returns `GiftboxError::Validation` with a single undifferentiated
    /// message for an unknown phone or a wrong password.
    pub fn login(&self, phone: &str, password: &str) -> Result<AuthGrant> {
        let mut doc = self.lock();

        let view = match doc.user_by_phone(phone) {
            Some(user)
                if crypto::verify_password(
                    password,
                    &user.password_salt,
                    &user.password_hash,
                ) =>
            {
                UserView::from(user)
            }
            _ => {
                return Err(GiftboxError::Validation(
                    "Invalid phone or password".to_string(),
                ))
            }
        };

        let token = session::issue(&mut doc, view.id, Utc::now());
        self.persist_logged(&doc);

        Ok(AuthGrant { user: view, token })
    }

    /// Resolve a bearer token to its (sanitized) user.
    pub fn authenticate(&self, token: Option<&str>) -> Result<UserView> {
        let doc = self.lock();
        auth::authenticate(&doc, token, Utc::now()).map(UserView::from)
    }

    /// Create a gift. Admin only.
    ///
    /// `kind` is an open tag ("link", "text", "qr", or anything else);
    /// it is stored and served verbatim.
    pub fn create_gift(&self, token: Option<&str>, kind: &str, content: &str) -> Result<Gift> {
        let mut doc = self.lock();
        let creator = auth::authorize_admin(&doc, token, Utc::now())?.id;

        if kind.is_empty() || content.is_empty() {
            return Err(GiftboxError::Validation(
                "Gift kind and content are required".to_string(),
            ));
        }

        let gift = Gift {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            content: content.to_string(),
            created_by: creator,
            created_at: Utc::now(),
            claimed_by: Vec::new(),
        };
        doc.gifts.push(gift.clone());
        self.persist_logged(&doc);

        Ok(gift)
    }

    /// List all gifts through the content-visibility rule.
    ///
    /// The token is optional; an absent or unresolvable token yields the
    /// anonymous view (no content, claim counts only). Visibility is
    /// re-derived for this viewer on every call.
    pub fn list_gifts(&self, token: Option<&str>) -> Result<Vec<GiftView>> {
        let doc = self.lock();
        let viewer = token.and_then(|t| auth::authenticate(&doc, Some(t), Utc::now()).ok());

        Ok(doc
            .gifts
            .iter()
            .map(|gift| GiftView::for_viewer(gift, viewer))
            .collect())
    }

    /// Claim a gift for the authenticated user.
    ///
    /// The caller re-supplies phone and password; the phone must match
    /// the authenticated user's own record, and the password must verify
    /// against it. A repeat claim is not an error: the content is
    /// returned again and the claimant set is left untouched.
    ///
    /// # Errors
    ///
    /// - `Unauthorized`: bad token.
    /// - `Forbidden`: phone does not match the authenticated user.
    /// - `Validation`: password does not verify.
    /// - `NotFound`: no such gift.
    pub fn claim_gift(
        &self,
        token: Option<&str>,
        gift_id: Uuid,
        phone: &str,
        password: &str,
    ) -> Result<ClaimOutcome> {
        let mut doc = self.lock();

        let user = auth::authenticate(&doc, token, Utc::now())?;
        if user.phone != phone {
            return Err(GiftboxError::Forbidden(
                "Phone does not match the authenticated user".to_string(),
            ));
        }
        if !crypto::verify_password(password, &user.password_salt, &user.password_hash) {
            return Err(GiftboxError::Validation(
                "Invalid credentials".to_string(),
            ));
        }
        let user_id = user.id;

        let gift = doc
            .gift_by_id_mut(gift_id)
            .ok_or_else(|| GiftboxError::NotFound(format!("Gift {}", gift_id)))?;

        if gift.is_claimed_by(user_id) {
            return Ok(ClaimOutcome {
                content: gift.content.clone(),
                already_claimed: true,
            });
        }

        gift.claimed_by.push(user_id);
        let content = gift.content.clone();
        self.persist_logged(&doc);

        Ok(ClaimOutcome {
            content,
            already_claimed: false,
        })
    }

    /// Return the raw envelope bytes from disk. Admin only.
    ///
    /// # Errors
    ///
    /// Returns `GiftboxError::NotFound` if nothing has been persisted at
    /// the store path.
    pub fn download_encrypted(&self, token: Option<&str>) -> Result<Vec<u8>> {
        let doc = self.lock();
        auth::authorize_admin(&doc, token, Utc::now())?;

        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(GiftboxError::NotFound(
                "No encrypted store file has been persisted".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Return the document with password material stripped. Admin only;
    /// the admin's own password is re-verified before disclosure.
    ///
    /// # Errors
    ///
    /// Returns `GiftboxError::Forbidden` if the password does not verify.
    pub fn download_decrypted(
        &self,
        token: Option<&str>,
        password: &str,
    ) -> Result<SanitizedDocument> {
        let doc = self.lock();
        let admin = auth::authorize_admin(&doc, token, Utc::now())?;

        if !crypto::verify_password(password, &admin.password_salt, &admin.password_hash) {
            return Err(GiftboxError::Forbidden(
                "Password verification failed".to_string(),
            ));
        }

        Ok(SanitizedDocument::from(&*doc))
    }

    /// Replace the document wholesale from an untrusted JSON value and
    /// persist. Admin only; the admin's own password is re-verified.
    ///
    /// The check is structural only: the value must be an object with
    /// `users`, `gifts`, and `sessions` arrays that deserialize into the
    /// document model. No cross-field validation is performed, and user
    /// records without password material are accepted as-is -- those
    /// users simply can never log in again.
    ///
    /// # Errors
    ///
    /// - `Forbidden`: password does not verify.
    /// - `Validation`: structurally malformed document.
    pub fn restore(
        &self,
        token: Option<&str>,
        password: &str,
        raw: serde_json::Value,
    ) -> Result<RestoreStats> {
        let mut doc = self.lock();

        let admin = auth::authorize_admin(&doc, token, Utc::now())?;
        if !crypto::verify_password(password, &admin.password_salt, &admin.password_hash) {
            return Err(GiftboxError::Forbidden(
                "Password verification failed".to_string(),
            ));
        }

        let well_formed = raw
            .as_object()
            .map(|obj| {
                ["users", "gifts", "sessions"]
                    .iter()
                    .all(|key| obj.get(*key).map(|v| v.is_array()).unwrap_or(false))
            })
            .unwrap_or(false);
        if !well_formed {
            return Err(GiftboxError::Validation(
                "Document must be an object with users, gifts, and sessions arrays".to_string(),
            ));
        }

        let incoming: Document = serde_json::from_value(raw)
            .map_err(|e| GiftboxError::Validation(format!("Malformed document: {}", e)))?;

        let stats = RestoreStats {
            users: incoming.users.len(),
            gifts: incoming.gifts.len(),
            sessions: incoming.sessions.len(),
        };

        *doc = incoming;
        self.persist_logged(&doc);

        Ok(stats)
    }

    /// Sweep expired sessions. Admin only.
    pub fn cleanup_sessions(&self, token: Option<&str>) -> Result<CleanupStats> {
        let mut doc = self.lock();
        auth::authorize_admin(&doc, token, Utc::now())?;

        let removed = session::cleanup(&mut doc, Utc::now());
        self.persist_logged(&doc);

        Ok(CleanupStats {
            removed,
            remaining: doc.sessions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PASSPHRASE: &str = "unit-test-passphrase";

    fn open_store(dir: &tempfile::TempDir) -> GiftStore {
        GiftStore::open(dir.path().join("store.gift"), PASSPHRASE).unwrap()
    }

    #[test]
    fn test_first_run_persists_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.gift");

        let store = GiftStore::open(&path, PASSPHRASE).unwrap();
        assert!(path.exists());

        assert!(store.list_gifts(None).unwrap().is_empty());
    }

    #[test]
    fn test_first_user_is_admin_second_is_not() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let first = store.register("+15550000001", "password-one").unwrap();
        let second = store.register("+15550000002", "password-two").unwrap();

        assert!(first.user.is_admin);
        assert!(!second.user.is_admin);
    }

    #[test]
    fn test_duplicate_phone_rejected() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.register("+15550000001", "password-one").unwrap();
        let result = store.register("+15550000001", "password-two");

        assert!(matches!(result, Err(GiftboxError::Validation(_))));
    }

    #[test]
    fn test_register_requires_fields() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        assert!(matches!(
            store.register("", "password"),
            Err(GiftboxError::Validation(_))
        ));
        assert!(matches!(
            store.register("+15550000001", ""),
            Err(GiftboxError::Validation(_))
        ));
    }

    #[test]
    fn test_login_round_trip() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.register("+15550000001", "password-one").unwrap();
        let grant = store.login("+15550000001", "password-one").unwrap();

        let me = store.authenticate(Some(&grant.token)).unwrap();
        assert_eq!(me.phone, "+15550000001");
    }

    #[test]
    fn test_login_wrong_credentials() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store.register("+15550000001", "password-one").unwrap();

        assert!(matches!(
            store.login("+15550000001", "wrong"),
            Err(GiftboxError::Validation(_))
        ));
        assert!(matches!(
            store.login("+15559999999", "password-one"),
            Err(GiftboxError::Validation(_))
        ));
    }

    #[test]
    fn test_create_gift_requires_admin() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let user = store.register("+15550000002", "password-two").unwrap();

        store
            .create_gift(Some(&admin.token), "link", "https://example.com")
            .unwrap();

        assert!(matches!(
            store.create_gift(Some(&user.token), "link", "https://example.com"),
            Err(GiftboxError::Forbidden(_))
        ));
        assert!(matches!(
            store.create_gift(None, "link", "https://example.com"),
            Err(GiftboxError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_claim_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let user = store.register("+15550000002", "password-two").unwrap();
        let gift = store
            .create_gift(Some(&admin.token), "text", "the secret word")
            .unwrap();

        let first = store
            .claim_gift(Some(&user.token), gift.id, "+15550000002", "password-two")
            .unwrap();
        let second = store
            .claim_gift(Some(&user.token), gift.id, "+15550000002", "password-two")
            .unwrap();

        assert_eq!(first.content, "the secret word");
        assert_eq!(second.content, "the secret word");
        assert!(!first.already_claimed);
        assert!(second.already_claimed);

        // Claimant recorded exactly once
        let views = store.list_gifts(Some(&admin.token)).unwrap();
        let claimed_by = views[0].claimed_by.as_ref().unwrap();
        assert_eq!(claimed_by.iter().filter(|id| **id == user.user.id).count(), 1);
    }

    #[test]
    fn test_claim_phone_mismatch_is_forbidden() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let user = store.register("+15550000002", "password-two").unwrap();
        let gift = store
            .create_gift(Some(&admin.token), "text", "secret")
            .unwrap();

        let result =
            store.claim_gift(Some(&user.token), gift.id, "+15550000001", "password-two");
        assert!(matches!(result, Err(GiftboxError::Forbidden(_))));
    }

    #[test]
    fn test_claim_bad_password_and_missing_gift() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let gift = store
            .create_gift(Some(&admin.token), "text", "secret")
            .unwrap();

        assert!(matches!(
            store.claim_gift(Some(&admin.token), gift.id, "+15550000001", "wrong"),
            Err(GiftboxError::Validation(_))
        ));
        assert!(matches!(
            store.claim_gift(
                Some(&admin.token),
                Uuid::new_v4(),
                "+15550000001",
                "password-one"
            ),
            Err(GiftboxError::NotFound(_))
        ));
    }

    #[test]
    fn test_visibility_per_viewer() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let claimant = store.register("+15550000002", "password-two").unwrap();
        let bystander = store.register("+15550000003", "password-three").unwrap();
        let gift = store
            .create_gift(Some(&admin.token), "link", "https://example.com/prize")
            .unwrap();
        store
            .claim_gift(
                Some(&claimant.token),
                gift.id,
                "+15550000002",
                "password-two",
            )
            .unwrap();

        let admin_view = &store.list_gifts(Some(&admin.token)).unwrap()[0];
        assert!(admin_view.content.is_some());
        assert!(admin_view.claimed_by.is_some());

        let claimant_view = &store.list_gifts(Some(&claimant.token)).unwrap()[0];
        assert!(claimant_view.content.is_some());

        let bystander_view = &store.list_gifts(Some(&bystander.token)).unwrap()[0];
        assert!(bystander_view.content.is_none());
        assert!(bystander_view.claimed_by.is_none());
        assert_eq!(bystander_view.claim_count, 1);

        let anonymous_view = &store.list_gifts(None).unwrap()[0];
        assert!(anonymous_view.content.is_none());
    }

    #[test]
    fn test_download_decrypted_strips_secrets() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let user = store.register("+15550000002", "password-two").unwrap();

        let sanitized = store
            .download_decrypted(Some(&admin.token), "password-one")
            .unwrap();

        assert_eq!(sanitized.users.len(), 2);
        let rendered = serde_json::to_string(&sanitized).unwrap();
        assert!(!rendered.contains("password_hash"));
        assert!(!rendered.contains("password_salt"));
        assert_eq!(sanitized.users[1].id, user.user.id);
    }

    #[test]
    fn test_download_decrypted_wrong_password() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();

        assert!(matches!(
            store.download_decrypted(Some(&admin.token), "wrong"),
            Err(GiftboxError::Forbidden(_))
        ));
    }

    #[test]
    fn test_download_encrypted_returns_envelope_bytes() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        let bytes = store.download_encrypted(Some(&admin.token)).unwrap();

        // Opaque envelope: at least nonce + tag, and decryptable with the key
        assert!(bytes.len() >= crate::crypto::envelope::HEADER_LENGTH);
        let key = crate::crypto::derive_key(PASSPHRASE).unwrap();
        let plaintext = crate::crypto::envelope::open(&bytes, &key).unwrap();
        let doc: Document = serde_json::from_slice(&plaintext).unwrap();
        assert_eq!(doc.users.len(), 1);
    }

    #[test]
    fn test_restore_replaces_wholesale() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();
        store
            .create_gift(Some(&admin.token), "text", "will be replaced")
            .unwrap();

        let incoming = serde_json::json!({
            "users": [{
                "id": Uuid::new_v4(),
                "phone": "+15557770000",
                "created_at": Utc::now(),
            }],
            "gifts": [],
            "sessions": [],
        });

        let stats = store
            .restore(Some(&admin.token), "password-one", incoming)
            .unwrap();

        assert_eq!(stats.users, 1);
        assert_eq!(stats.gifts, 0);
        assert_eq!(stats.sessions, 0);

        // Old gifts are gone, and the restored credential-less user
        // cannot authenticate
        assert!(store.list_gifts(None).unwrap().is_empty());
        assert!(matches!(
            store.login("+15557770000", "anything"),
            Err(GiftboxError::Validation(_))
        ));
    }

    #[test]
    fn test_restore_rejects_malformed_document() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();

        for bad in [
            serde_json::json!([]),
            serde_json::json!({"users": [], "gifts": []}),
            serde_json::json!({"users": {}, "gifts": [], "sessions": []}),
            serde_json::json!({"users": [{"phone": 42}], "gifts": [], "sessions": []}),
        ] {
            assert!(matches!(
                store.restore(Some(&admin.token), "password-one", bad),
                Err(GiftboxError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_cleanup_sessions_counts() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let admin = store.register("+15550000001", "password-one").unwrap();

        // Plant an expired session behind the public API's back
        {
            let mut doc = store.lock();
            doc.sessions.push(crate::document::Session {
                token: "expired".to_string(),
                user_id: admin.user.id,
                expires_at: Utc::now() - chrono::Duration::hours(1),
            });
        }

        let stats = store.cleanup_sessions(Some(&admin.token)).unwrap();
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.remaining, 1);
    }
}
