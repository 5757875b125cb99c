//! Environment configuration surface.
//!
//! The single configurable value is the envelope passphrase. When the
//! environment does not provide one, a fixed well-known development
//! default is used and warned about loudly; it must never reach a real
//! deployment.

use std::env;

use tracing::warn;

/// Environment variable holding the store passphrase.
pub const PASSPHRASE_ENV: &str = "GIFTBOX_PASSPHRASE";

/// Well-known development fallback passphrase.
pub const DEV_PASSPHRASE: &str = "giftbox-dev-passphrase";

/// Read the store passphrase from the environment, falling back to the
/// development default with a loud warning.
pub fn passphrase_from_env() -> String {
    match env::var(PASSPHRASE_ENV) {
        Ok(value) if !value.is_empty() => value,
        _ => {
            warn!(
                env = PASSPHRASE_ENV,
                "No passphrase configured; using the WELL-KNOWN development \
                 default. Anyone can decrypt this store. Do not deploy like this."
            );
            DEV_PASSPHRASE.to_string()
        }
    }
}
