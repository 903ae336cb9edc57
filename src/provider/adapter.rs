//! # Backend Adapter Contract
//!
//! The uniform operation surface every backend variant implements. Adapter
//! methods return [`CacheResult`] — the error-to-neutral-value conversion the
//! public API promises happens in exactly one place,
//! [`crate::client::CacheClient`], not here. Keeping the fallible surface
//! internal lets backends report what actually happened while the
//! application-facing handle stays panic- and error-free.
//!
//! An adapter returned by a [`super::BackendFactory`] is `Ready`: its
//! topology is built and credentials resolved. The only remaining state
//! transition is `destroy()`, which is idempotent and final — operations on
//! a destroyed adapter return neutral results.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::config::CacheConfig;
use crate::errors::{CacheError, CacheResult};
use crate::secret::SecretCodec;

/// Uniform operation set over one live backend topology
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Descriptor name of the backend serving this adapter
    fn backend_name(&self) -> &'static str;

    /// Expiry in seconds applied when the caller passes none; -1 = never
    fn default_expiry(&self) -> i64;

    /// Store a key-value pair with the given expiry
    async fn set(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()>;

    /// Store a key-value pair only when the key is absent
    async fn add(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()>;

    /// Store a key-value pair only when the key already exists
    async fn replace(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()>;

    /// Move a key's expiry to the given value
    async fn expire(&self, key: &str, expiry: i64) -> CacheResult<()>;

    /// Refresh the expiry of the given keys to the default expiry
    async fn touch(&self, keys: &[&str]) -> CacheResult<()>;

    /// Remove a key
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Read a key; `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Increment the integer value stored under `key` by `step`
    async fn incr(&self, key: &str, step: i64) -> CacheResult<i64>;

    /// Decrement the integer value stored under `key` by `step`
    async fn decr(&self, key: &str, step: i64) -> CacheResult<i64>;

    /// Release every connection and pool this adapter owns; idempotent
    async fn destroy(&self);
}

/// Resolve the plaintext password for a configuration
///
/// A password protected by a registered secret profile is base64-decoded and
/// decrypted through the codec; with no profile (or one the codec does not
/// know) the stored form is already the plaintext. Decryption failure is a
/// construction error — an adapter must not come up half-authenticated.
pub(crate) fn resolve_password(
    config: &CacheConfig,
    codec: &dyn SecretCodec,
) -> CacheResult<String> {
    if config.password.is_empty()
        || config.secret_profile.is_empty()
        || !codec.is_registered(&config.secret_profile)
    {
        return Ok(config.password.clone());
    }
    let ciphertext = BASE64.decode(&config.password).map_err(|e| {
        CacheError::Construction(format!("Stored password is not valid base64: {e}"))
    })?;
    let plaintext = codec
        .decrypt(&config.secret_profile, &ciphertext)
        .map_err(|e| CacheError::Construction(format!("Password decryption failed: {e}")))?;
    String::from_utf8(plaintext)
        .map_err(|e| CacheError::Construction(format!("Decrypted password is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret::NoSecrets;

    struct ShiftCodec;

    impl SecretCodec for ShiftCodec {
        fn encrypt(&self, _profile: &str, plaintext: &[u8]) -> CacheResult<Vec<u8>> {
            Ok(plaintext.iter().map(|b| b.wrapping_add(1)).collect())
        }

        fn decrypt(&self, _profile: &str, ciphertext: &[u8]) -> CacheResult<Vec<u8>> {
            Ok(ciphertext.iter().map(|b| b.wrapping_sub(1)).collect())
        }

        fn is_registered(&self, profile: &str) -> bool {
            profile == "known"
        }
    }

    #[test]
    fn test_plaintext_password_passes_through() {
        let mut config = CacheConfig::default();
        config.password = "plain".to_string();
        assert_eq!(resolve_password(&config, &NoSecrets).unwrap(), "plain");
    }

    #[test]
    fn test_unregistered_profile_keeps_stored_form() {
        let mut config = CacheConfig::default();
        config.password = "stored".to_string();
        config.secret_profile = "unknown".to_string();
        assert_eq!(resolve_password(&config, &ShiftCodec).unwrap(), "stored");
    }

    #[test]
    fn test_registered_profile_decrypts() {
        let codec = ShiftCodec;
        let ciphertext = codec.encrypt("known", b"hunter2").unwrap();

        let mut config = CacheConfig::default();
        config.password = BASE64.encode(ciphertext);
        config.secret_profile = "known".to_string();
        assert_eq!(resolve_password(&config, &codec).unwrap(), "hunter2");
    }

    #[test]
    fn test_invalid_ciphertext_is_a_construction_error() {
        let mut config = CacheConfig::default();
        config.password = "not base64 !!!".to_string();
        config.secret_profile = "known".to_string();
        let err = resolve_password(&config, &ShiftCodec).unwrap_err();
        assert!(matches!(err, CacheError::Construction(_)));
    }
}
