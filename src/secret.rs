//! Secret profile codec boundary
//!
//! Passwords stored inside a [`crate::config::CacheConfig`] may be protected
//! by a named secret profile. The key management behind a profile lives
//! outside this crate; adapters and the config builder only need the opaque
//! encrypt/decrypt surface below. Profile names are never inspected.

use crate::errors::CacheResult;

/// Encrypts and decrypts byte payloads under named secret profiles
///
/// Implementations are supplied by the composition root. A profile name that
/// `is_registered` returns `false` for must never be passed to `encrypt` or
/// `decrypt`; callers in this crate check first and fall back to plaintext
/// handling.
pub trait SecretCodec: Send + Sync {
    /// Encrypt `plaintext` under the named profile
    fn encrypt(&self, profile: &str, plaintext: &[u8]) -> CacheResult<Vec<u8>>;

    /// Decrypt `ciphertext` previously produced under the named profile
    fn decrypt(&self, profile: &str, ciphertext: &[u8]) -> CacheResult<Vec<u8>>;

    /// Whether the named profile is known to this codec
    fn is_registered(&self, profile: &str) -> bool;
}

/// Codec used when no secret management is wired up
///
/// Reports every profile as unregistered, which forces plaintext password
/// storage everywhere. Encrypt/decrypt pass data through untouched so a
/// misrouted call still round-trips.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl SecretCodec for NoSecrets {
    fn encrypt(&self, _profile: &str, plaintext: &[u8]) -> CacheResult<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, _profile: &str, ciphertext: &[u8]) -> CacheResult<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }

    fn is_registered(&self, _profile: &str) -> bool {
        false
    }
}
