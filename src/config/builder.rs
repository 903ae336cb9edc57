//! # Cache Configuration Builder
//!
//! Fluent, validating mutator over one [`CacheConfig`], either fresh or
//! pre-existing. Every setter validates its input, tracks whether the
//! effective value actually changed, then applies it — callers can persist
//! the result only when [`CacheConfigBuilder::is_modified`] says something
//! moved.
//!
//! The builder is also the only place passwords are (re-)encrypted: changing
//! the protecting secret profile re-encrypts the stored password in the same
//! call that swaps the profile name, so ciphertext is never left behind
//! under a stale profile.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::warn;

use crate::config::{defaults, CacheConfig, ServerEndpoint};
use crate::provider::ProviderRegistry;
use crate::secret::SecretCodec;

/// Fluent builder over a [`CacheConfig`]
///
/// Setters are total: invalid input falls back to the documented default or
/// leaves the field untouched with a warning, never panics. Numeric setters
/// treat non-positive values as "reset to default".
pub struct CacheConfigBuilder {
    config: CacheConfig,
    registry: Arc<ProviderRegistry>,
    codec: Arc<dyn SecretCodec>,
    modified: bool,
}

impl CacheConfigBuilder {
    /// Start from an empty configuration
    pub fn new(registry: Arc<ProviderRegistry>, codec: Arc<dyn SecretCodec>) -> Self {
        Self {
            config: CacheConfig::default(),
            registry,
            codec,
            modified: false,
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk
    pub fn from_config(
        config: CacheConfig,
        registry: Arc<ProviderRegistry>,
        codec: Arc<dyn SecretCodec>,
    ) -> Self {
        Self {
            config,
            registry,
            codec,
            modified: false,
        }
    }

    /// Select the backend serving this cache
    ///
    /// Ignored unless the name is non-empty and currently registered.
    pub fn backend_name(mut self, backend_name: &str) -> Self {
        if !backend_name.is_empty() && self.registry.is_registered(backend_name) {
            if !backend_name.eq_ignore_ascii_case(&self.config.backend_name) {
                self.modified = true;
            }
            self.config.backend_name = backend_name.to_string();
        }
        self
    }

    /// Change the secret profile protecting the stored password
    ///
    /// A non-empty password is re-encrypted under the new profile (decrypted
    /// to plaintext when the new profile is empty) before the profile name is
    /// swapped. Switching to the same profile is a no-op for modification
    /// tracking. An unregistered profile, or a codec failure, leaves both
    /// password and profile unchanged.
    pub fn secret_profile(mut self, secret_profile: &str) -> Self {
        if !secret_profile.is_empty() {
            if !self.codec.is_registered(secret_profile) {
                warn!(
                    profile = secret_profile,
                    "Secret profile not registered with codec, keeping previous profile"
                );
                return self;
            }
            if !secret_profile.eq_ignore_ascii_case(&self.config.secret_profile) {
                if !self.config.password.is_empty() {
                    let plaintext = if self.config.secret_profile.is_empty() {
                        Some(self.config.password.clone().into_bytes())
                    } else {
                        self.decrypt_stored_password()
                    };
                    match plaintext.and_then(|p| self.encrypt_password(secret_profile, &p)) {
                        Some(stored) => self.config.password = stored,
                        None => {
                            warn!(
                                profile = secret_profile,
                                "Password re-encryption failed, keeping previous profile"
                            );
                            return self;
                        }
                    }
                }
                self.modified = true;
                self.config.secret_profile = secret_profile.to_string();
            }
        } else if !self.config.secret_profile.is_empty() {
            if !self.config.password.is_empty() {
                match self.decrypt_stored_password() {
                    Some(plaintext) => {
                        self.config.password = String::from_utf8_lossy(&plaintext).into_owned();
                    }
                    None => {
                        warn!("Password decryption failed, keeping previous profile");
                        return self;
                    }
                }
            }
            self.modified = true;
            self.config.secret_profile.clear();
        }
        self
    }

    /// Connect/borrow timeout in seconds; non-positive resets to the default
    pub fn connect_timeout(mut self, connect_timeout: i32) -> Self {
        let applied = if connect_timeout > 0 {
            connect_timeout
        } else {
            defaults::CONNECT_TIMEOUT
        };
        if applied != self.config.connect_timeout {
            self.modified = true;
        }
        self.config.connect_timeout = applied;
        self
    }

    /// Default entry expiry in seconds; non-positive resets to -1 (never)
    pub fn expire_time(mut self, expire_time: i64) -> Self {
        let applied = if expire_time > 0 {
            expire_time
        } else {
            defaults::EXPIRE_TIME
        };
        if applied != self.config.expire_time {
            self.modified = true;
        }
        self.config.expire_time = applied;
        self
    }

    /// Idle pool size; non-positive resets to the default
    pub fn client_pool_size(mut self, client_pool_size: i64) -> Self {
        let applied = if client_pool_size > 0 {
            client_pool_size as u32
        } else {
            defaults::CLIENT_POOL_SIZE
        };
        if applied != self.config.client_pool_size {
            self.modified = true;
        }
        self.config.client_pool_size = applied;
        self
    }

    /// Maximum concurrently borrowed connections; non-positive resets to the
    /// default
    pub fn maximum_client(mut self, maximum_client: i64) -> Self {
        let applied = if maximum_client > 0 {
            maximum_client as u32
        } else {
            defaults::MAXIMUM_CLIENT
        };
        if applied != self.config.maximum_client {
            self.modified = true;
        }
        self.config.maximum_client = applied;
        self
    }

    /// Retry budget for borrow liveness and cluster failover; non-positive
    /// resets to the default
    pub fn retry_count(mut self, retry_count: i64) -> Self {
        let applied = if retry_count > 0 {
            retry_count as u32
        } else {
            defaults::RETRY_COUNT
        };
        if applied != self.config.retry_count {
            self.modified = true;
        }
        self.config.retry_count = applied;
        self
    }

    /// Set the authentication credentials
    ///
    /// An empty password clears the stored one. A non-empty password is
    /// encrypted under the current secret profile (when one is registered)
    /// before storing; the modification check compares the stored form, not
    /// the raw input.
    pub fn authorization(mut self, username: &str, password: &str) -> Self {
        let username_changed = if username.is_empty() {
            !self.config.username.is_empty()
        } else {
            !username.eq_ignore_ascii_case(&self.config.username)
        };
        if username_changed {
            self.modified = true;
        }
        self.config.username = username.to_string();

        if password.is_empty() {
            if !self.config.password.is_empty() {
                self.modified = true;
            }
            self.config.password.clear();
        } else {
            let stored = if !self.config.secret_profile.is_empty()
                && self.codec.is_registered(&self.config.secret_profile)
            {
                match self.encrypt_password(&self.config.secret_profile, password.as_bytes()) {
                    Some(stored) => stored,
                    None => {
                        warn!("Password encryption failed, keeping previous password");
                        return self;
                    }
                }
            } else {
                password.to_string()
            };
            if stored != self.config.password {
                self.modified = true;
                self.config.password = stored;
            }
        }
        self
    }

    /// Add a server endpoint, or update it in place when the
    /// case-insensitive (address, port) pair already exists
    ///
    /// A non-positive weight falls back to the default weight. Both the
    /// update and the append branch mark the configuration modified.
    pub fn upsert_server(
        mut self,
        address: &str,
        port: u16,
        weight: i32,
        read_only: bool,
    ) -> Self {
        let weight = if weight > 0 {
            weight as u32
        } else {
            defaults::SERVER_WEIGHT
        };
        match self
            .config
            .servers
            .iter_mut()
            .find(|endpoint| endpoint.matches(address, port))
        {
            Some(endpoint) => {
                endpoint.weight = weight;
                endpoint.read_only = read_only;
            }
            None => self.config.servers.push(ServerEndpoint {
                address: address.to_string(),
                port,
                weight,
                read_only,
            }),
        }
        self.modified = true;
        self
    }

    /// Remove the endpoint matching the (address, port) pair, if any
    pub fn remove_server(mut self, address: &str, port: u16) -> Self {
        let before = self.config.servers.len();
        self.config
            .servers
            .retain(|endpoint| !endpoint.matches(address, port));
        if self.config.servers.len() != before {
            self.modified = true;
        }
        self
    }

    /// Whether any setter changed an effective value since construction
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Hand out the built configuration
    pub fn finish(self) -> CacheConfig {
        self.config
    }

    fn encrypt_password(&self, profile: &str, plaintext: &[u8]) -> Option<String> {
        match self.codec.encrypt(profile, plaintext) {
            Ok(ciphertext) => Some(BASE64.encode(ciphertext)),
            Err(e) => {
                warn!(profile = profile, error = %e, "Secret codec encryption failed");
                None
            }
        }
    }

    fn decrypt_stored_password(&self) -> Option<Vec<u8>> {
        let ciphertext = match BASE64.decode(&self.config.password) {
            Ok(ciphertext) => ciphertext,
            Err(e) => {
                warn!(error = %e, "Stored password is not valid base64 ciphertext");
                return None;
            }
        };
        match self
            .codec
            .decrypt(&self.config.secret_profile, &ciphertext)
        {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                warn!(
                    profile = %self.config.secret_profile,
                    error = %e,
                    "Secret codec decryption failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CacheResult;
    use proptest::prelude::*;

    /// Deterministic xor codec recognizing a fixed set of profiles
    struct XorCodec {
        profiles: Vec<(&'static str, u8)>,
    }

    impl XorCodec {
        fn new() -> Self {
            Self {
                profiles: vec![("profile-a", 0x2a), ("profile-b", 0x5f)],
            }
        }

        fn key(&self, profile: &str) -> Option<u8> {
            self.profiles
                .iter()
                .find(|(name, _)| *name == profile)
                .map(|(_, key)| *key)
        }
    }

    impl SecretCodec for XorCodec {
        fn encrypt(&self, profile: &str, plaintext: &[u8]) -> CacheResult<Vec<u8>> {
            let key = self.key(profile).unwrap();
            Ok(plaintext.iter().map(|b| b ^ key).collect())
        }

        fn decrypt(&self, profile: &str, ciphertext: &[u8]) -> CacheResult<Vec<u8>> {
            self.encrypt(profile, ciphertext)
        }

        fn is_registered(&self, profile: &str) -> bool {
            self.key(profile).is_some()
        }
    }

    fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new(
            Arc::new(ProviderRegistry::with_defaults()),
            Arc::new(XorCodec::new()),
        )
    }

    #[test]
    fn test_fresh_builder_is_not_modified() {
        let b = builder();
        assert!(!b.is_modified());
        assert_eq!(b.finish(), CacheConfig::default());
    }

    #[test]
    fn test_equal_value_does_not_mark_modified() {
        let b = builder()
            .connect_timeout(defaults::CONNECT_TIMEOUT)
            .client_pool_size(i64::from(defaults::CLIENT_POOL_SIZE))
            .retry_count(i64::from(defaults::RETRY_COUNT));
        assert!(!b.is_modified());
    }

    #[test]
    fn test_changed_value_marks_modified() {
        let b = builder().connect_timeout(5);
        assert!(b.is_modified());
        assert_eq!(b.finish().connect_timeout, 5);
    }

    #[test]
    fn test_non_positive_numeric_resets_to_default() {
        let mut config = CacheConfig::default();
        config.connect_timeout = 7;
        config.expire_time = 60;
        let b = CacheConfigBuilder::from_config(
            config,
            Arc::new(ProviderRegistry::with_defaults()),
            Arc::new(XorCodec::new()),
        )
        .connect_timeout(0)
        .expire_time(-5);
        assert!(b.is_modified());
        let config = b.finish();
        assert_eq!(config.connect_timeout, defaults::CONNECT_TIMEOUT);
        assert_eq!(config.expire_time, defaults::EXPIRE_TIME);
    }

    #[test]
    fn test_backend_name_requires_registration() {
        let b = builder().backend_name("NoSuchBackend");
        assert!(!b.is_modified());
        assert_eq!(b.finish().backend_name, "");

        let b = builder().backend_name("MemoryBackend");
        assert!(b.is_modified());
        assert_eq!(b.finish().backend_name, "MemoryBackend");
    }

    #[test]
    fn test_upsert_server_updates_in_place() {
        let b = builder()
            .upsert_server("node-1", 6379, 1, false)
            .upsert_server("NODE-1", 6379, 4, true);
        let config = b.finish();
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].weight, 4);
        assert!(config.servers[0].read_only);
    }

    #[test]
    fn test_upsert_server_defaults_non_positive_weight() {
        let config = builder().upsert_server("node-1", 6379, 0, false).finish();
        assert_eq!(config.servers[0].weight, defaults::SERVER_WEIGHT);
    }

    #[test]
    fn test_remove_server_tracks_modification() {
        let config = builder().upsert_server("node-1", 6379, 1, false).finish();

        let b = CacheConfigBuilder::from_config(
            config.clone(),
            Arc::new(ProviderRegistry::with_defaults()),
            Arc::new(XorCodec::new()),
        )
        .remove_server("absent", 6379);
        assert!(!b.is_modified());

        let b = CacheConfigBuilder::from_config(
            config,
            Arc::new(ProviderRegistry::with_defaults()),
            Arc::new(XorCodec::new()),
        )
        .remove_server("Node-1", 6379);
        assert!(b.is_modified());
        assert!(b.finish().servers.is_empty());
    }

    #[test]
    fn test_authorization_encrypts_under_current_profile() {
        let codec = Arc::new(XorCodec::new());
        let config = builder()
            .secret_profile("profile-a")
            .authorization("app", "hunter2")
            .finish();
        assert_eq!(config.username, "app");
        assert_ne!(config.password, "hunter2");

        let ciphertext = BASE64.decode(&config.password).unwrap();
        let plaintext = codec.decrypt("profile-a", &ciphertext).unwrap();
        assert_eq!(plaintext, b"hunter2");
    }

    #[test]
    fn test_authorization_empty_password_clears() {
        let b = builder()
            .authorization("app", "hunter2")
            .authorization("app", "");
        assert!(b.is_modified());
        assert_eq!(b.finish().password, "");
    }

    #[test]
    fn test_secret_profile_transition_round_trips_password() {
        let codec = Arc::new(XorCodec::new());
        let config = builder()
            .secret_profile("profile-a")
            .authorization("app", "hunter2")
            .secret_profile("profile-b")
            .finish();
        assert_eq!(config.secret_profile, "profile-b");

        let ciphertext = BASE64.decode(&config.password).unwrap();
        let plaintext = codec.decrypt("profile-b", &ciphertext).unwrap();
        assert_eq!(plaintext, b"hunter2");
    }

    #[test]
    fn test_secret_profile_cleared_stores_plaintext() {
        let config = builder()
            .secret_profile("profile-a")
            .authorization("app", "hunter2")
            .secret_profile("")
            .finish();
        assert_eq!(config.secret_profile, "");
        assert_eq!(config.password, "hunter2");
    }

    #[test]
    fn test_plaintext_password_encrypted_when_profile_arrives() {
        let codec = Arc::new(XorCodec::new());
        let config = builder()
            .authorization("app", "hunter2")
            .secret_profile("profile-a")
            .finish();

        let ciphertext = BASE64.decode(&config.password).unwrap();
        let plaintext = codec.decrypt("profile-a", &ciphertext).unwrap();
        assert_eq!(plaintext, b"hunter2");
    }

    #[test]
    fn test_same_secret_profile_is_not_a_modification() {
        let config = builder()
            .secret_profile("profile-a")
            .authorization("app", "hunter2")
            .finish();
        let b = CacheConfigBuilder::from_config(
            config,
            Arc::new(ProviderRegistry::with_defaults()),
            Arc::new(XorCodec::new()),
        )
        .secret_profile("PROFILE-A");
        assert!(!b.is_modified());
    }

    #[test]
    fn test_unregistered_profile_is_rejected() {
        let b = builder()
            .authorization("app", "hunter2")
            .secret_profile("unknown");
        let config = b.finish();
        assert_eq!(config.secret_profile, "");
        assert_eq!(config.password, "hunter2");
    }

    proptest! {
        /// Arbitrary upsert sequences never produce duplicate (address, port)
        /// identities, and the final weight is the last one written.
        #[test]
        fn prop_upsert_keeps_endpoint_identity_unique(
            ops in proptest::collection::vec((0usize..4, 1u16..4, 1i32..100), 1..40)
        ) {
            let addresses = ["alpha", "beta", "GAMMA", "delta"];
            let mut b = builder();
            for (addr_idx, port, weight) in &ops {
                b = b.upsert_server(addresses[*addr_idx], *port, *weight, false);
            }
            let config = b.finish();
            for (i, left) in config.servers.iter().enumerate() {
                for right in config.servers.iter().skip(i + 1) {
                    prop_assert!(!left.matches(&right.address, right.port));
                }
            }
            // last write wins per identity
            for endpoint in &config.servers {
                let last = ops
                    .iter()
                    .rev()
                    .find(|(addr_idx, port, _)| {
                        endpoint.matches(addresses[*addr_idx], *port)
                    })
                    .unwrap();
                prop_assert_eq!(endpoint.weight, last.2 as u32);
            }
        }
    }
}
