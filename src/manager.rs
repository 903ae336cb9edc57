//! # Cache Manager
//!
//! Top-level facade mapping cache *names* to live backend clients. The
//! manager owns the provider registry handle and the secret codec, and is
//! the only component that constructs and destroys adapters.
//!
//! Registration is serialized per manager: the table's write guard is held
//! across adapter construction, so two concurrent registrations under the
//! same name cannot interleave and a replaced adapter is fully destroyed
//! before the replacement becomes visible to `client()`. Lookups only take
//! the read guard and always observe a complete entry.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::client::CacheClient;
use crate::config::CacheConfig;
use crate::provider::ProviderRegistry;
use crate::secret::{NoSecrets, SecretCodec};

/// Reserved name for the process-wide system cache
pub const SYSTEM_CACHE_NAME: &str = "SystemCache";

/// Facade over all registered cache instances
pub struct CacheManager {
    registry: Arc<ProviderRegistry>,
    codec: Arc<dyn SecretCodec>,
    caches: RwLock<HashMap<String, Arc<CacheClient>>>,
}

impl CacheManager {
    /// Create a manager without secret management (plaintext passwords)
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::with_codec(registry, Arc::new(NoSecrets))
    }

    /// Create a manager with a secret codec for protected passwords
    pub fn with_codec(registry: Arc<ProviderRegistry>, codec: Arc<dyn SecretCodec>) -> Self {
        Self {
            registry,
            codec,
            caches: RwLock::new(HashMap::new()),
        }
    }

    /// Handle to the provider registry this manager resolves backends from
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Register a cache instance under `name`
    ///
    /// Returns `false` — never an error — when the name is empty or
    /// reserved, the configured backend is unknown, or the adapter could
    /// not be constructed. A previously registered adapter under the same
    /// name survives a failed replacement and is destroyed on a successful
    /// one.
    pub async fn register(&self, name: &str, config: CacheConfig) -> bool {
        if name.trim().is_empty() || name.eq_ignore_ascii_case(SYSTEM_CACHE_NAME) {
            warn!(cache = name, "Rejecting cache registration: invalid name");
            return false;
        }
        self.register_inner(name, config).await
    }

    /// Register the reserved process-wide system cache
    pub async fn register_system_cache(&self, config: CacheConfig) -> bool {
        self.register_inner(SYSTEM_CACHE_NAME, config).await
    }

    async fn register_inner(&self, name: &str, config: CacheConfig) -> bool {
        let Some(factory) = self.registry.resolve(&config.backend_name) else {
            warn!(
                cache = name,
                backend = %config.backend_name,
                "Rejecting cache registration: backend not registered"
            );
            return false;
        };

        // The write guard spans construction: concurrent registrations
        // under one name serialize here, and client() cannot observe a
        // half-built entry.
        let mut caches = self.caches.write().await;
        match factory.create(&config, self.codec.as_ref()).await {
            Ok(adapter) => {
                if let Some(previous) = caches.remove(name) {
                    warn!(cache = name, "Overriding cache registration");
                    previous.destroy().await;
                }
                caches.insert(name.to_string(), Arc::new(CacheClient::new(name, adapter)));
                info!(
                    cache = name,
                    backend = %config.backend_name,
                    "Cache instance registered"
                );
                true
            }
            Err(e) => {
                error!(
                    cache = name,
                    backend = %config.backend_name,
                    error = %e,
                    "Cache adapter construction failed"
                );
                false
            }
        }
    }

    /// Handle to the cache registered under `name`
    pub async fn client(&self, name: &str) -> Option<Arc<CacheClient>> {
        self.caches.read().await.get(name).cloned()
    }

    /// Handle to the reserved system cache
    pub async fn system_client(&self) -> Option<Arc<CacheClient>> {
        self.client(SYSTEM_CACHE_NAME).await
    }

    /// Remove and destroy the cache registered under `name`; no-op when
    /// absent
    pub async fn deregister(&self, name: &str) {
        let removed = self.caches.write().await.remove(name);
        if let Some(client) = removed {
            client.destroy().await;
            info!(cache = name, "Cache instance deregistered");
        }
    }

    /// Destroy and clear every registered cache; used at process shutdown
    pub async fn destroy_all(&self) {
        let drained: Vec<Arc<CacheClient>> = {
            let mut caches = self.caches.write().await;
            caches.drain().map(|(_, client)| client).collect()
        };
        let count = drained.len();
        join_all(drained.iter().map(|client| client.destroy())).await;
        info!(count = count, "All cache instances destroyed");
    }
}
