//! # Backend Provider Registry
//!
//! Maps backend names to the factories that build their adapters. The
//! registry is an explicit object owned by the composition root — there is
//! no process-global table and no runtime discovery mechanism; built-in
//! backends are registered by an explicit startup call
//! ([`ProviderRegistry::with_defaults`]) and applications may register their
//! own factories next to them.
//!
//! Names are case-insensitive. Registering a name that already exists
//! overwrites the previous factory with a warning; it is never an error, so
//! a later registration (e.g. a test double shadowing a real backend) always
//! wins.

pub mod adapter;
pub mod topology;

pub use adapter::BackendAdapter;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::errors::CacheResult;
use crate::secret::SecretCodec;

/// Immutable metadata a backend factory exposes about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendDescriptor {
    /// Unique backend name, compared case-insensitively
    pub name: &'static str,
    /// Port assumed for server endpoints configured with port 0
    pub default_port: u16,
}

/// Builds ready-to-use adapters for one backend
///
/// `create` covers the whole `Uninitialized -> Initializing -> Ready`
/// transition: it resolves credentials through the codec, builds the
/// connection topology, and returns an adapter that is immediately usable.
/// A failure here is a construction error — the caller reports it and keeps
/// whatever adapter was previously registered.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Metadata identifying this backend
    fn descriptor(&self) -> BackendDescriptor;

    /// Build an initialized adapter for the given configuration
    async fn create(
        &self,
        config: &CacheConfig,
        codec: &dyn SecretCodec,
    ) -> CacheResult<Box<dyn BackendAdapter>>;
}

/// Name → factory table for all known backends
pub struct ProviderRegistry {
    table: RwLock<HashMap<String, Arc<dyn BackendFactory>>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            table: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry pre-populated with every backend compiled into the
    /// crate
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(crate::providers::memory::MemoryBackendFactory));
        #[cfg(feature = "backend-redis")]
        registry.register(Arc::new(crate::providers::redis::RedisBackendFactory));
        #[cfg(feature = "backend-memcached")]
        registry.register(Arc::new(
            crate::providers::memcached::MemcachedBackendFactory,
        ));
        debug!(
            backends = registry.table.read().len(),
            "Provider registry initialized with built-in backends"
        );
        registry
    }

    /// Register a backend factory under its descriptor name
    ///
    /// Overwrites (with a warning) any factory already registered under the
    /// same name.
    pub fn register(&self, factory: Arc<dyn BackendFactory>) {
        let descriptor = factory.descriptor();
        let key = descriptor.name.to_ascii_lowercase();
        let mut table = self.table.write();
        if table.contains_key(&key) {
            warn!(
                backend = descriptor.name,
                "Overriding previously registered backend factory"
            );
        }
        table.insert(key, factory);
    }

    /// Remove the factory registered under `name`, if any
    pub fn remove(&self, name: &str) {
        self.table.write().remove(&name.to_ascii_lowercase());
    }

    /// Whether a factory is registered under `name`
    pub fn is_registered(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        self.table.read().contains_key(&name.to_ascii_lowercase())
    }

    /// Names of all registered backends, in their descriptor spelling
    pub fn registered_names(&self) -> Vec<String> {
        self.table
            .read()
            .values()
            .map(|factory| factory.descriptor().name.to_string())
            .collect()
    }

    /// Look up the factory registered under `name`
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn BackendFactory>> {
        if name.is_empty() {
            return None;
        }
        self.table.read().get(&name.to_ascii_lowercase()).cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::memory::MemoryBackendFactory;

    #[test]
    fn test_with_defaults_registers_memory_backend() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.is_registered("MemoryBackend"));
        assert!(registry.is_registered("memorybackend"));
        assert!(registry
            .registered_names()
            .contains(&"MemoryBackend".to_string()));
    }

    #[test]
    fn test_unknown_and_empty_names() {
        let registry = ProviderRegistry::new();
        assert!(!registry.is_registered(""));
        assert!(!registry.is_registered("NoSuchBackend"));
        assert!(registry.resolve("").is_none());
        assert!(registry.resolve("NoSuchBackend").is_none());
    }

    #[test]
    fn test_register_overwrites_same_name() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MemoryBackendFactory));
        registry.register(Arc::new(MemoryBackendFactory));
        assert_eq!(registry.registered_names().len(), 1);
    }

    #[test]
    fn test_remove_is_total() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MemoryBackendFactory));
        registry.remove("memoryBACKEND");
        assert!(!registry.is_registered("MemoryBackend"));
        // removing again is a no-op
        registry.remove("MemoryBackend");
    }

    #[tokio::test]
    async fn test_resolved_factory_builds_adapter() {
        let registry = ProviderRegistry::with_defaults();
        let factory = registry.resolve("MemoryBackend").unwrap();
        assert_eq!(factory.descriptor().name, "MemoryBackend");

        let config = CacheConfig::default();
        let adapter = factory
            .create(&config, &crate::secret::NoSecrets)
            .await
            .unwrap();
        assert_eq!(adapter.backend_name(), "MemoryBackend");
    }
}
