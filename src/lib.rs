#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Cache Core
//!
//! Pluggable caching facade: register named cache instances, each backed by
//! one of several interchangeable key-value backends, and drive them
//! through one uniform operation set — without depending on any backend's
//! client API.
//!
//! ## Architecture
//!
//! ```text
//! CacheManager                    name -> live cache instance
//!   └── CacheClient               uniform ops, error-neutralizing boundary
//!         └── BackendAdapter      per-backend topology + operations
//!               ├── MemoryBackend     (always available)
//!               ├── RedisBackend      (feature backend-redis)
//!               └── MemcachedBackend  (feature backend-memcached)
//! ProviderRegistry                backend name -> adapter factory
//! CacheConfigBuilder              validating, modification-tracking config
//! SecretCodec                     password protection boundary
//! ```
//!
//! A configured server list decides the connection topology per instance:
//! no servers (inert), exactly one (single pooled connection for reads and
//! writes), or several (cluster clients split into a write path spanning
//! all nodes and a read path over the nodes flagged read-only).
//!
//! ## Error policy
//!
//! Configuration and construction problems are visible at registration
//! time. Runtime backend failures never reach the application: operations
//! retry within their configured budget, then degrade to a neutral result
//! (`None` for reads, silent no-op for writes) with a warning in the logs.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use cache_core::config::CacheConfigBuilder;
//! use cache_core::manager::CacheManager;
//! use cache_core::provider::ProviderRegistry;
//! use cache_core::secret::NoSecrets;
//!
//! # async fn example() {
//! let registry = Arc::new(ProviderRegistry::with_defaults());
//! let manager = CacheManager::new(Arc::clone(&registry));
//!
//! let config = CacheConfigBuilder::new(registry, Arc::new(NoSecrets))
//!     .backend_name("MemoryBackend")
//!     .expire_time(300)
//!     .upsert_server("localhost", 0, 1, false)
//!     .finish();
//!
//! assert!(manager.register("sessions", config).await);
//! let cache = manager.client("sessions").await.unwrap();
//! cache.set("user:42", "alice").await;
//! assert_eq!(cache.get("user:42").await.as_deref(), Some("alice"));
//! # }
//! ```

pub mod client;
pub mod config;
pub mod errors;
pub mod manager;
pub mod provider;
pub mod providers;
pub mod secret;

pub use client::CacheClient;
pub use config::{CacheConfig, CacheConfigBuilder, ServerEndpoint};
pub use errors::{CacheError, CacheResult};
pub use manager::{CacheManager, SYSTEM_CACHE_NAME};
pub use provider::{BackendAdapter, BackendDescriptor, BackendFactory, ProviderRegistry};
pub use secret::{NoSecrets, SecretCodec};
