//! # Memcached Backend
//!
//! Memcached backend adapter using the async-memcached client. Requires the
//! `backend-memcached` feature.
//!
//! async-memcached speaks to exactly one node over one connection, which
//! matches how the memcached protocol is usually deployed behind this
//! facade: the adapter connects to the first write-capable endpoint and
//! warns when the configuration lists more. Client-side key distribution is
//! deliberately out of scope. The protocol has no native replace-expiry or
//! touch surface in this client, so `expire` and `touch` re-store the
//! current value with the new deadline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_memcached::{AsciiProtocol, Client};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::errors::{CacheError, CacheResult};
use crate::provider::adapter::{resolve_password, BackendAdapter};
use crate::provider::topology;
use crate::provider::{BackendDescriptor, BackendFactory};
use crate::secret::SecretCodec;

const BACKEND_NAME: &str = "MemcachedBackend";
const DEFAULT_PORT: u16 = 11211;

/// Factory for [`MemcachedBackend`] adapters
pub struct MemcachedBackendFactory;

#[async_trait]
impl BackendFactory for MemcachedBackendFactory {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: BACKEND_NAME,
            default_port: DEFAULT_PORT,
        }
    }

    async fn create(
        &self,
        config: &CacheConfig,
        codec: &dyn SecretCodec,
    ) -> CacheResult<Box<dyn BackendAdapter>> {
        let password = resolve_password(config, codec)?;
        if !password.is_empty() {
            warn!("Memcached client does not support authentication, credentials ignored");
        }
        let backend = MemcachedBackend::connect(config).await?;
        Ok(Box::new(backend))
    }
}

/// Memcached backend adapter
pub struct MemcachedBackend {
    client: Option<Arc<Mutex<Client>>>,
    default_expiry: i64,
    destroyed: AtomicBool,
}

impl MemcachedBackend {
    /// Connect to the first write-capable endpoint of the configuration
    pub async fn connect(config: &CacheConfig) -> CacheResult<Self> {
        let client = match config.servers.iter().find(|s| !s.read_only).or_else(|| {
            config.servers.first()
        }) {
            None => {
                warn!("Memcached backend configured without servers, all operations will no-op");
                None
            }
            Some(endpoint) => {
                if config.servers.len() > 1 {
                    warn!(
                        configured = config.servers.len(),
                        "Memcached client is single-node, using first write-capable endpoint only"
                    );
                }
                let url = format!(
                    "tcp://{}:{}",
                    endpoint.address,
                    topology::resolved_port(endpoint, DEFAULT_PORT)
                );
                let client = Client::new(&url).await.map_err(|e| {
                    CacheError::Construction(format!("Failed to connect to memcached: {e}"))
                })?;
                info!(server = %url, "Memcached cache backend connected");
                Some(Arc::new(Mutex::new(client)))
            }
        };
        Ok(Self {
            client,
            default_expiry: config.expire_time,
            destroyed: AtomicBool::new(false),
        })
    }

    fn usable_client(&self) -> Option<&Arc<Mutex<Client>>> {
        if self.destroyed.load(Ordering::SeqCst) {
            return None;
        }
        self.client.as_ref()
    }

    fn ttl_for(expiry: i64) -> Option<i64> {
        if expiry > 0 {
            Some(expiry)
        } else {
            None
        }
    }
}

#[async_trait]
impl BackendAdapter for MemcachedBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn default_expiry(&self) -> i64 {
        self.default_expiry
    }

    async fn set(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()> {
        let Some(client) = self.usable_client() else {
            return Ok(());
        };
        let mut client = client.lock().await;
        client
            .set(key, value.as_bytes(), Self::ttl_for(expiry), None)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached SET failed: {e}")))?;
        debug!(key = key, expiry = expiry, "Cache SET (memcached)");
        Ok(())
    }

    async fn add(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()> {
        let Some(client) = self.usable_client() else {
            return Ok(());
        };
        let mut client = client.lock().await;
        // add fails with NOT_STORED when the key exists, which is the
        // intended outcome, not an error
        if let Err(e) = client
            .add(key, value.as_bytes(), Self::ttl_for(expiry), None)
            .await
        {
            debug!(key = key, error = %e, "Cache ADD left existing value in place");
        }
        Ok(())
    }

    async fn replace(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()> {
        let Some(client) = self.usable_client() else {
            return Ok(());
        };
        let mut client = client.lock().await;
        let existing = client
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached GET failed: {e}")))?;
        if existing.is_none() {
            debug!(key = key, "Cache REPLACE skipped, key absent");
            return Ok(());
        }
        client
            .set(key, value.as_bytes(), Self::ttl_for(expiry), None)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached SET failed: {e}")))?;
        debug!(key = key, expiry = expiry, "Cache REPLACE (memcached)");
        Ok(())
    }

    async fn expire(&self, key: &str, expiry: i64) -> CacheResult<()> {
        let Some(client) = self.usable_client() else {
            return Ok(());
        };
        let mut client = client.lock().await;
        let existing = client
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached GET failed: {e}")))?;
        let Some(value) = existing else {
            return Ok(());
        };
        client
            .set(key, value.data.as_deref().unwrap_or_default(), Self::ttl_for(expiry), None)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached SET failed: {e}")))?;
        debug!(key = key, expiry = expiry, "Cache EXPIRE re-stored value");
        Ok(())
    }

    async fn touch(&self, keys: &[&str]) -> CacheResult<()> {
        for key in keys {
            self.expire(key, self.default_expiry).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let Some(client) = self.usable_client() else {
            return Ok(());
        };
        let mut client = client.lock().await;
        // delete errors when the key does not exist, which is fine
        if let Err(e) = client.delete(key).await {
            debug!(key = key, error = %e, "Cache DEL on absent key");
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let Some(client) = self.usable_client() else {
            return Ok(None);
        };
        let mut client = client.lock().await;
        let result = client
            .get(key)
            .await
            .map_err(|e| CacheError::Backend(format!("Memcached GET failed: {e}")))?;
        match result {
            Some(value) => {
                let data = String::from_utf8(value.data.unwrap_or_default()).map_err(|e| {
                    CacheError::Backend(format!("Invalid UTF-8 data under key '{key}': {e}"))
                })?;
                debug!(key = key, "Cache HIT (memcached)");
                Ok(Some(data))
            }
            None => {
                debug!(key = key, "Cache MISS (memcached)");
                Ok(None)
            }
        }
    }

    async fn incr(&self, key: &str, step: i64) -> CacheResult<i64> {
        let Some(client) = self.usable_client() else {
            return Err(CacheError::Backend(
                "Memcached backend has no usable topology".to_string(),
            ));
        };
        let mut client = client.lock().await;
        let result = if step >= 0 {
            client.increment(key, step as u64).await
        } else {
            client.decrement(key, step.unsigned_abs()).await
        };
        result
            .map(|value| value as i64)
            .map_err(|e| CacheError::Backend(format!("Memcached INCR failed: {e}")))
    }

    async fn decr(&self, key: &str, step: i64) -> CacheResult<i64> {
        let Some(client) = self.usable_client() else {
            return Err(CacheError::Backend(
                "Memcached backend has no usable topology".to_string(),
            ));
        };
        let mut client = client.lock().await;
        let result = if step >= 0 {
            client.decrement(key, step as u64).await
        } else {
            client.increment(key, step.unsigned_abs()).await
        };
        result
            .map(|value| value as i64)
            .map_err(|e| CacheError::Backend(format!("Memcached DECR failed: {e}")))
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        // the connection closes when the last Arc clone drops
        debug!("Memcached backend destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_topology_neutralizes_operations() {
        let backend = MemcachedBackend::connect(&CacheConfig::default())
            .await
            .unwrap();
        backend.set("k", "v", -1).await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.incr("k", 1).await.is_err());
        backend.destroy().await;
        backend.destroy().await;
    }

    #[test]
    fn test_ttl_for_treats_non_positive_as_unbounded() {
        assert_eq!(MemcachedBackend::ttl_for(60), Some(60));
        assert_eq!(MemcachedBackend::ttl_for(0), None);
        assert_eq!(MemcachedBackend::ttl_for(-1), None);
    }

    // Integration tests require a running Memcached instance (behind test-services feature)
    #[cfg(feature = "test-services")]
    mod integration {
        use super::*;
        use crate::config::ServerEndpoint;
        use std::time::Duration;
        use tracing::warn;

        fn test_config() -> CacheConfig {
            let mut config = CacheConfig::default();
            config.servers = vec![ServerEndpoint {
                address: std::env::var("MEMCACHED_HOST")
                    .unwrap_or_else(|_| "localhost".to_string()),
                port: 11211,
                weight: 1,
                read_only: false,
            }];
            config.expire_time = 60;
            config
        }

        async fn connect_or_skip() -> Option<MemcachedBackend> {
            match MemcachedBackend::connect(&test_config()).await {
                Ok(backend) => Some(backend),
                Err(e) => {
                    warn!("Skipping Memcached test (not available): {}", e);
                    None
                }
            }
        }

        #[tokio::test]
        async fn test_memcached_crud_operations() {
            let Some(backend) = connect_or_skip().await else {
                return;
            };
            let key = format!("test:crud:{}", uuid::Uuid::new_v4());

            backend.set(&key, "value", 60).await.unwrap();
            assert_eq!(
                backend.get(&key).await.unwrap(),
                Some("value".to_string())
            );

            backend.delete(&key).await.unwrap();
            assert_eq!(backend.get(&key).await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_memcached_expiry() {
            let Some(backend) = connect_or_skip().await else {
                return;
            };
            let key = format!("test:ttl:{}", uuid::Uuid::new_v4());

            backend.set(&key, "temporary", 1).await.unwrap();
            assert!(backend.get(&key).await.unwrap().is_some());

            tokio::time::sleep(Duration::from_millis(1500)).await;
            assert!(backend.get(&key).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_memcached_counters() {
            let Some(backend) = connect_or_skip().await else {
                return;
            };
            let key = format!("test:counter:{}", uuid::Uuid::new_v4());

            backend.set(&key, "10", 60).await.unwrap();
            assert_eq!(backend.incr(&key, 3).await.unwrap(), 13);
            assert_eq!(backend.decr(&key, 5).await.unwrap(), 8);
            backend.delete(&key).await.unwrap();
        }
    }
}
