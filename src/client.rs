//! # Cache Client
//!
//! The application-facing handle for one registered cache. This is the
//! single place backend errors turn into neutral results: reads degrade to
//! `None`, writes to a silent no-op, counters to `None` — with a `warn!`
//! carrying the underlying error. A flaky cache node must never take the
//! calling application down with it; the cost is that a failed write is
//! only visible in the logs, which is the intended trade-off for
//! best-effort caching.
//!
//! Writes without an explicit expiry use the adapter's configured default
//! expiry.

use tracing::{debug, warn};

use crate::errors::CacheError;
use crate::provider::BackendAdapter;

/// Handle to one registered cache instance
pub struct CacheClient {
    name: String,
    adapter: Box<dyn BackendAdapter>,
}

impl CacheClient {
    pub(crate) fn new(name: &str, adapter: Box<dyn BackendAdapter>) -> Self {
        Self {
            name: name.to_string(),
            adapter,
        }
    }

    /// Name this cache is registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Descriptor name of the backend serving this cache
    pub fn backend_name(&self) -> &'static str {
        self.adapter.backend_name()
    }

    /// Store a key-value pair with the default expiry
    pub async fn set(&self, key: &str, value: &str) {
        self.set_with_expiry(key, value, self.adapter.default_expiry())
            .await;
    }

    /// Store a key-value pair with an explicit expiry in seconds
    pub async fn set_with_expiry(&self, key: &str, value: &str, expiry: i64) {
        debug!(cache = %self.name, key = key, "Cache set");
        if let Err(e) = self.adapter.set(key, value, expiry).await {
            self.degraded("set", key, &e);
        }
    }

    /// Store a key-value pair with the default expiry, only when absent
    pub async fn add(&self, key: &str, value: &str) {
        self.add_with_expiry(key, value, self.adapter.default_expiry())
            .await;
    }

    /// Store a key-value pair with an explicit expiry, only when absent
    pub async fn add_with_expiry(&self, key: &str, value: &str, expiry: i64) {
        debug!(cache = %self.name, key = key, "Cache add");
        if let Err(e) = self.adapter.add(key, value, expiry).await {
            self.degraded("add", key, &e);
        }
    }

    /// Replace an existing value using the default expiry
    pub async fn replace(&self, key: &str, value: &str) {
        self.replace_with_expiry(key, value, self.adapter.default_expiry())
            .await;
    }

    /// Replace an existing value with an explicit expiry
    pub async fn replace_with_expiry(&self, key: &str, value: &str, expiry: i64) {
        debug!(cache = %self.name, key = key, "Cache replace");
        if let Err(e) = self.adapter.replace(key, value, expiry).await {
            self.degraded("replace", key, &e);
        }
    }

    /// Move a key's expiry to the given value in seconds
    pub async fn expire(&self, key: &str, expiry: i64) {
        if let Err(e) = self.adapter.expire(key, expiry).await {
            self.degraded("expire", key, &e);
        }
    }

    /// Refresh the expiry of the given keys to the default expiry
    pub async fn touch(&self, keys: &[&str]) {
        if let Err(e) = self.adapter.touch(keys).await {
            self.degraded("touch", "<multiple>", &e);
        }
    }

    /// Remove a key
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.adapter.delete(key).await {
            self.degraded("delete", key, &e);
        }
    }

    /// Read a key; `None` when absent, expired, or the backend failed
    pub async fn get(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        debug!(cache = %self.name, key = key, "Cache get");
        match self.adapter.get(key).await {
            Ok(value) => value,
            Err(e) => {
                self.degraded("get", key, &e);
                None
            }
        }
    }

    /// Increment the counter under `key` by `step`; `None` on failure
    pub async fn incr(&self, key: &str, step: i64) -> Option<i64> {
        if key.is_empty() {
            return None;
        }
        match self.adapter.incr(key, step).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.degraded("incr", key, &e);
                None
            }
        }
    }

    /// Decrement the counter under `key` by `step`; `None` on failure
    pub async fn decr(&self, key: &str, step: i64) -> Option<i64> {
        if key.is_empty() {
            return None;
        }
        match self.adapter.decr(key, step).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.degraded("decr", key, &e);
                None
            }
        }
    }

    /// Release the adapter's connections; idempotent
    pub async fn destroy(&self) {
        self.adapter.destroy().await;
    }

    fn degraded(&self, operation: &str, key: &str, error: &CacheError) {
        warn!(
            cache = %self.name,
            operation = operation,
            key = key,
            error = %error,
            "Cache operation degraded to neutral result"
        );
    }
}
