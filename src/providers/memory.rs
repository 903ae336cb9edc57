//! # In-Memory Backend
//!
//! Process-local backend keeping one store per configured endpoint. It is
//! always compiled, needs no network, and implements the same topology
//! routing as the networked backends — writes land on every node store,
//! reads consult only the read partition — which makes routing decisions
//! observable in tests and gives applications a zero-infrastructure backend
//! for development.
//!
//! Entries carry their own deadline and are reaped lazily on read, so no
//! background task is needed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
// tokio's Instant respects the test clock, so expiry is testable without
// real sleeps
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::errors::{CacheError, CacheResult};
use crate::provider::adapter::{resolve_password, BackendAdapter};
use crate::provider::topology::{self, TopologyMode};
use crate::provider::{BackendDescriptor, BackendFactory};
use crate::secret::SecretCodec;

const BACKEND_NAME: &str = "MemoryBackend";

/// Factory for [`MemoryBackend`] adapters
pub struct MemoryBackendFactory;

#[async_trait]
impl BackendFactory for MemoryBackendFactory {
    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            name: BACKEND_NAME,
            default_port: 0,
        }
    }

    async fn create(
        &self,
        config: &CacheConfig,
        codec: &dyn SecretCodec,
    ) -> CacheResult<Box<dyn BackendAdapter>> {
        // No authentication to perform, but an undecryptable password is
        // still a construction error, same as for the networked backends.
        resolve_password(config, codec)?;
        Ok(Box::new(MemoryBackend::new(config)))
    }
}

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    deadline: Option<Instant>,
}

impl MemoryEntry {
    fn new(value: String, expiry: i64) -> Self {
        Self {
            value,
            deadline: deadline_for(expiry),
        }
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn deadline_for(expiry: i64) -> Option<Instant> {
    if expiry > 0 {
        Some(Instant::now() + Duration::from_secs(expiry as u64))
    } else {
        None
    }
}

/// One simulated server node
struct MemoryNode {
    store: DashMap<String, MemoryEntry>,
}

/// In-memory backend adapter with per-endpoint node stores
pub struct MemoryBackend {
    nodes: Vec<Arc<MemoryNode>>,
    /// Indices into `nodes` forming the read partition
    read_nodes: Vec<usize>,
    default_expiry: i64,
    destroyed: AtomicBool,
}

impl MemoryBackend {
    /// Build the node stores for the configured topology
    pub fn new(config: &CacheConfig) -> Self {
        let nodes: Vec<Arc<MemoryNode>> = config
            .servers
            .iter()
            .map(|_| {
                Arc::new(MemoryNode {
                    store: DashMap::new(),
                })
            })
            .collect();
        let read_nodes = match topology::select_mode(&config.servers) {
            TopologyMode::Empty => Vec::new(),
            TopologyMode::Single => vec![0],
            TopologyMode::Cluster => {
                let flagged: Vec<usize> = config
                    .servers
                    .iter()
                    .enumerate()
                    .filter(|(_, endpoint)| endpoint.read_only)
                    .map(|(index, _)| index)
                    .collect();
                if flagged.is_empty() {
                    (0..config.servers.len()).collect()
                } else {
                    flagged
                }
            }
        };
        debug!(
            nodes = nodes.len(),
            read_nodes = read_nodes.len(),
            "Memory backend topology built"
        );
        Self {
            nodes,
            read_nodes,
            default_expiry: config.expire_time,
            destroyed: AtomicBool::new(false),
        }
    }

    fn unusable(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst) || self.nodes.is_empty()
    }

    /// First live entry found on the read partition
    fn read_entry(&self, key: &str) -> Option<MemoryEntry> {
        for index in &self.read_nodes {
            let node = &self.nodes[*index];
            if let Some(entry) = node.store.get(key) {
                if entry.is_expired() {
                    drop(entry);
                    node.store.remove(key);
                    continue;
                }
                return Some(entry.clone());
            }
        }
        None
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn default_expiry(&self) -> i64 {
        self.default_expiry
    }

    async fn set(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()> {
        if self.unusable() {
            return Ok(());
        }
        for node in &self.nodes {
            node.store
                .insert(key.to_string(), MemoryEntry::new(value.to_string(), expiry));
        }
        Ok(())
    }

    async fn add(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()> {
        if self.unusable() {
            return Ok(());
        }
        for node in &self.nodes {
            let absent = node
                .store
                .get(key)
                .map_or(true, |entry| entry.is_expired());
            if absent {
                node.store
                    .insert(key.to_string(), MemoryEntry::new(value.to_string(), expiry));
            }
        }
        Ok(())
    }

    async fn replace(&self, key: &str, value: &str, expiry: i64) -> CacheResult<()> {
        if self.unusable() {
            return Ok(());
        }
        for node in &self.nodes {
            let present = node
                .store
                .get(key)
                .is_some_and(|entry| !entry.is_expired());
            if present {
                node.store
                    .insert(key.to_string(), MemoryEntry::new(value.to_string(), expiry));
            }
        }
        Ok(())
    }

    async fn expire(&self, key: &str, expiry: i64) -> CacheResult<()> {
        if self.unusable() {
            return Ok(());
        }
        for node in &self.nodes {
            if let Some(mut entry) = node.store.get_mut(key) {
                entry.deadline = deadline_for(expiry);
            }
        }
        Ok(())
    }

    async fn touch(&self, keys: &[&str]) -> CacheResult<()> {
        if self.unusable() {
            return Ok(());
        }
        for key in keys {
            for node in &self.nodes {
                if let Some(mut entry) = node.store.get_mut(*key) {
                    entry.deadline = deadline_for(self.default_expiry);
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        if self.unusable() {
            return Ok(());
        }
        for node in &self.nodes {
            node.store.remove(key);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        if self.unusable() {
            return Ok(None);
        }
        Ok(self.read_entry(key).map(|entry| entry.value))
    }

    async fn incr(&self, key: &str, step: i64) -> CacheResult<i64> {
        self.apply_step(key, step).await
    }

    async fn decr(&self, key: &str, step: i64) -> CacheResult<i64> {
        self.apply_step(key, -step).await
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        for node in &self.nodes {
            node.store.clear();
        }
        debug!("Memory backend destroyed");
    }
}

impl MemoryBackend {
    /// Counter update on the read partition, mirroring how the networked
    /// backends route incr/decr
    async fn apply_step(&self, key: &str, step: i64) -> CacheResult<i64> {
        if self.unusable() {
            return Err(CacheError::Backend(
                "Memory backend has no usable topology".to_string(),
            ));
        }
        let mut result = None;
        for index in &self.read_nodes {
            let node = &self.nodes[*index];
            let current = match node.store.get(key) {
                Some(entry) if !entry.is_expired() => {
                    entry.value.parse::<i64>().map_err(|_| {
                        CacheError::Backend(format!(
                            "Value under key '{key}' is not an integer"
                        ))
                    })?
                }
                _ => 0,
            };
            let updated = current + step;
            let deadline = node.store.get(key).and_then(|entry| entry.deadline);
            node.store.insert(
                key.to_string(),
                MemoryEntry {
                    value: updated.to_string(),
                    deadline,
                },
            );
            result.get_or_insert(updated);
        }
        result.ok_or_else(|| {
            warn!(key = key, "Counter update had no read node to land on");
            CacheError::Backend("No read nodes available".to_string())
        })
    }
}
