//! # Cache Configuration
//!
//! Declarative description of one cache instance: which backend serves it,
//! how its connection pool is sized, how stored credentials are protected,
//! and the ordered list of server endpoints behind it.
//!
//! A `CacheConfig` is plain serializable data. It is assembled through
//! [`CacheConfigBuilder`](crate::config::CacheConfigBuilder), handed to
//! [`CacheManager::register`](crate::manager::CacheManager::register), and
//! treated as immutable from that point on. Serialization (JSON/TOML/...)
//! must round-trip every field including server order, which is why the
//! struct carries nothing but owned values and a `Vec` of endpoints.

mod builder;

pub use builder::CacheConfigBuilder;

use serde::{Deserialize, Serialize};

/// Default values for every tunable field
///
/// A builder setter receiving a non-positive value resets its field to the
/// matching constant here.
pub mod defaults {
    /// Connect/borrow timeout in seconds
    pub const CONNECT_TIMEOUT: i32 = 1;
    /// Default entry expiry in seconds; -1 means never expire
    pub const EXPIRE_TIME: i64 = -1;
    /// Idle connections kept per pool
    pub const CLIENT_POOL_SIZE: u32 = 5;
    /// Hard cap on concurrently borrowed connections
    pub const MAXIMUM_CLIENT: u32 = 500;
    /// Bounded retry budget for borrow liveness / cluster failover
    pub const RETRY_COUNT: u32 = 3;
    /// Relative server weight
    pub const SERVER_WEIGHT: u32 = 1;
}

fn default_connect_timeout() -> i32 {
    defaults::CONNECT_TIMEOUT
}

fn default_expire_time() -> i64 {
    defaults::EXPIRE_TIME
}

fn default_client_pool_size() -> u32 {
    defaults::CLIENT_POOL_SIZE
}

fn default_maximum_client() -> u32 {
    defaults::MAXIMUM_CLIENT
}

fn default_retry_count() -> u32 {
    defaults::RETRY_COUNT
}

fn default_server_weight() -> u32 {
    defaults::SERVER_WEIGHT
}

/// One cache server endpoint
///
/// Identity is the (address, port) pair, address compared case-insensitively.
/// The owning [`CacheConfig`] keeps endpoints unique on that identity;
/// [`CacheConfigBuilder::upsert_server`] updates weight/read-only in place
/// instead of appending a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub address: String,
    /// Port 0 resolves to the backend descriptor's default port at
    /// topology-build time
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_server_weight")]
    pub weight: u32,
    #[serde(default)]
    pub read_only: bool,
}

impl ServerEndpoint {
    /// Whether this endpoint is identified by the given (address, port) pair
    pub fn matches(&self, address: &str, port: u16) -> bool {
        self.address.eq_ignore_ascii_case(address) && self.port == port
    }
}

/// Declarative configuration of a single cache instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Registered backend name, resolved through the provider registry
    #[serde(default)]
    pub backend_name: String,
    /// Secret profile protecting the stored password; empty means the
    /// password field holds plaintext
    #[serde(default)]
    pub secret_profile: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: i32,
    /// Default expiry applied by set/add/replace when no explicit expiry is
    /// given; -1 means entries never expire
    #[serde(default = "default_expire_time")]
    pub expire_time: i64,
    #[serde(default = "default_client_pool_size")]
    pub client_pool_size: u32,
    #[serde(default = "default_maximum_client")]
    pub maximum_client: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub username: String,
    /// Plaintext, or base64 ciphertext when `secret_profile` is set
    #[serde(default)]
    pub password: String,
    /// Ordered server list; order is preserved across serialization
    #[serde(default)]
    pub servers: Vec<ServerEndpoint>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend_name: String::new(),
            secret_profile: String::new(),
            connect_timeout: defaults::CONNECT_TIMEOUT,
            expire_time: defaults::EXPIRE_TIME,
            client_pool_size: defaults::CLIENT_POOL_SIZE,
            maximum_client: defaults::MAXIMUM_CLIENT,
            retry_count: defaults::RETRY_COUNT,
            username: String::new(),
            password: String::new(),
            servers: Vec::new(),
        }
    }
}
