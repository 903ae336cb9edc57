//! Backend adapter implementations

pub mod memory;

#[cfg(feature = "backend-redis")]
pub mod redis;

#[cfg(feature = "backend-memcached")]
pub mod memcached;

pub use memory::{MemoryBackend, MemoryBackendFactory};

#[cfg(feature = "backend-redis")]
pub use self::redis::{RedisBackend, RedisBackendFactory};

#[cfg(feature = "backend-memcached")]
pub use self::memcached::{MemcachedBackend, MemcachedBackendFactory};
