//! Cache error types

use thiserror::Error;

/// Errors raised while configuring, constructing, or driving a cache backend
///
/// Only `Configuration` and `Construction` ever reach the application: they
/// surface as a `false` return from [`crate::manager::CacheManager::register`].
/// Every other variant is absorbed at the [`crate::client::CacheClient`]
/// boundary and degraded to a neutral result.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid or incomplete cache configuration
    #[error("Cache configuration error: {0}")]
    Configuration(String),

    /// Backend adapter could not be constructed
    #[error("Cache construction error: {0}")]
    Construction(String),

    /// Failed to connect to or borrow a connection for a cache backend
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Cache operation timed out
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
