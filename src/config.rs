//! Configuration for hashsync
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, SyncError};

/// Main configuration shared by the server, the remote gateway and the synchronizer
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// Address of the store server the remote gateway connects to
    pub store_addr: String,

    /// Max idle connections kept by the remote gateway pool
    pub pool_size: usize,

    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Server Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Number of worker threads serving connections
    pub worker_threads: usize,

    /// How often the server drops expired keys (milliseconds)
    pub purge_interval_ms: u64,

    // -------------------------------------------------------------------------
    // Shared Socket Configuration
    // -------------------------------------------------------------------------
    /// Connection read timeout (milliseconds, 0 = none); the server also
    /// closes connections idle for this long
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Synchronizer Configuration
    // -------------------------------------------------------------------------
    /// How bounded increments keep the stored value inside its bound
    pub clamp_strategy: ClampStrategy,
}

/// Strategy for enforcing a bound on increment/decrement
///
/// Both strategies give the same outcome for the same stored value,
/// including steps that would leave the i64 range: those clamp to the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClampStrategy {
    /// Read, increment, then issue a corrective set on overshoot.
    ///
    /// Three store round-trips. Between the increment and the clamp the field
    /// can hold an out-of-range value; the bound holds once callers quiesce.
    #[default]
    Corrective,

    /// Ask the store for a single atomic bounded increment.
    ///
    /// Requires a gateway that implements `hash_increment_bounded`.
    Atomic,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_addr: "127.0.0.1:6380".to_string(),
            pool_size: 8,
            connect_timeout_ms: 2000,
            listen_addr: "127.0.0.1:6380".to_string(),
            max_connections: 1024,
            worker_threads: 8,
            purge_interval_ms: 1000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            clamp_strategy: ClampStrategy::Corrective,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check values that would make the server or pool unusable
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(SyncError::Config("pool_size must be at least 1".to_string()));
        }
        if self.worker_threads == 0 {
            return Err(SyncError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(SyncError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_millis(self.purge_interval_ms)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the store server address used by the remote gateway
    pub fn store_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.store_addr = addr.into();
        self
    }

    /// Set the number of pooled idle connections
    pub fn pool_size(mut self, size: usize) -> Self {
        self.config.pool_size = size;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the number of server worker threads
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.config.worker_threads = count;
        self
    }

    /// Set the expired-key purge interval (in milliseconds)
    pub fn purge_interval_ms(mut self, ms: u64) -> Self {
        self.config.purge_interval_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the bounded increment clamp strategy
    pub fn clamp_strategy(mut self, strategy: ClampStrategy) -> Self {
        self.config.clamp_strategy = strategy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
