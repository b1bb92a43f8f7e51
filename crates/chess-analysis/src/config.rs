//! Analysis configuration loaded from TOML.
//!
//! ```toml
//! [engine]
//! path = "/usr/bin/stockfish"
//! depth = 12
//!
//! [pool]
//! size = 4
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is outside its allowed range.
    #[error("Invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings for one analysis engine process.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Path to the UCI engine executable. Defaults to "stockfish" (assumes it's in PATH).
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    /// Search depth for `go depth`.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Value for the engine's `Threads` option.
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Value for the engine's `Hash` option, in megabytes.
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
    /// Budget for a single position evaluation.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Budget for the startup handshake.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// How long to wait for the process to exit after `quit` before killing it.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}

fn default_depth() -> u32 {
    15
}

fn default_threads() -> u32 {
    2
}

fn default_hash_mb() -> u32 {
    128
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_grace_ms() -> u64 {
    500
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            depth: default_depth(),
            threads: default_threads(),
            hash_mb: default_hash_mb(),
            request_timeout_ms: default_request_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Settings for the shared engine pool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PoolConfig {
    /// Number of engine processes kept alive and reused.
    #[serde(default = "default_pool_size")]
    pub size: usize,
    /// Number of analyses allowed to wait for a free engine.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_pool_size() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    16
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl AnalysisConfig {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields the default configuration; an unreadable or
    /// malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine or pool cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.depth == 0 {
            return Err(ConfigError::Invalid {
                key: "engine.depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.engine.threads == 0 {
            return Err(ConfigError::Invalid {
                key: "engine.threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.engine.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "engine.request_timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.pool.size == 0 {
            return Err(ConfigError::Invalid {
                key: "pool.size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
