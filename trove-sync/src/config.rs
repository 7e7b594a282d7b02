//! Sync configuration.
//!
//! Loaded from environment variables with defaults suitable for a single
//! client session.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trove_events::AuditConfig;

/// Default number of read-check-write runs per mutation.
pub const DEFAULT_MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Default buffered snapshots per live query before a listener lags.
pub const DEFAULT_SNAPSHOT_CHANNEL_CAPACITY: usize = 256;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Configuration for a sync session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Audit log settings.
    pub audit: AuditConfig,

    /// How many times a mutation's read-check-write may run before giving up.
    pub max_transaction_attempts: u32,

    /// Buffered snapshots per live query.
    pub snapshot_channel_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            audit: AuditConfig::default(),
            max_transaction_attempts: DEFAULT_MAX_TRANSACTION_ATTEMPTS,
            snapshot_channel_capacity: DEFAULT_SNAPSHOT_CHANNEL_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TROVE_AUDIT_ENABLED`: Whether to write audit events (default: true)
    /// - `TROVE_AUDIT_DEDUP_WINDOW_MS`: Duplicate window (default: 5000)
    /// - `TROVE_MAX_TRANSACTION_ATTEMPTS`: Read-check-write runs (default: 5)
    /// - `TROVE_SNAPSHOT_CHANNEL_CAPACITY`: Buffered snapshots (default: 256)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            audit: AuditConfig::from_env(),
            max_transaction_attempts: std::env::var("TROVE_MAX_TRANSACTION_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_transaction_attempts),
            snapshot_channel_capacity: std::env::var("TROVE_SNAPSHOT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.snapshot_channel_capacity),
        }
    }

    pub fn with_max_transaction_attempts(mut self, attempts: u32) -> Self {
        self.max_transaction_attempts = attempts;
        self
    }

    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_transaction_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TROVE_MAX_TRANSACTION_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.snapshot_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TROVE_SNAPSHOT_CHANNEL_CAPACITY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
