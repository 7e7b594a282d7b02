//! Audit log
//!
//! Applies the write policy and the duplicate window, then appends. Writes
//! are best-effort: callers that describe a mutation use
//! [`AuditLog::record_detached`] so a failed audit never affects the
//! mutation itself.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::policy::WritePolicy;
use crate::store::{AuditResult, AuditStore};
use crate::types::AuditEvent;

/// Default duplicate window in milliseconds.
pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 5_000;

/// Audit log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether events are written at all.
    pub enabled: bool,

    /// Window in which an identical event to the latest one is dropped.
    pub dedup_window_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
        }
    }
}

impl AuditConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TROVE_AUDIT_ENABLED`: Whether to write audit events (default: true)
    /// - `TROVE_AUDIT_DEDUP_WINDOW_MS`: Duplicate window (default: 5000)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            enabled: std::env::var("TROVE_AUDIT_ENABLED")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.enabled),
            dedup_window_ms: std::env::var("TROVE_AUDIT_DEDUP_WINDOW_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.dedup_window_ms),
        }
    }

    /// The duplicate window as a duration.
    pub fn dedup_window(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.dedup_window_ms).unwrap_or(i64::MAX))
    }
}

/// Result of a [`AuditLog::record`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Event appended with this id.
    Recorded(Uuid),
    /// Event type outside the write policy, or audit disabled.
    Skipped,
    /// Identical to the container's latest event inside the window.
    Duplicate,
}

impl RecordOutcome {
    /// `true` for both policy skips and duplicates.
    pub fn is_skipped(&self) -> bool {
        !matches!(self, RecordOutcome::Recorded(_))
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RecordOutcome::Duplicate)
    }
}

/// Audit log statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditStats {
    /// Events appended
    pub recorded: u64,
    /// Events outside the write policy
    pub skipped: u64,
    /// Events dropped by the duplicate window
    pub duplicates: u64,
    /// Writes that failed against the store
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    recorded: AtomicU64,
    skipped: AtomicU64,
    duplicates: AtomicU64,
    failed: AtomicU64,
}

/// Append-only audit log with policy filter and duplicate window.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use trove_events::{AuditLog, MemoryAuditStore};
/// use uuid::Uuid;
///
/// async fn example() {
///     let log = AuditLog::new(Arc::new(MemoryAuditStore::new()));
///     let outcome = log
///         .record(Uuid::now_v7(), "ITEM_VIEWED", Uuid::now_v7(), json!({}))
///         .await
///         .unwrap();
///     assert!(!outcome.is_skipped());
/// }
/// ```
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    policy: WritePolicy,
    config: AuditConfig,
    counters: Counters,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish()
    }
}

impl AuditLog {
    /// Create a log over `store` with the system clock and default policy.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy: WritePolicy::default(),
            config: AuditConfig::default(),
            counters: Counters::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config(mut self, config: AuditConfig) -> Self {
        self.config = config;
        self
    }

    /// Record an event.
    ///
    /// The duplicate check looks only at the container's single most recent
    /// event. It guards against a client replaying the same emit, not
    /// against concurrent writers on several devices.
    pub async fn record(
        &self,
        container_id: Uuid,
        event_type: &str,
        actor_id: Uuid,
        payload: serde_json::Value,
    ) -> AuditResult<RecordOutcome> {
        if !self.config.enabled || !self.policy.allows(event_type) {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(event_type, %container_id, "Audit event skipped by policy");
            return Ok(RecordOutcome::Skipped);
        }

        let now = self.clock.now();
        let event = AuditEvent::new(container_id, event_type, actor_id, payload, now);

        let latest = self.store.latest(container_id).await.map_err(|e| {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            e
        })?;
        if let Some(latest) = latest {
            if latest.fingerprint == event.fingerprint
                && now - latest.created_at < self.config.dedup_window()
            {
                self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    event_type,
                    %container_id,
                    fingerprint = event.fingerprint,
                    "Duplicate audit event dropped"
                );
                return Ok(RecordOutcome::Duplicate);
            }
        }

        if let Err(e) = self.store.append(&event).await {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        self.counters.recorded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(event_type, %container_id, event_id = %event.id, "Audit event recorded");

        Ok(RecordOutcome::Recorded(event.id))
    }

    /// Record without waiting.
    ///
    /// The write runs as its own task; its outcome is logged and never
    /// reaches the caller. The handle is returned only so tests can join it.
    pub fn record_detached(
        self: &Arc<Self>,
        container_id: Uuid,
        event_type: impl Into<String>,
        actor_id: Uuid,
        payload: serde_json::Value,
    ) -> JoinHandle<()> {
        let log = Arc::clone(self);
        let event_type = event_type.into();
        tokio::spawn(async move {
            match log.record(container_id, &event_type, actor_id, payload).await {
                Ok(outcome) => {
                    tracing::trace!(event_type = %event_type, ?outcome, "Detached audit write finished");
                }
                Err(e) => {
                    tracing::warn!(error = %e, event_type = %event_type, %container_id, "Audit write failed");
                }
            }
        })
    }

    /// Get audit log stats.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}
