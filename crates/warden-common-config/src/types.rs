//! Configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Rate limiting for guarded operations.
    pub rate_limit: RateLimitSettings,
    /// Audit trail settings.
    pub audit: AuditSettings,
    /// Session settings for the in-memory session store.
    pub session: SessionSettings,
}

/// A fixed-window request limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Requests allowed per window.
    pub max_requests: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

impl WindowSettings {
    /// Create a new window limit.
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate limit configuration, per operation class with per-operation overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Limit for non-admin operations that opt into rate limiting.
    pub standard: WindowSettings,
    /// Limit for admin-level operations (always rate limited).
    pub admin: WindowSettings,
    /// Overrides keyed by operation id.
    pub operations: HashMap<String, WindowSettings>,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            standard: WindowSettings::new(100, 15 * 60),
            admin: WindowSettings::new(20, 15 * 60),
            operations: HashMap::new(),
        }
    }
}

impl RateLimitSettings {
    /// Set the standard class limit.
    pub fn with_standard(mut self, max_requests: u32, window_secs: u64) -> Self {
        self.standard = WindowSettings::new(max_requests, window_secs);
        self
    }

    /// Set the admin class limit.
    pub fn with_admin(mut self, max_requests: u32, window_secs: u64) -> Self {
        self.admin = WindowSettings::new(max_requests, window_secs);
        self
    }

    /// Override the limit for a single operation.
    pub fn with_operation(
        mut self,
        operation: impl Into<String>,
        max_requests: u32,
        window_secs: u64,
    ) -> Self {
        self.operations
            .insert(operation.into(), WindowSettings::new(max_requests, window_secs));
        self
    }
}

/// Audit trail configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Bounded channel capacity for asynchronous audit capture.
    pub buffer_size: usize,
    /// Maximum records per persisted batch.
    pub batch_size: usize,
    /// Maximum batch age before flushing (ms).
    pub batch_age_ms: u64,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            buffer_size: 10_000,
            batch_size: 100,
            batch_age_ms: 1000,
        }
    }
}

/// Session store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 8 * 60 * 60,
        }
    }
}
