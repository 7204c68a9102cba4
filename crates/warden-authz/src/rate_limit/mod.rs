//! In-process rate limiting for guarded operations.

mod window;

pub use window::{FixedWindow, RateLimitDecision, WindowLimit};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::Instant;
use tracing::debug;
use warden_common_config::RateLimitSettings;
use warden_common_core::{OperationId, PrincipalId};

/// Which configured limit an operation falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitClass {
    Standard,
    Admin,
}

/// Elapsed windows are swept once every this many checks.
pub const PURGE_INTERVAL: u64 = 1024;

/// Fixed-window counters keyed by operation and principal.
///
/// [`check`](Self::check) is synchronous: the counter update commits before
/// the caller reaches its next await point. Every [`PURGE_INTERVAL`] checks
/// the map drops windows that have elapsed, so idle keys do not accumulate.
#[derive(Debug)]
pub struct RateLimitService {
    buckets: DashMap<String, FixedWindow>,
    settings: RateLimitSettings,
    checks: AtomicU64,
}

impl RateLimitService {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            buckets: DashMap::new(),
            settings,
            checks: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Bucket key for a call. Anonymous callers share one bucket per operation.
    pub fn key(operation_id: &OperationId, principal_id: Option<PrincipalId>) -> String {
        match principal_id {
            Some(id) => format!("{}:{}", operation_id, id),
            None => format!("{}:anonymous", operation_id),
        }
    }

    /// Limit for an operation: its override if configured, else its class default.
    pub fn limit_for(&self, operation_id: &OperationId, class: LimitClass) -> WindowLimit {
        if let Some(settings) = self.settings.operations.get(operation_id.as_str()) {
            return (*settings).into();
        }
        match class {
            LimitClass::Standard => self.settings.standard.into(),
            LimitClass::Admin => self.settings.admin.into(),
        }
    }

    /// Count one request against `key`.
    pub fn check(&self, key: &str, limit: &WindowLimit) -> RateLimitDecision {
        self.check_at(key, limit, Instant::now())
    }

    /// Count one request against `key` at `now`.
    pub fn check_at(&self, key: &str, limit: &WindowLimit, now: Instant) -> RateLimitDecision {
        let decision = match self.buckets.entry(key.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().record(now, limit),
            Entry::Vacant(entry) => {
                entry.insert(FixedWindow::open(now, limit));
                RateLimitDecision::allow()
            }
        };

        if !decision.allowed {
            debug!(key = %key, remaining = ?decision.remaining, "Rate limit exceeded");
        }

        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_INTERVAL == PURGE_INTERVAL - 1 {
            let purged = self.purge_expired_at(now);
            if purged > 0 {
                debug!(purged, "Elapsed rate limit windows dropped");
            }
        }
        decision
    }

    /// Drop every elapsed window, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Drop every window elapsed at `now`.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, window| !window.is_expired(now));
        before.saturating_sub(self.buckets.len())
    }

    /// Forget the window for `key`.
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }

    /// Number of tracked keys.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for RateLimitService {
    fn default() -> Self {
        Self::new(RateLimitSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    fn limit(max_requests: u32) -> WindowLimit {
        WindowLimit::new(max_requests, Duration::from_secs(15 * 60))
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_elapsing() {
        let service = RateLimitService::default();
        let limit = limit(2);

        assert!(service.check("op:1", &limit).allowed);
        assert!(service.check("op:1", &limit).allowed);
        let denied = service.check("op:1", &limit);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, Some(Duration::from_secs(900)));

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(
            service.check("op:1", &limit).remaining,
            Some(Duration::from_secs(600))
        );

        tokio::time::advance(Duration::from_secs(600)).await;
        assert!(service.check("op:1", &limit).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let service = RateLimitService::default();
        let limit = limit(1);

        assert!(service.check("op:1", &limit).allowed);
        assert!(!service.check("op:1", &limit).allowed);
        assert!(service.check("op:2", &limit).allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let service = RateLimitService::default();
        service.check("op:1", &WindowLimit::new(5, Duration::from_secs(10)));
        service.check("op:2", &WindowLimit::new(5, Duration::from_secs(100)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(service.purge_expired(), 1);
        assert_eq!(service.bucket_count(), 1);
    }

    #[test]
    fn test_check_sweeps_elapsed_windows() {
        let service = RateLimitService::default();
        let start = Instant::now();
        let short = WindowLimit::new(5, Duration::from_secs(10));
        let long = WindowLimit::new(u32::MAX, Duration::from_secs(900));

        service.check_at("op:idle", &short, start);
        let later = start + Duration::from_secs(20);
        for _ in 1..PURGE_INTERVAL - 1 {
            service.check_at("op:busy", &long, later);
        }
        assert_eq!(service.bucket_count(), 2);

        service.check_at("op:busy", &long, later);
        assert_eq!(service.bucket_count(), 1);
        assert!(service.check_at("op:idle", &short, later).allowed);
    }

    #[test]
    fn test_limit_for_prefers_operation_override() {
        let settings = RateLimitSettings::default()
            .with_admin(5, 60)
            .with_operation("cases:export", 2, 30);
        let service = RateLimitService::new(settings);

        assert_eq!(
            service.limit_for(&OperationId::from("cases:export"), LimitClass::Admin),
            WindowLimit::new(2, Duration::from_secs(30))
        );
        assert_eq!(
            service.limit_for(&OperationId::from("users:delete"), LimitClass::Admin),
            WindowLimit::new(5, Duration::from_secs(60))
        );
        assert_eq!(
            service.limit_for(&OperationId::from("cases:list"), LimitClass::Standard),
            WindowLimit::new(100, Duration::from_secs(900))
        );
    }

    #[test]
    fn test_key_format() {
        let op = OperationId::from("cases:get");
        assert_eq!(RateLimitService::key(&op, Some(PrincipalId::new(7))), "cases:get:7");
        assert_eq!(RateLimitService::key(&op, None), "cases:get:anonymous");
    }

    proptest! {
        #[test]
        fn test_first_n_allowed_then_denied(max in 1u32..50, extra in 1u32..10) {
            let service = RateLimitService::default();
            let limit = limit(max);
            let now = Instant::now();

            for _ in 0..max {
                prop_assert!(service.check_at("k", &limit, now).allowed);
            }
            for _ in 0..extra {
                let decision = service.check_at("k", &limit, now);
                prop_assert!(!decision.allowed);
                prop_assert_eq!(decision.remaining, Some(limit.window));
            }
        }
    }
}
