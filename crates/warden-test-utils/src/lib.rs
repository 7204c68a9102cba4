//! Test utilities for Warden crates.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use warden_audit_capture::{AuditLogger, DecisionRecord, MemorySink};
use warden_authz::{
    AuthorizationMiddleware, AuthorizationWrapper, CallContext, LookupError, MemorySessionStore,
    OwnerRegistry, Principal, RateLimitService, ResourceKind, ResourceOwnerLookup,
};
use warden_common_config::RateLimitSettings;
use warden_common_core::{PrincipalId, ResourceId};

/// Resource kind registered by [`Fixture`].
pub const CASE: ResourceKind = ResourceKind::from_static("CASE");

/// Route test output through the log crate's test subscriber.
pub fn init_tracing() {
    warden_common_log::init_for_tests();
}

/// Creates a temporary directory that is cleaned up on drop.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Writes `content` to `.warden/config.yaml` inside a fresh temp dir.
pub fn temp_config(content: &str) -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let path = dir.path().join(".warden").join("config.yaml");
    std::fs::create_dir_all(path.parent().expect("config path has a parent"))
        .expect("Failed to create config dir");
    std::fs::write(&path, content).expect("Failed to write config");
    (dir, path)
}

/// Owner lookup backed by a map, counting how often it is consulted.
#[derive(Debug, Default)]
pub struct MemoryOwnerLookup {
    owners: RwLock<HashMap<ResourceId, PrincipalId>>,
    calls: AtomicUsize,
}

impl MemoryOwnerLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(self, resource: impl Into<ResourceId>, owner: impl Into<PrincipalId>) -> Self {
        self.insert(resource, owner);
        self
    }

    pub fn insert(&self, resource: impl Into<ResourceId>, owner: impl Into<PrincipalId>) {
        self.owners.write().insert(resource.into(), owner.into());
    }

    /// Number of `owner_of` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceOwnerLookup for MemoryOwnerLookup {
    async fn owner_of(&self, resource_id: &ResourceId) -> Result<Option<PrincipalId>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.owners.read().get(resource_id).copied())
    }
}

/// A wrapper wired to in-memory sessions, a `CASE` owner lookup and a
/// recording audit sink.
pub struct Fixture {
    pub sessions: Arc<MemorySessionStore>,
    pub cases: Arc<MemoryOwnerLookup>,
    pub sink: MemorySink,
    pub audit: AuditLogger,
    pub rate_limiter: Arc<RateLimitService>,
    pub wrapper: AuthorizationWrapper,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_rate_limits(RateLimitSettings::default())
    }

    pub fn with_rate_limits(settings: RateLimitSettings) -> Self {
        let sessions = Arc::new(MemorySessionStore::default());
        let cases = Arc::new(MemoryOwnerLookup::new());
        let sink = MemorySink::new();
        let audit = AuditLogger::new(Arc::new(sink.clone()));
        let rate_limiter = Arc::new(RateLimitService::new(settings));

        let owners = OwnerRegistry::new().with(CASE, cases.clone());
        let wrapper = AuthorizationWrapper::new(
            sessions.clone(),
            AuthorizationMiddleware::new(owners),
            rate_limiter.clone(),
            audit.clone(),
        );

        Self {
            sessions,
            cases,
            sink,
            audit,
            rate_limiter,
            wrapper,
        }
    }

    /// Store `principal` and return a call context carrying a fresh session.
    pub fn login(&self, principal: Principal) -> CallContext {
        let id = principal.id;
        self.sessions.upsert_principal(principal);
        let session = self
            .sessions
            .create_session(id)
            .expect("principal was just stored");
        CallContext::with_session(session.id)
    }

    /// Record `owner` as the owner of case `case_id`.
    pub fn own_case(&self, owner: impl Into<PrincipalId>, case_id: impl Into<ResourceId>) {
        self.cases.insert(case_id, owner);
    }

    /// Audit records written so far.
    pub fn records(&self) -> Vec<DecisionRecord> {
        self.sink.records()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that a Result is Ok and return the value.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
}

/// Assert that a Result is Err.
#[macro_export]
macro_rules! assert_err {
    ($expr:expr) => {
        match $expr {
            Ok(v) => panic!("Expected Err, got Ok: {:?}", v),
            Err(_) => {}
        }
    };
}

/// Assert that a guard response is a denial with the given code.
#[macro_export]
macro_rules! assert_denied {
    ($response:expr, $code:expr) => {{
        let response = &$response;
        assert!(!response.success, "Expected denial, got {:?}", response);
        assert!(response.data.is_none(), "Denial carried data: {:?}", response);
        assert_eq!(response.code(), Some($code));
    }};
}

/// Assert that a guard response succeeded and return its data.
#[macro_export]
macro_rules! assert_granted {
    ($response:expr) => {{
        let response = $response;
        assert!(response.success, "Expected success, got {:?}", response);
        match response.data {
            Some(data) => data,
            None => panic!("Successful response without data"),
        }
    }};
}
