//! Resource ownership lookups.

use async_trait::async_trait;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use warden_common_core::{PrincipalId, ResourceId};

/// Kind of resource an AUTHORIZED operation targets, e.g. `CASE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKind(Cow<'static, str>);

impl ResourceKind {
    /// A kind from a static name.
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// A kind from an owned name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors raised by an ownership lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("resource store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only owner lookup for one resource kind.
#[async_trait]
pub trait ResourceOwnerLookup: Send + Sync {
    /// Owner of `resource_id`, or `None` if it does not exist.
    async fn owner_of(&self, resource_id: &ResourceId) -> Result<Option<PrincipalId>, LookupError>;
}

/// Ownership lookups keyed by resource kind.
#[derive(Default, Clone)]
pub struct OwnerRegistry {
    lookups: HashMap<ResourceKind, Arc<dyn ResourceOwnerLookup>>,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the lookup for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: ResourceKind, lookup: Arc<dyn ResourceOwnerLookup>) {
        self.lookups.insert(kind, lookup);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, kind: ResourceKind, lookup: Arc<dyn ResourceOwnerLookup>) -> Self {
        self.register(kind, lookup);
        self
    }

    pub fn get(&self, kind: &ResourceKind) -> Option<&Arc<dyn ResourceOwnerLookup>> {
        self.lookups.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &ResourceKind> {
        self.lookups.keys()
    }
}

impl fmt::Debug for OwnerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerRegistry")
            .field("kinds", &self.lookups.keys().collect::<Vec<_>>())
            .finish()
    }
}
