//! Per-operation authorization policies.

use crate::principal::Principal;
use crate::resource::ResourceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString};
use warden_common_core::ResourceId;

/// Minimum caller privilege an operation requires.
///
/// Ordered: `Public < Authenticated < Authorized < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustLevel {
    /// Anyone; the handler sees an anonymous context.
    Public,
    /// Any active principal with a valid session.
    Authenticated,
    /// An active principal that owns the targeted resource.
    Authorized,
    /// An active principal with the admin role.
    Admin,
}

/// Computes the targeted resource id from a request.
pub type ResourceExtractor<Req> = Arc<dyn Fn(&Req) -> Option<ResourceId> + Send + Sync>;

/// Resource kind plus the extractor that finds the targeted instance.
pub struct ResourceBinding<Req> {
    pub kind: ResourceKind,
    pub extractor: ResourceExtractor<Req>,
}

impl<Req> Clone for ResourceBinding<Req> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            extractor: Arc::clone(&self.extractor),
        }
    }
}

/// An extra predicate evaluated after the built-in checks.
#[async_trait]
pub trait AdditionalCheck<Req>: Send + Sync {
    /// `false` denies the call.
    async fn check(&self, principal: &Principal, request: &Req) -> bool;
}

#[async_trait]
impl<Req, F> AdditionalCheck<Req> for F
where
    Req: Sync,
    F: Fn(&Principal, &Req) -> bool + Send + Sync,
{
    async fn check(&self, principal: &Principal, request: &Req) -> bool {
        self(principal, request)
    }
}

/// Authorization requirements of one operation.
pub struct Policy<Req> {
    trust_level: TrustLevel,
    resource: Option<ResourceBinding<Req>>,
    rate_limited: bool,
    additional_check: Option<Arc<dyn AdditionalCheck<Req>>>,
    deny_message: Option<String>,
}

impl<Req> Policy<Req>
where
    Req: Send + Sync + 'static,
{
    fn with_level(trust_level: TrustLevel) -> Self {
        Self {
            trust_level,
            resource: None,
            rate_limited: false,
            additional_check: None,
            deny_message: None,
        }
    }

    /// Open to anyone.
    pub fn public() -> Self {
        Self::with_level(TrustLevel::Public)
    }

    /// Requires a valid session for an active principal.
    pub fn authenticated() -> Self {
        Self::with_level(TrustLevel::Authenticated)
    }

    /// Requires the caller to own the resource `extractor` picks out of the request.
    ///
    /// An extractor returning `None` denies the call.
    pub fn authorized<F, I>(kind: ResourceKind, extractor: F) -> Self
    where
        F: Fn(&Req) -> Option<I> + Send + Sync + 'static,
        I: Into<ResourceId>,
    {
        Self::with_level(TrustLevel::Authorized).with_resource(kind, extractor)
    }

    /// Requires the admin role. Always rate limited.
    pub fn admin() -> Self {
        Self::with_level(TrustLevel::Admin)
    }

    /// Attach a resource target. Required for `Authorized`; on other levels
    /// the target is only recorded on audit entries.
    pub fn with_resource<F, I>(mut self, kind: ResourceKind, extractor: F) -> Self
    where
        F: Fn(&Req) -> Option<I> + Send + Sync + 'static,
        I: Into<ResourceId>,
    {
        let extractor: ResourceExtractor<Req> =
            Arc::new(move |request: &Req| extractor(request).map(Into::<ResourceId>::into));
        self.resource = Some(ResourceBinding { kind, extractor });
        self
    }

    /// Count calls against the standard rate limit.
    pub fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    /// Add a predicate run after the built-in checks.
    pub fn with_check(mut self, check: impl AdditionalCheck<Req> + 'static) -> Self {
        self.additional_check = Some(Arc::new(check));
        self
    }

    /// Message returned when the additional check fails.
    pub fn deny_message(mut self, message: impl Into<String>) -> Self {
        self.deny_message = Some(message.into());
        self
    }
}

impl<Req> Policy<Req> {
    pub fn trust_level(&self) -> TrustLevel {
        self.trust_level
    }

    pub fn resource(&self) -> Option<&ResourceBinding<Req>> {
        self.resource.as_ref()
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    pub fn additional_check(&self) -> Option<&Arc<dyn AdditionalCheck<Req>>> {
        self.additional_check.as_ref()
    }

    pub fn custom_deny_message(&self) -> Option<&str> {
        self.deny_message.as_deref()
    }
}

impl<Req> Clone for Policy<Req> {
    fn clone(&self) -> Self {
        Self {
            trust_level: self.trust_level,
            resource: self.resource.clone(),
            rate_limited: self.rate_limited,
            additional_check: self.additional_check.clone(),
            deny_message: self.deny_message.clone(),
        }
    }
}

impl<Req> fmt::Debug for Policy<Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("trust_level", &self.trust_level)
            .field("resource_kind", &self.resource.as_ref().map(|r| &r.kind))
            .field("rate_limited", &self.rate_limited)
            .field("additional_check", &self.additional_check.is_some())
            .field("deny_message", &self.deny_message)
            .finish()
    }
}

/// Extractor reading a numeric or string id from a JSON object field.
///
/// Missing fields, nulls, empty strings and non-scalar values yield `None`.
pub fn json_field(name: &'static str) -> impl Fn(&Value) -> Option<ResourceId> + Send + Sync {
    move |request: &Value| match request.get(name)? {
        Value::Number(n) => Some(ResourceId::from(n.to_string())),
        Value::String(s) if !s.trim().is_empty() => Some(ResourceId::from(s.as_str())),
        _ => None,
    }
}
