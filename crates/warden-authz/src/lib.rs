//! Authorization gatekeeper for privileged operations.
//!
//! Every remotely invocable operation is registered once through an
//! [`AuthorizationWrapper`] together with a [`Policy`]. The resulting
//! [`GuardedHandler`] resolves the caller's session from the per-call
//! [`CallContext`], runs the policy's [`Pipeline`] (active account,
//! ownership, admin role, rate limit, custom check, in that order) and only
//! then invokes the business handler. Denials and ownership-checked grants
//! are written to the audit trail; handler failures are reported to the
//! caller as a fixed generic message.
//!
//! ```ignore
//! let wrapper = AuthorizationWrapper::new(sessions, middleware, rate_limiter, audit);
//! let get_case = wrapper.wrap(
//!     "cases:get",
//!     Policy::authorized(CASE, json_field("caseId")),
//!     |request: Value, ctx: AuthorizationContext| async move { load_case(request, ctx).await },
//! );
//! let response = get_case.call(json!({"caseId": 10}), &CallContext::with_session(session_id)).await;
//! ```

pub mod error;
pub mod handler;
pub mod middleware;
pub mod pipeline;
pub mod policy;
pub mod principal;
pub mod rate_limit;
pub mod resource;
pub mod response;
pub mod session;
pub mod wrapper;

pub use error::{format_retry_after, AuthzError, ErrorCode, DEFAULT_CUSTOM_CHECK_MESSAGE};
pub use handler::Handler;
pub use middleware::AuthorizationMiddleware;
pub use pipeline::{Denial, Pipeline, Step, Target};
pub use policy::{json_field, AdditionalCheck, Policy, ResourceBinding, ResourceExtractor, TrustLevel};
pub use principal::{AuthorizationContext, Principal, Role, Session};
pub use rate_limit::{LimitClass, RateLimitDecision, RateLimitService, WindowLimit, PURGE_INTERVAL};
pub use resource::{LookupError, OwnerRegistry, ResourceKind, ResourceOwnerLookup};
pub use response::GuardResponse;
pub use session::{AuthenticationError, AuthenticationService, CallContext, MemorySessionStore};
pub use wrapper::{AuthorizationWrapper, GuardedHandler, OperationTable, Registration, RegistrationError};

pub use warden_common_core::{OperationId, PrincipalId, ResourceId, SessionId};
