//! The guard every privileged operation is registered through.

use crate::error::AuthzError;
use crate::handler::Handler;
use crate::middleware::AuthorizationMiddleware;
use crate::pipeline::{Checkpoint, Gate, Pipeline, Target};
use crate::policy::{Policy, TrustLevel};
use crate::principal::AuthorizationContext;
use crate::rate_limit::RateLimitService;
use crate::resource::OwnerRegistry;
use crate::response::GuardResponse;
use crate::session::{AuthenticationService, CallContext};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info_span, warn, Instrument, Span};
use warden_audit_capture::{AuditLogger, DecisionReason, DecisionRecord};
use warden_common_config::WardenConfig;
use warden_common_core::{OperationId, PrincipalId};

/// Errors raised while registering operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("operation `{0}` is registered more than once")]
    DuplicateOperation(OperationId),

    #[error("operation id must not be empty")]
    EmptyOperationId,
}

struct Shared {
    auth: Arc<dyn AuthenticationService>,
    middleware: AuthorizationMiddleware,
    rate_limiter: Arc<RateLimitService>,
    audit: AuditLogger,
}

/// Builds guarded handlers that share one set of collaborators.
#[derive(Clone)]
pub struct AuthorizationWrapper {
    shared: Arc<Shared>,
}

impl AuthorizationWrapper {
    pub fn new(
        auth: Arc<dyn AuthenticationService>,
        middleware: AuthorizationMiddleware,
        rate_limiter: Arc<RateLimitService>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                auth,
                middleware,
                rate_limiter,
                audit,
            }),
        }
    }

    /// Wire a wrapper with rate limits taken from configuration.
    pub fn from_config(
        auth: Arc<dyn AuthenticationService>,
        owners: OwnerRegistry,
        config: &WardenConfig,
        audit: AuditLogger,
    ) -> Self {
        Self::new(
            auth,
            AuthorizationMiddleware::new(owners),
            Arc::new(RateLimitService::new(config.rate_limit.clone())),
            audit,
        )
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimitService> {
        &self.shared.rate_limiter
    }

    pub fn middleware(&self) -> &AuthorizationMiddleware {
        &self.shared.middleware
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.shared.audit
    }

    /// Guard `handler` behind `policy`.
    pub fn wrap<Req, Res, H>(
        &self,
        operation_id: impl Into<OperationId>,
        policy: Policy<Req>,
        handler: H,
    ) -> GuardedHandler<Req, Res>
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
        H: Handler<Req, Res>,
    {
        self.guard(operation_id.into(), policy, Arc::new(handler))
    }

    /// Guard every registration, one handler per operation id.
    pub fn batch_wrap<Req, Res>(
        &self,
        registrations: impl IntoIterator<Item = Registration<Req, Res>>,
    ) -> Result<OperationTable<Req, Res>, RegistrationError>
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        let mut handlers = HashMap::new();
        for registration in registrations {
            let Registration {
                operation_id,
                policy,
                handler,
            } = registration;

            if operation_id.as_str().trim().is_empty() {
                return Err(RegistrationError::EmptyOperationId);
            }
            if handlers.contains_key(operation_id.as_str()) {
                return Err(RegistrationError::DuplicateOperation(operation_id));
            }

            let guarded = self.guard(operation_id.clone(), policy, handler);
            handlers.insert(operation_id.into_inner(), guarded);
        }

        debug!(operations = handlers.len(), "Operations registered");
        Ok(OperationTable { handlers })
    }

    fn guard<Req, Res>(
        &self,
        operation_id: OperationId,
        policy: Policy<Req>,
        handler: Arc<dyn Handler<Req, Res>>,
    ) -> GuardedHandler<Req, Res>
    where
        Req: Send + Sync + 'static,
        Res: Send + 'static,
    {
        let pipeline = Pipeline::for_policy(&policy);
        if policy.trust_level() == TrustLevel::Public && policy.additional_check().is_some() {
            warn!(operation = %operation_id, "Additional check ignored for a public operation");
        }

        GuardedHandler {
            inner: Arc::new(Guarded {
                operation_id,
                policy,
                pipeline,
                handler,
                shared: Arc::clone(&self.shared),
            }),
        }
    }
}

impl fmt::Debug for AuthorizationWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationWrapper")
            .field("middleware", &self.shared.middleware)
            .field("audit", &self.shared.audit)
            .finish_non_exhaustive()
    }
}

/// One operation to register through [`AuthorizationWrapper::batch_wrap`].
pub struct Registration<Req, Res> {
    operation_id: OperationId,
    policy: Policy<Req>,
    handler: Arc<dyn Handler<Req, Res>>,
}

impl<Req, Res> Registration<Req, Res> {
    pub fn new(
        operation_id: impl Into<OperationId>,
        policy: Policy<Req>,
        handler: impl Handler<Req, Res>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            policy,
            handler: Arc::new(handler),
        }
    }
}

struct Guarded<Req, Res> {
    operation_id: OperationId,
    policy: Policy<Req>,
    pipeline: Pipeline,
    handler: Arc<dyn Handler<Req, Res>>,
    shared: Arc<Shared>,
}

/// A handler that only runs once its policy is satisfied.
pub struct GuardedHandler<Req, Res> {
    inner: Arc<Guarded<Req, Res>>,
}

impl<Req, Res> Clone for GuardedHandler<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Req, Res> fmt::Debug for GuardedHandler<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedHandler")
            .field("operation_id", &self.inner.operation_id)
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

impl<Req, Res> GuardedHandler<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    pub fn operation_id(&self) -> &OperationId {
        &self.inner.operation_id
    }

    pub fn trust_level(&self) -> TrustLevel {
        self.inner.pipeline.level()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Authorize and, if allowed, run the handler.
    pub async fn call(&self, request: Req, cx: &CallContext) -> GuardResponse<Res> {
        let inner = &self.inner;
        let span = info_span!(
            "guarded_call",
            operation = %inner.operation_id,
            level = %inner.pipeline.level(),
            request_id = cx.request_id.as_deref().unwrap_or_default(),
            principal_id = tracing::field::Empty,
        );

        async move {
            match inner.pipeline.level() {
                TrustLevel::Public => inner.call_public(request).await,
                TrustLevel::Authenticated | TrustLevel::Authorized | TrustLevel::Admin => {
                    inner.call_guarded(request, cx).await
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl<Req, Res> Guarded<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    async fn call_public(&self, request: Req) -> GuardResponse<Res> {
        let outcome = self
            .pipeline
            .run_anonymous(&self.shared.rate_limiter, &self.operation_id);
        if let ControlFlow::Break(denial) = outcome {
            warn!(reason = %denial.error.code(), "Public call denied");
            return GuardResponse::deny(&denial.error);
        }

        self.invoke(request, AuthorizationContext::anonymous()).await
    }

    async fn call_guarded(&self, request: Req, cx: &CallContext) -> GuardResponse<Res> {
        // Request content is only read once a principal is known.
        let Some(session_id) = cx.session_id.clone() else {
            return self
                .deny(AuthzError::AuthRequired, None, Target::default())
                .await;
        };

        let principal = match self.shared.auth.validate_session(&session_id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                return self
                    .deny(AuthzError::SessionInvalid, None, Target::default())
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed");
                return self
                    .deny(AuthzError::SessionInvalid, None, Target::default())
                    .await;
            }
        };
        Span::current().record("principal_id", principal.id.get());
        let target = self.resolve_target(&request);

        let gate = Gate {
            middleware: &self.shared.middleware,
            rate_limiter: &self.shared.rate_limiter,
        };
        let checkpoint = Checkpoint {
            operation_id: &self.operation_id,
            principal: &principal,
            request: &request,
            policy: &self.policy,
            target: &target,
        };
        if let ControlFlow::Break(denial) = self.pipeline.run(&gate, &checkpoint).await {
            return self.deny(denial.error, Some(principal.id), target).await;
        }

        match self.pipeline.level() {
            TrustLevel::Authorized => {
                let record = self.record(DecisionReason::Granted, Some(principal.id), target);
                self.shared.audit.log(record).await;
            }
            TrustLevel::Public | TrustLevel::Authenticated | TrustLevel::Admin => {}
        }
        debug!("Call granted");

        self.invoke(request, AuthorizationContext::authenticated(principal, session_id))
            .await
    }

    fn resolve_target(&self, request: &Req) -> Target {
        let Some(binding) = self.policy.resource() else {
            return Target::default();
        };

        let id = match panic::catch_unwind(AssertUnwindSafe(|| (binding.extractor)(request))) {
            Ok(id) => id,
            Err(_) => {
                warn!(resource_kind = %binding.kind, "Resource id extractor panicked");
                None
            }
        };
        Target {
            kind: Some(binding.kind.clone()),
            id,
        }
    }

    async fn deny(
        &self,
        error: AuthzError,
        principal_id: Option<PrincipalId>,
        target: Target,
    ) -> GuardResponse<Res> {
        let code = error.code();
        warn!(reason = %code, "Call denied");
        if let Some(reason) = code.audit_reason() {
            let record = self.record(reason, principal_id, target);
            self.shared.audit.log(record).await;
        }
        GuardResponse::deny(&error)
    }

    fn record(
        &self,
        reason: DecisionReason,
        principal_id: Option<PrincipalId>,
        target: Target,
    ) -> DecisionRecord {
        let mut builder =
            DecisionRecord::builder(self.operation_id.clone(), reason).maybe_principal(principal_id);
        if let Some(kind) = target.kind {
            builder = builder.resource_kind(kind.as_str());
        }
        if let Some(id) = target.id {
            builder = builder.resource_id(id);
        }
        builder.build()
    }

    async fn invoke(&self, request: Req, context: AuthorizationContext) -> GuardResponse<Res> {
        let handler = Arc::clone(&self.handler);
        let outcome = AssertUnwindSafe(async move { handler.call(request, context).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(data)) => GuardResponse::ok(data),
            Ok(Err(e)) => {
                error!(error = ?e, "Handler failed");
                GuardResponse::deny(&AuthzError::Internal)
            }
            Err(payload) => {
                error!(panic = panic_message(payload.as_ref()), "Handler panicked");
                GuardResponse::deny(&AuthzError::Internal)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Guarded handlers keyed by operation id.
pub struct OperationTable<Req, Res> {
    handlers: HashMap<String, GuardedHandler<Req, Res>>,
}

impl<Req, Res> OperationTable<Req, Res>
where
    Req: Send + Sync + 'static,
    Res: Send + 'static,
{
    pub fn get(&self, operation_id: &str) -> Option<&GuardedHandler<Req, Res>> {
        self.handlers.get(operation_id)
    }

    /// Route a call to its guarded handler. `None` for unregistered operations.
    pub async fn dispatch(
        &self,
        operation_id: &str,
        request: Req,
        cx: &CallContext,
    ) -> Option<GuardResponse<Res>> {
        let Some(handler) = self.handlers.get(operation_id) else {
            warn!(operation = operation_id, "Dispatch to unregistered operation");
            return None;
        };
        Some(handler.call(request, cx).await)
    }

    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.handlers.contains_key(operation_id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<Req, Res> fmt::Debug for OperationTable<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable")
            .field("operations", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Principal;
    use crate::session::MemorySessionStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use warden_audit_capture::MemorySink;

    fn wrapper(store: Arc<MemorySessionStore>) -> (AuthorizationWrapper, MemorySink) {
        let sink = MemorySink::new();
        let wrapper = AuthorizationWrapper::new(
            store,
            AuthorizationMiddleware::default(),
            Arc::new(RateLimitService::default()),
            AuditLogger::new(Arc::new(sink.clone())),
        );
        (wrapper, sink)
    }

    async fn echo(request: Value, _: AuthorizationContext) -> anyhow::Result<Value> {
        Ok(request)
    }

    #[tokio::test]
    async fn test_authenticated_call_receives_context() {
        let store = Arc::new(MemorySessionStore::default());
        store.upsert_principal(Principal::user(4));
        let session = store.create_session(PrincipalId::new(4)).unwrap();
        let (wrapper, sink) = wrapper(store);

        let guarded = wrapper.wrap(
            "profile:get",
            Policy::authenticated(),
            |_: Value, ctx: AuthorizationContext| async move { Ok(ctx.principal_id) },
        );
        let response = guarded
            .call(json!({}), &CallContext::with_session(session.id))
            .await;

        assert_eq!(response.data, Some(Some(PrincipalId::new(4))));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_missing_session_never_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (wrapper, sink) = wrapper(Arc::new(MemorySessionStore::default()));

        let counter = Arc::clone(&calls);
        let guarded = wrapper.wrap(
            "profile:get",
            Policy::authenticated(),
            move |request: Value, _: AuthorizationContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(request) }
            },
        );
        let response = guarded.call(json!({}), &CallContext::anonymous()).await;

        assert_eq!(response.code(), Some(crate::ErrorCode::AuthRequired));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_handler_error_is_internal() {
        let store = Arc::new(MemorySessionStore::default());
        store.upsert_principal(Principal::user(1));
        let session = store.create_session(PrincipalId::new(1)).unwrap();
        let (wrapper, sink) = wrapper(store);

        let guarded = wrapper.wrap(
            "cases:sync",
            Policy::authenticated(),
            |_: Value, _: AuthorizationContext| async move {
                Err::<Value, _>(anyhow::anyhow!("connect ECONNREFUSED 10.0.0.5:5432"))
            },
        );
        let response = guarded
            .call(json!({}), &CallContext::with_session(session.id))
            .await;

        assert_eq!(
            response.error.as_deref(),
            Some("An internal error occurred. Please try again later.")
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_batch_wrap_rejects_duplicates() {
        let (wrapper, _) = wrapper(Arc::new(MemorySessionStore::default()));
        let result = wrapper.batch_wrap(vec![
            Registration::new("cases:get", Policy::authenticated(), echo),
            Registration::new("cases:get", Policy::public(), echo),
        ]);

        assert_eq!(
            result.unwrap_err(),
            RegistrationError::DuplicateOperation(OperationId::from("cases:get"))
        );
    }

    #[test]
    fn test_batch_wrap_rejects_empty_id() {
        let (wrapper, _) = wrapper(Arc::new(MemorySessionStore::default()));
        let result = wrapper.batch_wrap(vec![Registration::new(" ", Policy::public(), echo)]);
        assert_eq!(result.unwrap_err(), RegistrationError::EmptyOperationId);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
