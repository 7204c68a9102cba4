//! The ordered checks a guarded call passes through.

use crate::error::AuthzError;
use crate::middleware::AuthorizationMiddleware;
use crate::policy::{Policy, TrustLevel};
use crate::principal::Principal;
use crate::rate_limit::{LimitClass, RateLimitService};
use crate::resource::ResourceKind;
use futures::FutureExt;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use tracing::warn;
use warden_common_core::{OperationId, PrincipalId, ResourceId};

/// One check in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Active,
    Ownership,
    AdminRole,
    RateLimit(LimitClass),
    CustomCheck,
}

/// A check that stopped the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub step: Step,
    pub error: AuthzError,
}

/// The resource a call targets, as far as it could be determined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub kind: Option<ResourceKind>,
    pub id: Option<ResourceId>,
}

/// Collaborators the steps consult.
pub(crate) struct Gate<'a> {
    pub middleware: &'a AuthorizationMiddleware,
    pub rate_limiter: &'a RateLimitService,
}

/// What the steps see about one call.
pub(crate) struct Checkpoint<'a, Req> {
    pub operation_id: &'a OperationId,
    pub principal: &'a Principal,
    pub request: &'a Req,
    pub policy: &'a Policy<Req>,
    pub target: &'a Target,
}

/// Steps for one operation, fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    level: TrustLevel,
    steps: Vec<Step>,
}

impl Pipeline {
    /// Derive the steps for a policy.
    ///
    /// Order is always active, ownership, admin role, rate limit, custom check.
    /// Public operations only ever get a rate-limit step.
    pub fn for_policy<Req>(policy: &Policy<Req>) -> Self {
        let level = policy.trust_level();
        let (mut steps, class, always_limited) = match level {
            TrustLevel::Public => (Vec::new(), LimitClass::Standard, false),
            TrustLevel::Authenticated => (vec![Step::Active], LimitClass::Standard, false),
            TrustLevel::Authorized => (
                vec![Step::Active, Step::Ownership],
                LimitClass::Standard,
                false,
            ),
            TrustLevel::Admin => (vec![Step::Active, Step::AdminRole], LimitClass::Admin, true),
        };

        if policy.is_rate_limited() || always_limited {
            steps.push(Step::RateLimit(class));
        }

        let has_principal = match level {
            TrustLevel::Public => false,
            TrustLevel::Authenticated | TrustLevel::Authorized | TrustLevel::Admin => true,
        };
        if has_principal && policy.additional_check().is_some() {
            steps.push(Step::CustomCheck);
        }

        Self { level, steps }
    }

    pub fn level(&self) -> TrustLevel {
        self.level
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step for an authenticated caller, stopping at the first denial.
    pub(crate) async fn run<Req>(
        &self,
        gate: &Gate<'_>,
        call: &Checkpoint<'_, Req>,
    ) -> ControlFlow<Denial>
    where
        Req: Send + Sync + 'static,
    {
        for step in &self.steps {
            if let ControlFlow::Break(error) = run_step(*step, gate, call).await {
                return ControlFlow::Break(Denial { step: *step, error });
            }
        }
        ControlFlow::Continue(())
    }

    /// Run the rate-limit step, if any, for an anonymous caller.
    pub(crate) fn run_anonymous(
        &self,
        rate_limiter: &RateLimitService,
        operation_id: &OperationId,
    ) -> ControlFlow<Denial> {
        for step in &self.steps {
            if let Step::RateLimit(class) = *step {
                if let ControlFlow::Break(error) =
                    count_request(rate_limiter, operation_id, None, class)
                {
                    return ControlFlow::Break(Denial { step: *step, error });
                }
            }
        }
        ControlFlow::Continue(())
    }
}

async fn run_step<Req>(step: Step, gate: &Gate<'_>, call: &Checkpoint<'_, Req>) -> ControlFlow<AuthzError>
where
    Req: Send + Sync + 'static,
{
    let outcome = match step {
        Step::Active => gate.middleware.verify_active(call.principal),
        Step::Ownership => match (&call.target.kind, &call.target.id) {
            (Some(kind), Some(id)) => {
                gate.middleware
                    .verify_ownership(kind, id, call.principal.id)
                    .await
            }
            _ => Err(AuthzError::AccessDenied),
        },
        Step::AdminRole => gate.middleware.verify_admin_role(call.principal),
        Step::RateLimit(class) => {
            return count_request(gate.rate_limiter, call.operation_id, Some(call.principal.id), class);
        }
        Step::CustomCheck => match call.policy.additional_check() {
            Some(check) => {
                let passed = AssertUnwindSafe(check.check(call.principal, call.request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        warn!(operation = %call.operation_id, "Additional check panicked");
                        false
                    });
                if passed {
                    Ok(())
                } else {
                    Err(AuthzError::custom_check_failed(
                        call.policy.custom_deny_message(),
                    ))
                }
            }
            None => Ok(()),
        },
    };

    match outcome {
        Ok(()) => ControlFlow::Continue(()),
        Err(error) => ControlFlow::Break(error),
    }
}

fn count_request(
    rate_limiter: &RateLimitService,
    operation_id: &OperationId,
    principal_id: Option<PrincipalId>,
    class: LimitClass,
) -> ControlFlow<AuthzError> {
    let limit = rate_limiter.limit_for(operation_id, class);
    let key = RateLimitService::key(operation_id, principal_id);
    let decision = rate_limiter.check(&key, &limit);
    if decision.allowed {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(AuthzError::RateLimited {
            retry_after: decision.remaining.unwrap_or(limit.window),
        })
    }
}
