//! Business handlers behind the guard.

use crate::principal::AuthorizationContext;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;

/// A business operation. Errors are logged locally and never returned to
/// the caller.
pub trait Handler<Req, Res>: Send + Sync + 'static {
    fn call(&self, request: Req, context: AuthorizationContext) -> BoxFuture<'static, anyhow::Result<Res>>;
}

impl<F, Fut, Req, Res> Handler<Req, Res> for F
where
    F: Fn(Req, AuthorizationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Res>> + Send + 'static,
{
    fn call(&self, request: Req, context: AuthorizationContext) -> BoxFuture<'static, anyhow::Result<Res>> {
        self(request, context).boxed()
    }
}
