//! The route compiler.
//!
//! [`Service::new`] is the single point where blueprint metadata becomes
//! executable: it reads the verb table, joins every route against its
//! method metadata, composes one final handler per (verb, path), and
//! registers the chains on a fresh router scoped to the blueprint's base
//! path. The blueprint is only read — construct as many services from one
//! blueprint as you like; each owns an independent router with an
//! identical route table.

use std::sync::Arc;

use tracing::debug;

use crate::blueprint::{ArgSlot, Args, Binding, Blueprint, MethodFn};
use crate::context::{Ctx, Request};
use crate::error::Error;
use crate::middleware::{Middleware, Next};
use crate::response::Response;
use crate::router::Router;

/// A compiled service: the handler-bearing app plus the router derived
/// from its blueprint.
pub struct Service<T> {
    app: Arc<T>,
    router: Router,
}

impl<T> std::fmt::Debug for Service<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service").finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Service<T> {
    /// Compiles `blueprint` over `app`.
    ///
    /// Fails with a configuration error when a route names a method that
    /// has no registered callable, or when the router rejects a path
    /// pattern. Chain order per route: the router-global class
    /// middlewares, then the method's own middlewares, then the composed
    /// final handler — each list in declaration order.
    pub fn new(app: T, blueprint: &Blueprint<T>) -> Result<Self, Error> {
        let app = Arc::new(app);
        let mut router = Router::new(&blueprint.base);

        for middleware in &blueprint.middlewares {
            router.use_middleware(Arc::clone(middleware));
        }

        for (verb, table) in &blueprint.verbs {
            for (sub_path, method) in table {
                let sub_path = sub_path.as_deref().unwrap_or("/");
                let call = blueprint
                    .methods
                    .get(method)
                    .and_then(|meta| meta.call.clone())
                    .ok_or_else(|| Error::UnknownMethod {
                        verb: *verb,
                        path: sub_path.to_owned(),
                        method: method.clone(),
                    })?;
                let meta = &blueprint.methods[method];

                let mut handlers = Vec::with_capacity(meta.middlewares.len() + 1);
                handlers.extend(meta.middlewares.iter().cloned());
                handlers.push(compose(Arc::clone(&app), call, meta.bindings.clone()));

                router.register(*verb, sub_path, handlers)?;
                debug!(%verb, base = %blueprint.base, sub_path, method = %method, "route compiled");
            }
        }

        Ok(Self { app, router })
    }

    pub fn app(&self) -> &Arc<T> {
        &self.app
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Routes one request through the compiled chains.
    pub async fn dispatch(&self, request: Request) -> Response {
        self.router.dispatch(request).await
    }
}

/// Builds the composed final handler for one method.
///
/// Per invocation: resolve every bound argument position against the
/// current context, invoke the method callable, await it, and — only when
/// the method did not set the response body itself and returned something
/// other than `Null` — assign the return value as the body. Errors are
/// not caught here; they belong to the router's convention or to an
/// error-boundary middleware.
fn compose<T: Send + Sync + 'static>(
    app: Arc<T>,
    call: MethodFn<T>,
    bindings: Vec<Option<Binding>>,
) -> Middleware {
    let bindings: Arc<[Option<Binding>]> = bindings.into();
    Arc::new(move |ctx: Ctx, next: Next| {
        let app = Arc::clone(&app);
        let call = Arc::clone(&call);
        let bindings = Arc::clone(&bindings);
        Box::pin(async move {
            // The continuation is single-shot: the first next-bound
            // position takes it, the rest resolve absent.
            let mut next = Some(next);
            let slots = {
                let guard = ctx.lock().await;
                bindings
                    .iter()
                    .map(|binding| match binding {
                        None => ArgSlot::Absent,
                        Some(Binding::Ctx) => ArgSlot::Ctx(Arc::clone(&ctx)),
                        Some(Binding::Next) => {
                            next.take().map_or(ArgSlot::Absent, ArgSlot::Next)
                        }
                        Some(Binding::Pick(path)) => {
                            guard.pick(path).map_or(ArgSlot::Absent, ArgSlot::Value)
                        }
                    })
                    .collect::<Vec<_>>()
            };

            let returned = call(app, Args::new(slots)).await?;

            let mut guard = ctx.lock().await;
            if guard.body().is_none() && !returned.is_null() {
                guard.set_body(returned);
            }
            Ok(())
        })
    })
}
