//! The underlying request router.
//!
//! One radix tree per verb, O(path-length) lookup via [`matchit`]. The
//! router owns two things the compiler hands it: a global middleware chain
//! (every matched route runs it first) and, per route, the ordered handler
//! list whose last element is the composed final handler. Handlers all
//! have the same `(context, continuation)` shape — the router does not
//! know which one is "the endpoint".
//!
//! Path parameters use `{name}` syntax — `ctx.param("name")` retrieves
//! them. The router never catches chain errors: an `Err` that bubbles all
//! the way out is logged and rendered as a bare 500.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use tokio::sync::Mutex;
use tracing::error;

use crate::context::{Context, Ctx, Request};
use crate::error::{BoxError, Error};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::response::Response;
use crate::verb::Verb;

/// A route's registered handler chain.
struct Route {
    stack: Vec<Middleware>,
}

/// The router one compiled service owns.
///
/// Scoped with the service's base path: every registered sub-path is
/// joined under the prefix at insertion time. Route tables are mutable
/// only while the compiler registers; dispatch takes `&self`.
pub struct Router {
    prefix: String,
    chain: Vec<Middleware>,
    trees: HashMap<Verb, MatchitRouter<Route>>,
}

impl Router {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_owned(),
            chain: Vec::new(),
            trees: HashMap::new(),
        }
    }

    /// The base path this router is scoped under.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Appends to the global chain, run before every route's own handlers.
    pub fn use_middleware(&mut self, middleware: Middleware) {
        self.chain.push(middleware);
    }

    /// Registers an ordered handler list for `verb` at `sub_path` (joined
    /// under the prefix). The last handler is expected to be the composed
    /// final handler, but nothing enforces that — a chain is a chain.
    pub fn register(
        &mut self,
        verb: Verb,
        sub_path: &str,
        handlers: Vec<Middleware>,
    ) -> Result<(), Error> {
        let path = join(&self.prefix, sub_path);
        self.trees
            .entry(verb)
            .or_default()
            .insert(path.as_str(), Route { stack: handlers })
            .map_err(|source| Error::InvalidRoute { path, source })
    }

    /// Matches `request` and runs the chain: global middlewares first,
    /// then the route's own handlers, in registration order. No match is
    /// a 404; an uncaught chain error is logged and rendered 500.
    pub async fn dispatch(&self, request: Request) -> Response {
        let (stack, params) = {
            let Some(tree) = self.trees.get(&request.verb()) else {
                return Response::not_found();
            };
            let Ok(matched) = tree.at(request.path()) else {
                return Response::not_found();
            };
            let params: HashMap<String, String> = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            let mut stack =
                Vec::with_capacity(self.chain.len() + matched.value.stack.len());
            stack.extend(self.chain.iter().cloned());
            stack.extend(matched.value.stack.iter().cloned());
            (stack, params)
        };
        let stack: Arc<[Middleware]> = stack.into();

        let ctx: Ctx = Arc::new(Mutex::new(Context::new(request, params)));
        match run(stack, 0, Arc::clone(&ctx)).await {
            Ok(()) => Response::from_context(&mut *ctx.lock().await),
            Err(err) => {
                error!(error = %err, "unhandled error in handler chain");
                Response::internal_error()
            }
        }
    }
}

/// Runs `stack[index..]` over the shared context.
///
/// Each stage receives a continuation that resumes here at `index + 1`;
/// past the end the continuation resolves immediately, so the final
/// handler's `next` is a no-op.
fn run(stack: Arc<[Middleware]>, index: usize, ctx: Ctx) -> BoxFuture<Result<(), BoxError>> {
    Box::pin(async move {
        let Some(middleware) = stack.get(index).map(Arc::clone) else {
            return Ok(());
        };
        let next_ctx = Arc::clone(&ctx);
        let next: Next = Box::new(move || run(stack, index + 1, next_ctx));
        middleware(ctx, next).await
    })
}

fn join(prefix: &str, sub_path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let sub_path = sub_path.trim_start_matches('/');
    match (prefix.is_empty(), sub_path.is_empty()) {
        (true, true) => "/".to_owned(),
        (false, true) => prefix.to_owned(),
        _ => format!("{prefix}/{sub_path}"),
    }
}
