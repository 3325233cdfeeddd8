//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: body parsing, error translation, structured
//! tracing, authentication-header inspection.
//!
//! A middleware receives the shared context and a continuation. It runs
//! its "before" logic, calls the continuation to hand control to the rest
//! of the chain, then runs its "after" logic once the continuation
//! resolves. Not calling the continuation short-circuits the chain: later
//! middlewares and the final handler never run.
//!
//! A middleware *factory* is an ordinary function that takes configuration
//! and returns a [`Middleware`] — see [`error_boundary`] or the
//! `load_one` middleware in `demos/users.rs`. The factory runs when the
//! blueprint is built, so a bad configuration fails at load, not on the
//! first request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};
use tracing::info;

use crate::context::Ctx;
use crate::error::BoxError;

// ── Core types ────────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Pin<Box<…>>` because the runtime polls futures in place; `Send` so
/// tokio may move them across threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The continuation that resumes the rest of the chain.
///
/// Single-shot: calling it consumes it. Dropping it without calling is the
/// short-circuit.
pub type Next = Box<dyn FnOnce() -> BoxFuture<Result<(), BoxError>> + Send>;

/// A chain stage. The composed final handler has this same shape — the
/// router only ever sees a list of these.
pub type Middleware =
    Arc<dyn Fn(Ctx, Next) -> BoxFuture<Result<(), BoxError>> + Send + Sync + 'static>;

/// Adapts an async closure into a [`Middleware`].
///
/// ```rust
/// use tsugi::middleware::{self, Next};
/// use tsugi::Ctx;
///
/// let mw = middleware::from_fn(|ctx: Ctx, next: Next| async move {
///     ctx.lock().await.insert("seen", serde_json::json!(true));
///     next().await
/// });
/// # let _ = mw;
/// ```
pub fn from_fn<F, Fut>(f: F) -> Middleware
where
    F: Fn(Ctx, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx, next| Box::pin(f(ctx, next)))
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// A chain failure that already knows its HTTP shape.
///
/// Nothing in the dispatch pipeline treats this type specially — it is the
/// convention [`error_boundary`] understands. Raise it from a middleware
/// or a method, and the boundary renders `status` with a
/// `{ code, message }` body; without a boundary installed it is logged by
/// the router and rendered as a bare 500 like any other error.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }
}

// ── Built-in middleware ───────────────────────────────────────────────────────

/// Error-boundary middleware: the demonstration of error translation.
///
/// Wraps the continuation; on failure, downcasts to [`HttpError`] for the
/// status (anything else becomes 500) and writes a `{ code, message }`
/// body. Install it first on a blueprint so every later stage is covered.
pub fn error_boundary() -> Middleware {
    from_fn(|ctx: Ctx, next: Next| async move {
        let Err(error) = next().await else { return Ok(()) };
        let (status, message) = match error.downcast::<HttpError>() {
            Ok(http) => {
                let HttpError { status, message } = *http;
                (status, message)
            }
            Err(other) => (500, other.to_string()),
        };
        let code = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Internal Server Error");
        let mut ctx = ctx.lock().await;
        ctx.set_status(status);
        ctx.set_body(json!({ "code": code, "message": message }));
        Ok(())
    })
}

/// JSON body-parsing middleware.
///
/// When the request carries `content-type: application/json` and a
/// non-empty raw body, parses it into the structured request body that
/// picks like `pick!("request", "body", "username")` walk. Malformed
/// JSON fails the chain with a 400 [`HttpError`].
pub fn json_body() -> Middleware {
    from_fn(|ctx: Ctx, next: Next| async move {
        {
            let mut ctx = ctx.lock().await;
            let is_json = ctx.request()
                .header("content-type")
                .is_some_and(|ct| ct.starts_with("application/json"));
            if is_json && !ctx.request().raw_body().is_empty() {
                let parsed: Result<Value, _> = serde_json::from_slice(ctx.request().raw_body());
                match parsed {
                    Ok(body) => ctx.request_mut().set_body(body),
                    Err(e) => {
                        return Err(HttpError::bad_request(format!("invalid json body: {e}")).into());
                    }
                }
            }
        }
        next().await
    })
}

/// Per-request tracing middleware: method, path, status, latency.
pub fn trace() -> Middleware {
    from_fn(|ctx: Ctx, next: Next| async move {
        let (verb, path) = {
            let ctx = ctx.lock().await;
            (ctx.request().verb(), ctx.request().path().to_owned())
        };
        let start = Instant::now();
        let result = next().await;
        match &result {
            Ok(()) => {
                let ctx = ctx.lock().await;
                let status = ctx.status()
                    .unwrap_or(if ctx.body().is_some() { 200 } else { 404 });
                info!(%verb, path = %path, status, elapsed = ?start.elapsed(), "request");
            }
            Err(error) => {
                info!(%verb, path = %path, %error, elapsed = ?start.elapsed(), "request failed");
            }
        }
        result
    })
}
