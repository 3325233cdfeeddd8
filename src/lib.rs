//! # tsugi
//!
//! Declarative routing for small HTTP services: describe a service's
//! routes, middleware chains, and request-argument extraction as a
//! [`Blueprint`] value, then compile it — once, at construction — into a
//! [`Service`] that owns a router with one composed handler per route.
//! No wiring code, no hidden registration state: the blueprint *is* the
//! metadata, inspectable and reusable.
//!
//! ## The pieces
//!
//! - **Verb table** — which method handles which verb at which sub-path
//!   under the blueprint's base path. Later registrations for the same
//!   (verb, sub-path) pair win.
//! - **Middleware** — continuation-passing `(ctx, next)` stages, class-level or
//!   per-method, run in declaration order. A stage that never calls
//!   `next` short-circuits the chain.
//! - **Bindings** — per argument position, how to fill a method's
//!   parameters: the whole context, the continuation, or a [`pick!`]
//!   path walked into the request (absence is a value, not an error).
//! - **Compiler** — [`Service::new`] reads it all and registers the
//!   chains on a fresh [`Router`]; every construction derives an
//!   independent router from the same immutable blueprint.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use tsugi::{Blueprint, Request, Service, Verb, pick};
//!
//! struct Users;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bp: Blueprint<Users> = Blueprint::new("/users")
//!     .get("/{uid}", "find")
//!     .bind("find", 0, pick!("params", "uid"))
//!     .handler("find", |_app: Arc<Users>, args| async move {
//!         Ok(json!({ "uid": args.value(0) }))
//!     });
//!
//! let service = Service::new(Users, &bp).expect("blueprint compiles");
//! let response = service.dispatch(Request::new(Verb::Get, "/users/42")).await;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, Some(json!({ "uid": "42" })));
//! # }
//! ```
//!
//! Serving over HTTP is one more line — `Server::bind("0.0.0.0:3000")
//! .serve(service)` — but nothing in the crate requires a socket; tests
//! drive [`Service::dispatch`] directly.

/// Builds a [`Binding::Pick`](crate::Binding) from mixed string and
/// integer segments:
///
/// ```rust
/// use tsugi::pick;
/// let binding = pick!("request", "body", "users", -1, "username");
/// # let _ = binding;
/// ```
#[macro_export]
macro_rules! pick {
    ($($segment:expr),+ $(,)?) => {
        $crate::Binding::Pick(vec![$($crate::pick::Segment::from($segment)),+])
    };
}

mod blueprint;
mod context;
mod error;
mod response;
mod router;
mod server;
mod service;
mod verb;

pub mod middleware;
pub mod pick;

pub use blueprint::{ArgSlot, Args, Binding, Blueprint, MethodFn};
pub use context::{Context, Ctx, Request};
pub use error::{BoxError, Error};
pub use middleware::{HttpError, Middleware, Next};
pub use response::Response;
pub use router::Router;
pub use server::Server;
pub use service::Service;
pub use verb::Verb;
