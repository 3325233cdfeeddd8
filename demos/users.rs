//! Blueprint-driven users service demo.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example users
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl http://localhost:3000/users/user
//!   curl http://localhost:3000/users/nope        ← 404 from the load middleware
//!   curl -X PATCH http://localhost:3000/users/user \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"plop"}'

use std::sync::Arc;

use serde_json::{Value, json};
use tsugi::middleware::{self, HttpError};
use tsugi::{Args, Blueprint, Ctx, Middleware, Next, Server, Service, pick};

/// The handler-bearing app: a read-only user directory.
struct Users {
    directory: Value,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let directory = json!({
        "user": { "id": "user", "username": "meh" },
        "plop": { "id": "plop", "username": "plop" },
    });

    let bp = blueprint(directory.clone());
    let service = Service::new(Users { directory }, &bp).expect("blueprint compiles");

    Server::bind("0.0.0.0:3000")
        .serve(service)
        .await
        .expect("server error");
}

fn blueprint(directory: Value) -> Blueprint<Users> {
    Blueprint::new("/users")
        // Class middlewares, in execution order: tracing wraps everything,
        // the boundary translates failures, the parser feeds body picks.
        .middleware(middleware::trace())
        .middleware(middleware::error_boundary())
        .middleware(middleware::json_body())
        .get(None, "list")
        .get("/{uid}", "find")
        .patch("/{uid}", "update")
        .method_middleware("find", load_one(directory.clone(), "uid"))
        .method_middleware("update", validate())
        .method_middleware("update", load_one(directory, "uid"))
        .bind("find", 0, pick!("one"))
        .bind("update", 0, pick!("payload"))
        .bind("update", 1, pick!("one"))
        .handler("list", |app: Arc<Users>, _args: Args| async move {
            let users: Vec<Value> = app
                .directory
                .as_object()
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default();
            Ok(Value::Array(users))
        })
        .handler("find", |_app: Arc<Users>, args: Args| async move {
            // The load middleware already resolved the user into `one`.
            Ok(args.value(0))
        })
        .handler("update", |_app: Arc<Users>, args: Args| async move {
            let mut merged = args.value(1);
            if let (Some(one), Value::Object(payload)) =
                (merged.as_object_mut(), args.value(0))
            {
                for (key, value) in payload {
                    one.insert(key, value);
                }
            }
            Ok(merged)
        })
}

/// Middleware factory: resolves the `{param}` path parameter against a
/// directory and stores the record under `one`, or fails the chain with
/// a 404 the error boundary renders.
fn load_one(directory: Value, param: &'static str) -> Middleware {
    middleware::from_fn(move |ctx: Ctx, next: Next| {
        let directory = directory.clone();
        async move {
            {
                let mut ctx = ctx.lock().await;
                let key = ctx.param(param).unwrap_or_default().to_owned();
                match directory.get(&key) {
                    Some(one) => ctx.insert("one", one.clone()),
                    None => return Err(HttpError::not_found(format!("no user `{key}`")).into()),
                }
            }
            next().await
        }
    })
}

/// Middleware factory: requires a `username` field in the parsed body and
/// stores the validated payload for the handler to pick.
fn validate() -> Middleware {
    middleware::from_fn(|ctx: Ctx, next: Next| async move {
        {
            let mut ctx = ctx.lock().await;
            let Some(username) = ctx.request().body().get("username").cloned() else {
                return Err(HttpError::bad_request("missing `username`").into());
            };
            ctx.insert("payload", json!({ "username": username }));
        }
        next().await
    })
}
