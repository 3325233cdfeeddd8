//! Middleware chains: ordering, short-circuits, error translation.

use std::sync::Arc;

use serde_json::{Value, json};
use tsugi::middleware::{self, HttpError};
use tsugi::{Args, Blueprint, Ctx, Middleware, Next, Request, Service, Verb, pick};

struct App;

/// Appends a label to the `seen` array in the context state bag.
fn tag(label: &'static str) -> Middleware {
    middleware::from_fn(move |ctx: Ctx, next: Next| async move {
        {
            let mut ctx = ctx.lock().await;
            let mut seen = ctx.get("seen").cloned().unwrap_or_else(|| json!([]));
            seen.as_array_mut().expect("seen is an array").push(json!(label));
            ctx.insert("seen", seen);
        }
        next().await
    })
}

/// Fails the chain without calling the continuation.
fn fail_with(status: u16, message: &'static str) -> Middleware {
    middleware::from_fn(move |_ctx: Ctx, _next: Next| async move {
        Err(HttpError::new(status, message).into())
    })
}

/// The load-by-id middleware of the demo, trimmed for tests.
fn load_one(directory: Value) -> Middleware {
    middleware::from_fn(move |ctx: Ctx, next: Next| {
        let directory = directory.clone();
        async move {
            {
                let mut ctx = ctx.lock().await;
                let key = ctx.param("uid").unwrap_or_default().to_owned();
                match directory.get(&key) {
                    Some(one) => ctx.insert("one", one.clone()),
                    None => return Err(HttpError::not_found("not_found").into()),
                }
            }
            next().await
        }
    })
}

/// Requires a `username` field in the parsed body.
fn validate() -> Middleware {
    middleware::from_fn(|ctx: Ctx, next: Next| async move {
        {
            let mut ctx = ctx.lock().await;
            let Some(username) = ctx.request().body().get("username").cloned() else {
                return Err(HttpError::bad_request("bad_request").into());
            };
            ctx.insert("payload", json!({ "username": username }));
        }
        next().await
    })
}

#[tokio::test]
async fn class_then_method_middlewares_run_in_declaration_order() {
    let bp: Blueprint<App> = Blueprint::new("/")
        .middleware(tag("A"))
        .middleware(tag("B"))
        .get(None, "show")
        .method_middleware("show", tag("C"))
        .method_middleware("show", tag("D"))
        .bind("show", 0, pick!("seen"))
        .handler("show", |_app: Arc<App>, args: Args| async move {
            Ok(json!({ "order": args.value(0) }))
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");

    let response = service.dispatch(Request::new(Verb::Get, "/")).await;
    assert_eq!(response.body, Some(json!({ "order": ["A", "B", "C", "D"] })));
}

#[tokio::test]
async fn short_circuit_skips_the_handler() {
    let bp: Blueprint<App> = Blueprint::new("/users")
        .middleware(middleware::error_boundary())
        .get("/{uid}", "find")
        .method_middleware("find", fail_with(404, "not_found"))
        .handler("find", |_app: Arc<App>, _args: Args| async move {
            Ok(json!({ "from": "handler" }))
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");

    let response = service.dispatch(Request::new(Verb::Get, "/users/42")).await;
    assert_eq!(response.status, 404);
    assert_eq!(
        response.body,
        Some(json!({ "code": "Not Found", "message": "not_found" }))
    );
}

#[tokio::test]
async fn several_middlewares_fail_in_order() {
    let directory = json!({ "user": { "id": "user", "username": "meh" } });
    let bp: Blueprint<App> = Blueprint::new("/users")
        .middleware(middleware::error_boundary())
        .middleware(middleware::json_body())
        .patch("/{uid}", "update")
        .method_middleware("update", validate())
        .method_middleware("update", load_one(directory))
        .bind("update", 0, pick!("payload"))
        .bind("update", 1, pick!("one"))
        .handler("update", |_app: Arc<App>, args: Args| async move {
            let mut merged = args.value(1);
            if let (Some(one), Value::Object(payload)) =
                (merged.as_object_mut(), args.value(0))
            {
                for (key, value) in payload {
                    one.insert(key, value);
                }
            }
            Ok(merged)
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");

    // Validation fires before the load: no body means 400 even though the
    // uid is unknown too.
    let response = service.dispatch(Request::new(Verb::Patch, "/users/foo")).await;
    assert_eq!(response.status, 400);
    assert_eq!(
        response.body,
        Some(json!({ "code": "Bad Request", "message": "bad_request" }))
    );

    let request = Request::new(Verb::Patch, "/users/foo")
        .with_header("content-type", "application/json")
        .with_raw_body(r#"{ "username": "plop" }"#);
    let response = service.dispatch(request).await;
    assert_eq!(response.status, 404);
    assert_eq!(
        response.body,
        Some(json!({ "code": "Not Found", "message": "not_found" }))
    );

    let request = Request::new(Verb::Patch, "/users/user")
        .with_header("content-type", "application/json")
        .with_raw_body(r#"{ "username": "plop" }"#);
    let response = service.dispatch(request).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        Some(json!({ "id": "user", "username": "plop" }))
    );
}

#[tokio::test]
async fn uncaught_errors_render_the_router_convention() {
    let bp: Blueprint<App> = Blueprint::new("/")
        .get(None, "boom")
        .method_middleware("boom", fail_with(404, "not_found"))
        .handler("boom", |_app: Arc<App>, _args: Args| async move {
            Ok(json!({ "unreachable": true }))
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");

    // No boundary installed: the status on the error is irrelevant, the
    // router logs and answers a bare 500.
    let response = service.dispatch(Request::new(Verb::Get, "/")).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body, None);
}

#[tokio::test]
async fn boundary_translates_foreign_errors_to_500() {
    let bp: Blueprint<App> = Blueprint::new("/")
        .middleware(middleware::error_boundary())
        .get(None, "boom")
        .handler("boom", |_app: Arc<App>, _args: Args| async move {
            Err("boom".to_string().into())
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");

    let response = service.dispatch(Request::new(Verb::Get, "/")).await;
    assert_eq!(response.status, 500);
    assert_eq!(
        response.body,
        Some(json!({ "code": "Internal Server Error", "message": "boom" }))
    );
}

#[tokio::test]
async fn malformed_json_body_is_a_400() {
    let bp: Blueprint<App> = Blueprint::new("/")
        .middleware(middleware::error_boundary())
        .middleware(middleware::json_body())
        .post(None, "create")
        .handler("create", |_app: Arc<App>, _args: Args| async move {
            Ok(json!({ "created": true }))
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");

    let request = Request::new(Verb::Post, "/")
        .with_header("content-type", "application/json")
        .with_raw_body("{ not json");
    let response = service.dispatch(request).await;
    assert_eq!(response.status, 400);
}
