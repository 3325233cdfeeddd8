//! Argument bindings: picks, context, continuation, absent slots.

use std::sync::Arc;

use serde_json::{Value, json};
use tsugi::middleware;
use tsugi::{ArgSlot, Args, Binding, Blueprint, Request, Service, Verb, pick};

struct App;

fn blueprint() -> Blueprint<App> {
    Blueprint::new("/users")
        .middleware(middleware::json_body())
        .post("/{uid}", "create")
        .get(None, "one_pick")
        .post(None, "deep_pick")
        .put(None, "last_item")
        .patch(None, "fallback")
        .bind("create", 0, pick!("params", "uid"))
        .bind("create", 1, Binding::Next)
        .bind("create", 2, pick!("request", "body"))
        .bind("create", 3, pick!("query", "filters"))
        .bind("create", 4, Binding::Ctx)
        .handler("create", |_app: Arc<App>, mut args: Args| async move {
            let ctx = args.ctx(4).expect("ctx-bound argument");
            ctx.lock().await.set_status(201);
            if let Some(next) = args.take_next(1) {
                next().await?;
            }
            Ok(json!({
                "uid": args.value(0),
                "payload": args.value(2),
                "filters": args.value(3),
            }))
        })
        .bind("one_pick", 0, pick!("query", "filters", 1))
        .bind("one_pick", 1, pick!("query", "filters"))
        .handler("one_pick", |_app: Arc<App>, args: Args| async move {
            Ok(json!({ "foo": args.value(0), "filters": args.value(1) }))
        })
        .bind("deep_pick", 0, pick!("request", "body", 1, "plop", 2, "bar"))
        .handler("deep_pick", |_app: Arc<App>, args: Args| async move {
            Ok(json!({ "foo": args.value(0) }))
        })
        .bind("last_item", 0, pick!("request", "body", -1))
        .handler("last_item", |_app: Arc<App>, args: Args| async move {
            Ok(json!({ "last": args.value(0) }))
        })
        .bind("fallback", 0, pick!("foobar"))
        .bind("fallback", 1, pick!("request", "body", "bar", "baz"))
        .handler("fallback", |_app: Arc<App>, args: Args| async move {
            let foo = match (args.value(0), args.value(1)) {
                (Value::Null, Value::Null) => json!(42),
                (Value::Null, baz) => baz,
                (foo, _) => foo,
            };
            Ok(json!({ "foo": foo }))
        })
}

fn service() -> Service<App> {
    Service::new(App, &blueprint()).expect("blueprint compiles")
}

fn json_request(verb: Verb, target: &str, body: &str) -> Request {
    Request::new(verb, target)
        .with_header("content-type", "application/json")
        .with_raw_body(body)
}

#[tokio::test]
async fn picks_anything_from_the_context() {
    let request = json_request(
        Verb::Post,
        "/users/foo?filters=foo&filters=bar",
        r#"{ "username": "foo" }"#,
    );
    let response = service().dispatch(request).await;
    assert_eq!(response.status, 201);
    assert_eq!(
        response.body,
        Some(json!({
            "uid": "foo",
            "payload": { "username": "foo" },
            "filters": ["foo", "bar"],
        }))
    );
}

#[tokio::test]
async fn picks_one_item_out_of_a_query_array() {
    let request = Request::new(Verb::Get, "/users?filters=foo&filters=bar");
    let response = service().dispatch(request).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        Some(json!({ "foo": "bar", "filters": ["foo", "bar"] }))
    );
}

#[tokio::test]
async fn picks_an_item_from_an_object_in_an_array() {
    let request = json_request(Verb::Post, "/users", r#"[{}, { "plop": [{}, {}, { "bar": 42 }] }]"#);
    let response = service().dispatch(request).await;
    assert_eq!(response.body, Some(json!({ "foo": 42 })));
}

#[tokio::test]
async fn picks_an_item_from_an_object_with_a_numeric_key() {
    let request = json_request(Verb::Post, "/users", r#"[{}, { "plop": { "2": { "bar": 42 } } }]"#);
    let response = service().dispatch(request).await;
    assert_eq!(response.body, Some(json!({ "foo": 42 })));
}

#[tokio::test]
async fn negative_index_picks_from_the_end() {
    let request = json_request(Verb::Put, "/users", "[10, 20, 30]");
    let response = service().dispatch(request).await;
    assert_eq!(response.body, Some(json!({ "last": 30 })));
}

#[tokio::test]
async fn unresolvable_picks_are_null_arguments() {
    let request = json_request(Verb::Patch, "/users", r#"{ "baz": "plop" }"#);
    let response = service().dispatch(request).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, Some(json!({ "foo": 42 })));

    let request = json_request(Verb::Patch, "/users", r#"{ "bar": { "baz": "x" } }"#);
    let response = service().dispatch(request).await;
    assert_eq!(response.body, Some(json!({ "foo": "x" })));
}

#[tokio::test]
async fn unbound_positions_stay_absent() {
    let bp: Blueprint<App> = Blueprint::new("/")
        .get(None, "sparse")
        .bind("sparse", 2, pick!("params", "missing"))
        .handler("sparse", |_app: Arc<App>, args: Args| async move {
            assert_eq!(args.len(), 3);
            assert!(matches!(args.get(0), Some(ArgSlot::Absent)));
            assert!(matches!(args.get(1), Some(ArgSlot::Absent)));
            assert_eq!(args.value(2), Value::Null);
            Ok(json!({ "checked": true }))
        });
    let service = Service::new(App, &bp).expect("blueprint compiles");
    let response = service.dispatch(Request::new(Verb::Get, "/")).await;
    assert_eq!(response.body, Some(json!({ "checked": true })));
}
