//! Per-request context, shared down the middleware chain.
//!
//! One [`Context`] is created per dispatched request and handed to every
//! chain stage behind a [`Ctx`] handle. The chain is strictly sequential —
//! stages only overlap through `await` points — so the async mutex is
//! contention-free; it exists to let a stage hold the context across its
//! own suspension points.
//!
//! Middlewares communicate with later stages by writing into the state
//! bag: a value stored under `"one"` is read back by a `pick!("one")`
//! binding on the target method.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::pick::{self, Segment};
use crate::verb::Verb;

/// Shared handle to the per-request [`Context`].
pub type Ctx = Arc<Mutex<Context>>;

// ── Request ──────────────────────────────────────────────────────────────────

/// The incoming half of the context.
///
/// `body` starts as `Null`; a body-parsing middleware (see
/// [`json_body`](crate::middleware::json_body)) is what turns `raw_body`
/// bytes into a structured value — parsing is not this crate's job.
pub struct Request {
    verb: Verb,
    path: String,
    query: Value,
    headers: Vec<(String, String)>,
    raw_body: Vec<u8>,
    body: Value,
}

impl Request {
    /// Builds a request from a verb and a path with an optional query
    /// string (`"/users/42?filters=a&filters=b"`).
    ///
    /// Repeated query keys collapse into an array, single keys stay
    /// plain strings.
    pub fn new(verb: Verb, path_and_query: &str) -> Self {
        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (path_and_query, Value::Object(Map::new())),
        };
        Self {
            verb,
            path: path.to_owned(),
            query,
            headers: Vec::new(),
            raw_body: Vec::new(),
            body: Value::Null,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Attaches unparsed body bytes, as the server boundary does.
    pub fn with_raw_body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.raw_body = bytes.into();
        self
    }

    /// Attaches an already-structured body, bypassing parsing middleware.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn verb(&self) -> Verb { self.verb }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> &Value { &self.query }
    pub fn raw_body(&self) -> &[u8] { &self.raw_body }
    pub fn body(&self) -> &Value { &self.body }

    /// Replaces the structured body — the body-parsing middleware's seam.
    pub fn set_body(&mut self, body: Value) {
        self.body = body;
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The request as a value tree, for picks rooted at `"request"`.
    fn as_value(&self) -> Value {
        let headers: Map<String, Value> = self.headers.iter()
            .map(|(k, v)| (k.to_lowercase(), Value::String(v.clone())))
            .collect();
        let mut map = Map::new();
        map.insert("method".to_owned(), Value::String(self.verb.as_str().to_owned()));
        map.insert("path".to_owned(), Value::String(self.path.clone()));
        map.insert("query".to_owned(), self.query.clone());
        map.insert("body".to_owned(), self.body.clone());
        map.insert("headers".to_owned(), Value::Object(headers));
        Value::Object(map)
    }
}

// ── Context ──────────────────────────────────────────────────────────────────

/// The request/response context one chain operates on.
pub struct Context {
    request: Request,
    params: HashMap<String, String>,
    state: Map<String, Value>,
    status: Option<u16>,
    body: Option<Value>,
}

impl Context {
    pub(crate) fn new(request: Request, params: HashMap<String, String>) -> Self {
        Self {
            request,
            params,
            state: Map::new(),
            status: None,
            body: None,
        }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{uid}`, `ctx.param("uid")` on `/users/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Stores a value in the per-request state bag. Later stages read it
    /// back with [`get`](Self::get) or pick it by key.
    pub fn insert(&mut self, key: &str, value: Value) {
        self.state.insert(key.to_owned(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    /// The response status, if a stage set one explicitly.
    pub fn status(&self) -> Option<u16> { self.status }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    /// The response body. `None` means no stage has set it — the compiled
    /// handler uses exactly this distinction to decide whether the
    /// method's return value becomes the body.
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
    }

    pub(crate) fn take_body(&mut self) -> Option<Value> {
        self.body.take()
    }

    /// Resolves a pick path against this context.
    ///
    /// The first segment names a root: `request`, `params`, `query`,
    /// `body`, `status`, or any key a middleware stored in the state bag.
    /// The remaining segments walk the root with
    /// [`pick::resolve`](crate::pick::resolve).
    pub fn pick(&self, path: &[Segment]) -> Option<Value> {
        let (first, rest) = path.split_first()?;
        let root = self.root(first)?;
        pick::resolve(rest, &root)
    }

    fn root(&self, segment: &Segment) -> Option<Value> {
        let key = match segment {
            Segment::Key(k) => k.as_str(),
            Segment::Index(_) => return None,
        };
        match key {
            "request" => Some(self.request.as_value()),
            "query" => Some(self.request.query.clone()),
            "params" => {
                let map: Map<String, Value> = self.params.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                Some(Value::Object(map))
            }
            "body" => self.body.clone(),
            "status" => self.status.map(Value::from),
            other => self.state.get(other).cloned(),
        }
    }
}

fn parse_query(query: &str) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.remove(key.as_ref()) {
            None => {
                map.insert(key.into_owned(), value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                map.insert(key.into_owned(), Value::Array(items));
            }
            Some(previous) => {
                map.insert(key.into_owned(), Value::Array(vec![previous, value]));
            }
        }
    }
    Value::Object(map)
}
