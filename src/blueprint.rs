//! The blueprint: routing metadata as a first-class value.
//!
//! A [`Blueprint`] is an explicit side-table describing everything about a
//! service's routes — base path, class and method middleware lists, the
//! verb table, per-argument bindings, and the method callables themselves.
//! It is built once at startup with chaining registration calls, then only
//! ever read: [`Service::new`](crate::Service::new) compiles it into a
//! router without consuming it, so any number of services can be derived
//! from the same blueprint.
//!
//! Registration order is meaningful exactly where execution order is:
//! middleware lists run in the order they were added. Everything else is
//! keyed — a later [`route`](Blueprint::route) for the same (verb,
//! sub-path) silently replaces the earlier method name, and a later
//! [`bind`](Blueprint::bind) for the same argument index silently replaces
//! the earlier binding, whatever its kind.
//!
//! ```rust
//! use serde_json::json;
//! use std::sync::Arc;
//! use tsugi::{Blueprint, pick};
//!
//! struct Users;
//!
//! let bp: Blueprint<Users> = Blueprint::new("/users")
//!     .get("/{uid}", "find")
//!     .bind("find", 0, pick!("params", "uid"))
//!     .handler("find", |_app: Arc<Users>, args| async move {
//!         Ok(json!({ "uid": args.value(0) }))
//!     });
//! assert_eq!(bp.base(), "/users");
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Ctx;
use crate::error::BoxError;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::pick::Segment;
use crate::verb::Verb;

// ── Bindings ─────────────────────────────────────────────────────────────────

/// How one positional argument of a method is filled at request time.
#[derive(Clone, Debug)]
pub enum Binding {
    /// The shared request context handle.
    Ctx,
    /// The dispatch continuation. Single-shot: if several positions bind
    /// it, only the first one receives it.
    Next,
    /// A structured extraction from the context — see [`crate::pick`].
    Pick(Vec<Segment>),
}

impl Binding {
    /// Builds a pick binding from anything segment-like. The [`pick!`](crate::pick!)
    /// macro is the usual spelling.
    pub fn pick<I, S>(path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        Self::Pick(path.into_iter().map(Into::into).collect())
    }
}

// ── Resolved arguments ───────────────────────────────────────────────────────

/// One resolved argument position.
pub enum ArgSlot {
    /// The position had no binding, or its pick resolved to nothing.
    Absent,
    /// A picked value.
    Value(Value),
    /// The shared context handle.
    Ctx(Ctx),
    /// The continuation.
    Next(Next),
}

/// The positional argument list a method callable receives, resolved
/// against the current request.
pub struct Args {
    slots: Vec<ArgSlot>,
}

impl Args {
    pub(crate) fn new(slots: Vec<ArgSlot>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArgSlot> {
        self.slots.get(index)
    }

    /// The picked value at `index`, or `Null` when the position is absent
    /// or holds something other than a value.
    pub fn value(&self, index: usize) -> Value {
        match self.slots.get(index) {
            Some(ArgSlot::Value(v)) => v.clone(),
            _ => Value::Null,
        }
    }

    /// The context handle at `index`, if that position is `ctx`-bound.
    pub fn ctx(&self, index: usize) -> Option<Ctx> {
        match self.slots.get(index) {
            Some(ArgSlot::Ctx(ctx)) => Some(Arc::clone(ctx)),
            _ => None,
        }
    }

    /// Takes the continuation out of `index`, leaving the slot absent.
    pub fn take_next(&mut self, index: usize) -> Option<Next> {
        let slot = self.slots.get_mut(index)?;
        match std::mem::replace(slot, ArgSlot::Absent) {
            ArgSlot::Next(next) => Some(next),
            other => {
                *slot = other;
                None
            }
        }
    }
}

// ── Method metadata ──────────────────────────────────────────────────────────

/// The type-erased async method callable.
///
/// Same erasure story as middleware: concrete closures of different types
/// must live in one table, so they hide behind an `Arc<dyn Fn>` returning
/// a boxed future. One virtual call per request.
pub type MethodFn<T> =
    Arc<dyn Fn(Arc<T>, Args) -> BoxFuture<Result<Value, BoxError>> + Send + Sync + 'static>;

pub(crate) struct MethodMeta<T> {
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) bindings: Vec<Option<Binding>>,
    pub(crate) call: Option<MethodFn<T>>,
}

impl<T> MethodMeta<T> {
    fn new() -> Self {
        Self {
            middlewares: Vec::new(),
            bindings: Vec::new(),
            call: None,
        }
    }
}

// ── Blueprint ────────────────────────────────────────────────────────────────

/// Routing metadata for one service over a handler-bearing type `T`.
pub struct Blueprint<T> {
    pub(crate) base: String,
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) verbs: HashMap<Verb, HashMap<Option<String>, String>>,
    pub(crate) methods: HashMap<String, MethodMeta<T>>,
}

impl<T> Blueprint<T> {
    /// Starts a blueprint rooted at `base` (e.g. `"/users"`).
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_owned(),
            middlewares: Vec::new(),
            verbs: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    /// The base path every route of this blueprint nests under.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Iterates the registered (verb, sub-path, method name) triples.
    /// `None` is the default sub-path, compiled to the base path itself.
    pub fn routes(&self) -> impl Iterator<Item = (Verb, Option<&str>, &str)> {
        self.verbs.iter().flat_map(|(verb, table)| {
            table.iter().map(|(sub, name)| (*verb, sub.as_deref(), name.as_str()))
        })
    }

    /// Appends a class-level middleware, applied to every route.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Appends a middleware scoped to one method.
    pub fn method_middleware(mut self, method: &str, middleware: Middleware) -> Self {
        self.meta_mut(method).middlewares.push(middleware);
        self
    }

    /// Records that `method` handles `verb` at `sub_path` (`None` routes
    /// the base path itself). Re-registering the same (verb, sub-path)
    /// replaces the method name silently. Path syntax is not inspected
    /// here — the router validates patterns at compile time.
    pub fn route<'p>(
        mut self,
        verb: Verb,
        sub_path: impl Into<Option<&'p str>>,
        method: &str,
    ) -> Self {
        self.verbs
            .entry(verb)
            .or_default()
            .insert(sub_path.into().map(str::to_owned), method.to_owned());
        self
    }

    pub fn get<'p>(self, sub_path: impl Into<Option<&'p str>>, method: &str) -> Self {
        self.route(Verb::Get, sub_path, method)
    }

    pub fn post<'p>(self, sub_path: impl Into<Option<&'p str>>, method: &str) -> Self {
        self.route(Verb::Post, sub_path, method)
    }

    pub fn put<'p>(self, sub_path: impl Into<Option<&'p str>>, method: &str) -> Self {
        self.route(Verb::Put, sub_path, method)
    }

    pub fn patch<'p>(self, sub_path: impl Into<Option<&'p str>>, method: &str) -> Self {
        self.route(Verb::Patch, sub_path, method)
    }

    pub fn delete<'p>(self, sub_path: impl Into<Option<&'p str>>, method: &str) -> Self {
        self.route(Verb::Delete, sub_path, method)
    }

    /// Binds argument position `index` of `method`. Positions left unbound
    /// resolve to absent slots. A later bind for the same index replaces
    /// the earlier one, whatever its kind.
    pub fn bind(mut self, method: &str, index: usize, binding: Binding) -> Self {
        let bindings = &mut self.meta_mut(method).bindings;
        if bindings.len() <= index {
            bindings.resize_with(index + 1, || None);
        }
        bindings[index] = Some(binding);
        self
    }

    /// Registers the callable for `method`. The closure receives the
    /// shared app handle and the resolved [`Args`]; its returned value
    /// becomes the response body unless the method set the body itself.
    pub fn handler<F, Fut>(mut self, method: &str, f: F) -> Self
    where
        F: Fn(Arc<T>, Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.meta_mut(method).call = Some(Arc::new(move |app, args| Box::pin(f(app, args))));
        self
    }

    fn meta_mut(&mut self, method: &str) -> &mut MethodMeta<T> {
        self.methods
            .entry(method.to_owned())
            .or_insert_with(MethodMeta::new)
    }
}
