//! Structured extraction of nested values out of the request context.
//!
//! A pick is a literal path of string and integer segments walked over a
//! [`Value`] tree. The walk is strictly sequential: each step descends into
//! the result of the previous one, so there is no cycle risk. A step that
//! finds nothing — or finds a scalar where a container is needed — ends the
//! walk immediately, and the whole pick resolves absent. Absence is a value
//! here, never an error.
//!
//! Integer segments on arrays wrap Python-style:
//! `[-1]` on `[10, 20, 30]` yields `30` (effective index `(len + i) % len`).

use serde_json::Value;

/// One step of a pick path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Segment {
    /// A key into an object (or, when it parses as an integer, an index
    /// into an array — numeric-string coercion is part of the contract).
    Key(String),
    /// An index into an array, negative values counting from the end.
    /// On an object it looks up the decimal string form as a key.
    Index(i64),
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<i64> for Segment {
    fn from(index: i64) -> Self {
        Self::Index(index)
    }
}

impl From<i32> for Segment {
    fn from(index: i32) -> Self {
        Self::Index(index.into())
    }
}

/// Outcome of a single step.
///
/// `Absent` and `Mismatch` both end the walk; keeping them apart makes the
/// algorithm explicit about *why* it stopped — a missing key versus a
/// container-shaped segment applied to a scalar.
enum Step<'a> {
    Found(&'a Value),
    Absent,
    Mismatch,
}

/// Walks `path` over `root` and returns the value it lands on.
///
/// An empty path returns the root itself.
pub fn resolve(path: &[Segment], root: &Value) -> Option<Value> {
    let mut current = root;
    for segment in path {
        match step(segment, current) {
            Step::Found(value) => current = value,
            Step::Absent | Step::Mismatch => return None,
        }
    }
    Some(current.clone())
}

fn step<'a>(segment: &Segment, value: &'a Value) -> Step<'a> {
    match (segment, value) {
        (Segment::Index(i), Value::Array(items)) => index_into(items, *i),
        (Segment::Index(i), Value::Object(map)) => {
            map.get(&i.to_string()).map_or(Step::Absent, Step::Found)
        }
        (Segment::Key(k), Value::Array(items)) => match k.parse::<i64>() {
            Ok(i) => index_into(items, i),
            Err(_) => Step::Absent,
        },
        (Segment::Key(k), Value::Object(map)) => {
            map.get(k).map_or(Step::Absent, Step::Found)
        }
        _ => Step::Mismatch,
    }
}

/// Effective index is `(len + i) % len`: any integer down to `-len` lands
/// in range, below that is absent. Truncated `%` keeps the sign, which is
/// exactly the out-of-range behavior we want to preserve.
fn index_into(items: &[Value], i: i64) -> Step<'_> {
    let len = items.len() as i64;
    if len == 0 {
        return Step::Absent;
    }
    let index = (len + i) % len;
    if index < 0 {
        return Step::Absent;
    }
    items.get(index as usize).map_or(Step::Absent, Step::Found)
}
