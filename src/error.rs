//! Unified error types.

use crate::verb::Verb;

/// The error type chain handlers fail with.
///
/// Middlewares and target methods return whatever error they like behind
/// this alias; the crate never catches it. An uncaught failure reaches the
/// router, which logs it and answers with its own convention (500). Any
/// friendlier translation belongs to user middleware — see
/// [`error_boundary`](crate::middleware::error_boundary).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load-time configuration errors.
///
/// These surface when a blueprint is compiled into a service, never per
/// request. Handler-time failures travel as [`BoxError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A route names a method the blueprint never registered a callable for.
    #[error("route {verb} {path} refers to unknown method `{method}`")]
    UnknownMethod {
        verb: Verb,
        path: String,
        method: String,
    },

    /// The underlying router rejected a path pattern.
    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    /// Binding or accepting at the server boundary failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
