//! Finalized HTTP response.
//!
//! A [`Response`] is what falls out of a dispatched chain once the context
//! is read back: an explicit status if any stage set one, otherwise 200
//! when a body exists and 404 when nothing produced one. Bodies are JSON;
//! body-less responses carry the status reason as plain text.

use bytes::Bytes;
use http_body_util::Full;
use serde_json::Value;

use crate::context::Context;

/// The finalized outcome of one dispatched request.
pub struct Response {
    pub status: u16,
    pub body: Option<Value>,
}

impl Response {
    pub(crate) fn not_found() -> Self {
        Self { status: 404, body: None }
    }

    pub(crate) fn method_not_allowed() -> Self {
        Self { status: 405, body: None }
    }

    pub(crate) fn internal_error() -> Self {
        Self { status: 500, body: None }
    }

    pub(crate) fn from_context(ctx: &mut Context) -> Self {
        let body = ctx.take_body();
        let status = ctx.status().unwrap_or(if body.is_some() { 200 } else { 404 });
        Self { status, body }
    }

    /// Renders onto the wire types the hyper boundary speaks.
    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let status = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        let (content_type, bytes) = match self.body {
            Some(body) => (
                "application/json",
                serde_json::to_vec(&body).unwrap_or_default(),
            ),
            None => (
                "text/plain; charset=utf-8",
                status.canonical_reason().unwrap_or_default().as_bytes().to_vec(),
            ),
        };
        http::Response::builder()
            .status(status)
            .header(http::header::CONTENT_TYPE, content_type)
            .body(Full::new(Bytes::from(bytes)))
            .expect("static response parts")
    }
}
