//! HTTP server boundary and graceful shutdown.
//!
//! The server is the demonstration harness around a compiled
//! [`Service`]: it accepts connections, lowers each hyper request into a
//! [`Request`](crate::Request), hands it to [`Service::dispatch`], and
//! writes the finalized response back. Nothing here is required to use
//! the crate — tests drive `dispatch` directly.
//!
//! Shutdown follows the usual container contract: on SIGTERM or Ctrl-C
//! the listener stops accepting immediately and every in-flight
//! connection drains before [`Server::serve`] returns.

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::context::Request;
use crate::error::Error;
use crate::response::Response;
use crate::service::Service;
use crate::verb::Verb;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Accepts connections and dispatches them through `service` until a
    /// full graceful shutdown completes.
    pub async fn serve<T: Send + Sync + 'static>(self, service: Service<T>) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;

        // Shared across concurrent connection tasks; the route table
        // itself is immutable after compilation.
        let service = Arc::new(service);

        info!(addr = %self.addr, prefix = service.router().prefix(), "tsugi listening");

        // Track every connection task so shutdown can drain them.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops new accepts even
                // when connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let service = Arc::clone(&service);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let service = Arc::clone(&service);
                            async move { handle(service, req).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("tsugi stopped");
        Ok(())
    }
}

// ── Request lowering ──────────────────────────────────────────────────────────

/// Lowers one hyper request into the context's request shape and routes it.
///
/// The error type is [`Infallible`](std::convert::Infallible): every
/// failure is rendered as a response, hyper never sees an error.
async fn handle<T: Send + Sync + 'static>(
    service: Arc<Service<T>>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let (parts, body) = req.into_parts();

    // Unroutable methods are rejected before the router is consulted.
    let Some(verb) = Verb::from_method(&parts.method) else {
        return Ok(Response::method_not_allowed().into_http());
    };

    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned());
    let mut request = Request::new(verb, &target);

    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return Ok(Response { status: 400, body: None }.into_http());
        }
    };
    let request = request.with_raw_body(bytes.to_vec());

    Ok(service.dispatch(request).await.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives: SIGTERM
/// (orchestrators) or SIGINT (Ctrl-C) on Unix, Ctrl-C only elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // Never resolves, which disables the SIGTERM arm off Unix.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
