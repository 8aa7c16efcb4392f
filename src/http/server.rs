//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Create the Axum router whose only handler delegates to the
//!   [`GatewayRouter`]
//! - Wire up middleware (request ID, tracing)
//! - Build a request context per request (deadline, cancellation)
//! - Serve on a bound listener until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::routing::GatewayRouter;
use crate::upstream::context::{parse_grpc_timeout, RequestContext};

const GRPC_TIMEOUT: &str = "grpc-timeout";

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<GatewayRouter>,
    /// Ancestor of every request context.
    pub lifecycle: CancellationToken,
    /// Deadline applied when the client sends no `grpc-timeout`.
    pub request_timeout: Duration,
}

/// HTTP server for the REST surface.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(router: Arc<GatewayRouter>, lifecycle: CancellationToken, request_timeout: Duration) -> Self {
        let state = AppState {
            router,
            lifecycle,
            request_timeout,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// The configured router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is cancelled, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway listener serving");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!(address = %addr, "Gateway listener stopped");
        Ok(())
    }
}

/// The only gateway handler: delegate and write the result verbatim.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let timeout = request
        .headers()
        .get(GRPC_TIMEOUT)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_grpc_timeout)
        .unwrap_or(state.request_timeout);
    let ctx = RequestContext::new(request_id(request.headers()), &state.lifecycle, Some(timeout));

    match state.router.dispatch(request, &ctx).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}
