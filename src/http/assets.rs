//! Documentation asset server.
//!
//! # Responsibilities
//! - Serve the API viewer under `/swaggerui/`
//! - Serve generated schema files under `/grpc/`
//! - Answer 404 for everything else
//!
//! # Design Decisions
//! - Purely static; no knowledge of the ruleset or upstream
//! - `ServeDir` rejects `..` components, so requests cannot leave a root

use std::net::SocketAddr;

use axum::{http::StatusCode, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::AssetsConfig;

pub const SWAGGER_UI_PREFIX: &str = "/swaggerui";
pub const SCHEMA_PREFIX: &str = "/grpc";

/// HTTP server for static documentation assets.
pub struct AssetServer {
    router: Router,
}

impl AssetServer {
    pub fn new(config: &AssetsConfig) -> Self {
        let router = Router::new()
            .nest_service(SWAGGER_UI_PREFIX, ServeDir::new(&config.swagger_ui_dir))
            .nest_service(SCHEMA_PREFIX, ServeDir::new(&config.schema_dir))
            .fallback(|| async { StatusCode::NOT_FOUND })
            .layer(TraceLayer::new_for_http());

        if !config.swagger_ui_dir.is_dir() {
            tracing::warn!(dir = %config.swagger_ui_dir.display(), "Viewer asset directory missing");
        }
        if !config.schema_dir.is_dir() {
            tracing::warn!(dir = %config.schema_dir.display(), "Schema directory missing");
        }

        Self { router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is cancelled.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Asset listener serving");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        tracing::info!(address = %addr, "Asset listener stopped");
        Ok(())
    }
}
