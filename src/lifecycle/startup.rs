//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the ruleset and connect the upstream
//! - Bind both listeners
//! - Serve until shutdown, supervising the asset listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)
//! - A failing asset listener only stops the process when
//!   `assets.required` is set

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinError;

use crate::codec::PayloadCodec;
use crate::config::endpoint::{ANY_HOST, LOOPBACK_HOST};
use crate::config::{EndpointAddress, GatewayConfig};
use crate::error::{LifecycleError, StartupError};
use crate::http::{AssetServer, GatewayServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{self, ListenerRole};
use crate::observability::metrics;
use crate::routing::{GatewayRouter, Ruleset};
use crate::upstream::{GrpcUpstream, Upstream};

/// A started gateway: ruleset loaded, upstream connected, listeners bound.
pub struct Gateway {
    gateway_server: GatewayServer,
    gateway_listener: TcpListener,
    asset_server: AssetServer,
    assets_listener: TcpListener,
    assets_required: bool,
    shutdown: Shutdown,
}

impl Gateway {
    /// Start from configuration: load the ruleset, connect the upstream,
    /// bind both listeners.
    pub async fn start(config: &GatewayConfig, shutdown: Shutdown) -> Result<Self, StartupError> {
        let ruleset = Ruleset::load(&config.ruleset.path)?;

        let upstream_addr = EndpointAddress::parse(&config.upstream.address, LOOPBACK_HOST)?;
        let upstream = GrpcUpstream::connect(&upstream_addr, &config.upstream, shutdown.token()).await?;

        Self::with_upstream(config, ruleset, Arc::new(upstream), shutdown).await
    }

    /// Start with an already compiled ruleset and upstream.
    pub async fn with_upstream(
        config: &GatewayConfig,
        ruleset: Ruleset,
        upstream: Arc<dyn Upstream>,
        shutdown: Shutdown,
    ) -> Result<Self, StartupError> {
        let gateway_addr = EndpointAddress::parse(&config.gateway.bind_address, ANY_HOST)?;
        let assets_addr = EndpointAddress::parse(&config.assets.bind_address, ANY_HOST)?;

        let router = GatewayRouter::new(
            ruleset,
            upstream,
            PayloadCodec::new(&config.codec),
            config.gateway.max_body_bytes,
        );
        tracing::info!(rules = router.ruleset().len(), "Gateway router ready");

        let gateway_server = GatewayServer::new(
            Arc::new(router),
            shutdown.subscribe(),
            Duration::from_secs(config.gateway.request_timeout_secs),
        );
        let asset_server = AssetServer::new(&config.assets);

        let gateway_listener = net::bind(ListenerRole::Gateway, &gateway_addr).await?;
        let assets_listener = net::bind(ListenerRole::Assets, &assets_addr).await?;

        Ok(Self {
            gateway_server,
            gateway_listener,
            asset_server,
            assets_listener,
            assets_required: config.assets.required,
            shutdown,
        })
    }

    pub fn gateway_addr(&self) -> io::Result<SocketAddr> {
        self.gateway_listener.local_addr()
    }

    pub fn assets_addr(&self) -> io::Result<SocketAddr> {
        self.assets_listener.local_addr()
    }

    /// Serve both listeners until shutdown. Returns `Ok` after a graceful
    /// shutdown.
    pub async fn serve(self) -> Result<(), LifecycleError> {
        let assets = self.asset_server.run(self.assets_listener, self.shutdown.subscribe());
        let gateway = self.gateway_server.run(self.gateway_listener, self.shutdown.subscribe());
        supervise(gateway, assets, self.assets_required, self.shutdown).await
    }
}

/// Drive the gateway listener on the current task and the asset listener
/// on a spawned one.
///
/// The gateway ending for any reason ends the process. The asset listener
/// failing ends it only when `assets_required` is set; otherwise the
/// failure is logged and the gateway keeps serving.
pub async fn supervise<G, A>(gateway: G, assets: A, assets_required: bool, shutdown: Shutdown) -> Result<(), LifecycleError>
where
    G: Future<Output = io::Result<()>>,
    A: Future<Output = io::Result<()>> + Send + 'static,
{
    let mut assets = tokio::spawn(assets);
    tokio::pin!(gateway);

    let mut assets_done = false;
    loop {
        tokio::select! {
            result = &mut gateway => {
                shutdown.trigger();
                if !assets_done {
                    if let Err(source) = assets_outcome((&mut assets).await, &shutdown) {
                        tracing::error!(error = %source, "Asset listener failed during shutdown");
                    }
                }
                return result.map_err(|source| LifecycleError::ListenerFatal {
                    role: ListenerRole::Gateway,
                    source,
                });
            }
            joined = &mut assets, if !assets_done => {
                assets_done = true;
                let Err(source) = assets_outcome(joined, &shutdown) else {
                    continue;
                };

                if assets_required {
                    tracing::error!(error = %source, "Asset listener failed, shutting down");
                    shutdown.trigger();
                    if let Err(e) = (&mut gateway).await {
                        tracing::error!(error = %e, "Gateway listener failed while draining");
                    }
                    return Err(LifecycleError::ListenerFatal {
                        role: ListenerRole::Assets,
                        source,
                    });
                }
                tracing::error!(error = %source, "Asset listener failed, gateway keeps serving");
            }
        }
    }
}

/// Reduce the asset task result to an I/O outcome. Stopping before
/// shutdown was requested counts as a failure.
fn assets_outcome(joined: Result<io::Result<()>, JoinError>, shutdown: &Shutdown) -> io::Result<()> {
    match joined {
        Ok(Ok(())) if shutdown.is_triggered() => Ok(()),
        Ok(Ok(())) => Err(io::Error::other("asset listener stopped unexpectedly")),
        Ok(Err(e)) => Err(e),
        Err(join) => Err(io::Error::other(join.to_string())),
    }
}

/// Bring the process up and serve until `shutdown` is triggered.
pub async fn run(config: GatewayConfig, shutdown: Shutdown) -> Result<(), LifecycleError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e| StartupError::Metrics(format!("{}: {}", config.observability.metrics_address, e)))?;
        metrics::init_metrics(addr).map_err(StartupError::Metrics)?;
    }

    let gateway = Gateway::start(&config, shutdown).await?;
    tracing::info!(
        upstream = %config.upstream.address,
        gateway = %gateway.gateway_addr().map(|a| a.to_string()).unwrap_or_default(),
        assets = %gateway.assets_addr().map(|a| a.to_string()).unwrap_or_default(),
        "Gateway started"
    );

    gateway.serve().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
