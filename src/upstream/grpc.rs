//! tonic-backed upstream connector.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::uri::PathAndQuery;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tonic::client::Grpc;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};

use crate::config::{EndpointAddress, UpstreamConfig};
use crate::upstream::codec::PassthroughCodec;
use crate::upstream::context::RequestContext;
use crate::upstream::{ConnectError, RpcRequest, RpcResponse, RpcStream, Upstream};

/// One multiplexed HTTP/2 channel to the backend, cloned per call.
#[derive(Debug, Clone)]
pub struct GrpcUpstream {
    channel: Channel,
}

impl GrpcUpstream {
    /// Establish the channel. Fails if the backend cannot be reached
    /// within the connect timeout or `lifecycle` is cancelled first.
    pub async fn connect(
        address: &EndpointAddress,
        config: &UpstreamConfig,
        lifecycle: &CancellationToken,
    ) -> Result<Self, ConnectError> {
        let uri = address.to_http_uri();
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|_| ConnectError::InvalidUri(uri.clone()))?
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .http2_keep_alive_interval(Duration::from_secs(config.keepalive_secs))
            .keep_alive_timeout(Duration::from_secs(10))
            .keep_alive_while_idle(true);

        let channel = tokio::select! {
            _ = lifecycle.cancelled() => return Err(ConnectError::Cancelled),
            result = endpoint.connect() => result.map_err(|source| ConnectError::Transport {
                address: address.to_string(),
                source,
            })?,
        };

        tracing::info!(upstream = %address, "Connected to RPC backend");
        Ok(Self { channel })
    }

    fn prepare(request: RpcRequest, ctx: &RequestContext) -> Result<(PathAndQuery, Request<bytes::Bytes>), Status> {
        let path = PathAndQuery::try_from(request.path.as_str())
            .map_err(|_| Status::internal(format!("invalid RPC path '{}'", request.path)))?;

        let mut call = Request::from_parts(request.metadata, Default::default(), request.payload);
        if let Some(remaining) = ctx.remaining() {
            call.set_timeout(remaining);
        }
        Ok((path, call))
    }

    async fn client(&self) -> Result<Grpc<Channel>, Status> {
        let mut client = Grpc::new(self.channel.clone());
        client
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("upstream not ready: {}", e)))?;
        Ok(client)
    }
}

#[async_trait]
impl Upstream for GrpcUpstream {
    async fn unary(&self, request: RpcRequest, ctx: &RequestContext) -> Result<RpcResponse, Status> {
        let (path, call) = Self::prepare(request, ctx)?;

        ctx.guard(async {
            let mut client = self.client().await?;
            let response = client.unary(call, path, PassthroughCodec).await?;
            let (metadata, payload, _) = response.into_parts();
            Ok(RpcResponse { metadata, payload })
        })
        .await
    }

    async fn server_streaming(&self, request: RpcRequest, ctx: &RequestContext) -> Result<RpcStream, Status> {
        let (path, call) = Self::prepare(request, ctx)?;

        let response = ctx
            .guard(async {
                let mut client = self.client().await?;
                client.server_streaming(call, path, PassthroughCodec).await
            })
            .await?;

        let (metadata, messages, _) = response.into_parts();
        Ok(RpcStream {
            metadata,
            messages: messages.boxed(),
        })
    }
}
