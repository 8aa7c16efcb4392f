//! Upstream RPC subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayRouter
//!     → RpcRequest (method path, encoded input, metadata)
//!     → Upstream::unary | Upstream::server_streaming
//!         grpc.rs: tonic channel + codec.rs (raw protobuf frames)
//!     → RpcResponse | RpcStream (metadata, encoded output)
//! ```
//!
//! # Design Decisions
//! - One channel established at startup; failure to connect is fatal
//! - Calls are bounded by the request context (cancellation, deadline)
//! - Exactly one attempt per request; failures are reported, never retried
//! - Payloads stay opaque here; schema handling lives in `codec`

pub mod codec;
pub mod context;
pub mod grpc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tonic::metadata::MetadataMap;
use tonic::Status;

pub use context::RequestContext;
pub use grpc::GrpcUpstream;

/// Failure establishing the upstream channel.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid upstream URI '{0}'")]
    InvalidUri(String),

    #[error("cannot reach {address}: {source}")]
    Transport {
        address: String,
        source: tonic::transport::Error,
    },

    #[error("shutdown requested before the upstream connected")]
    Cancelled,
}

/// An encoded RPC input bound for `path`.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    /// `/<package>.<Service>/<Method>`.
    pub path: String,
    pub payload: Bytes,
    pub metadata: MetadataMap,
}

/// An encoded unary RPC output.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub metadata: MetadataMap,
    pub payload: Bytes,
}

/// Header metadata plus the encoded messages of a server stream.
pub struct RpcStream {
    pub metadata: MetadataMap,
    pub messages: BoxStream<'static, Result<Bytes, Status>>,
}

impl std::fmt::Debug for RpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcStream")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// The RPC backend as seen by the router.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn unary(&self, request: RpcRequest, ctx: &RequestContext) -> Result<RpcResponse, Status>;

    async fn server_streaming(&self, request: RpcRequest, ctx: &RequestContext) -> Result<RpcStream, Status>;
}
