//! Rule lookup and dispatch.
//!
//! # Responsibilities
//! - Match method and path against the ruleset, first match wins
//! - Assemble the RPC input from body, query and path parameters
//! - Make exactly one upstream call and encode its result
//!
//! # Design Decisions
//! - Immutable after construction; shared by every connection task
//! - All local validation happens before the upstream is contacted
//! - No retries: a failed call is reported as is

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{HeaderValue, CONTENT_TYPE};
use axum::http::{Request, Response};
use prost::Message;
use tonic::metadata::MetadataMap;

use crate::codec::metadata::{apply_incoming, outgoing};
use crate::codec::status::http_status;
use crate::codec::{decode::decode_body, PayloadCodec, OCTET_STREAM};
use crate::error::DispatchError;
use crate::observability::metrics;
use crate::routing::params::{path_bindings, query_bindings, ParamError};
use crate::routing::rules::{BodyBinding, Ruleset, TranslationRule};
use crate::upstream::{RequestContext, RpcRequest, Upstream};

/// Translates HTTP requests into RPC calls against one upstream.
pub struct GatewayRouter {
    ruleset: Ruleset,
    upstream: Arc<dyn Upstream>,
    codec: PayloadCodec,
    max_body_bytes: usize,
}

impl GatewayRouter {
    pub fn new(ruleset: Ruleset, upstream: Arc<dyn Upstream>, codec: PayloadCodec, max_body_bytes: usize) -> Self {
        Self {
            ruleset,
            upstream,
            codec,
            max_body_bytes,
        }
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Handle one request end to end.
    pub async fn dispatch(&self, request: Request<Body>, ctx: &RequestContext) -> Result<Response<Body>, DispatchError> {
        let start = Instant::now();
        let method = request.method().clone();

        let (rpc, result) = match self.ruleset.find(request.method(), request.uri().path()) {
            Some((rule, captures)) => (rule.selector.as_str(), self.invoke(rule, captures, request, ctx).await),
            None => {
                let path = request.uri().path().to_string();
                tracing::debug!(request_id = %ctx.request_id(), method = %method, path = %path, "No rule matched");
                (metrics::NO_RPC, Err(DispatchError::NotFound { method: method.clone(), path }))
            }
        };

        let status = match &result {
            Ok(response) => response.status(),
            Err(err) => {
                if let DispatchError::Upstream(status) = err {
                    metrics::record_upstream_error(status.code());
                }
                http_status(err.code())
            }
        };
        metrics::record_request(method.as_str(), status.as_u16(), rpc, start);

        result
    }

    async fn invoke(
        &self,
        rule: &TranslationRule,
        captures: Vec<(String, String)>,
        request: Request<Body>,
        ctx: &RequestContext,
    ) -> Result<Response<Body>, DispatchError> {
        let path_params = path_bindings(rule, captures).map_err(invalid)?;
        let query_params = match rule.body {
            BodyBinding::Whole => Vec::new(),
            _ => query_bindings(rule, request.uri().query()).map_err(invalid)?,
        };

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| DispatchError::InvalidArgument(format!("cannot read request body: {}", e)))?;

        let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let mut input = decode_body(rule, &body, content_type)?;
        for binding in query_params.into_iter().chain(path_params) {
            binding.apply(&mut input).map_err(invalid)?;
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let call = RpcRequest {
            path: rule.rpc_path.clone(),
            payload: input.encode_to_vec().into(),
            metadata: outgoing(&parts.headers, peer),
        };

        tracing::debug!(
            request_id = %ctx.request_id(),
            rpc = %rule.rpc_path,
            streaming = rule.is_server_streaming(),
            "Invoking upstream"
        );

        let result = if rule.is_server_streaming() {
            self.stream(rule, call, ctx).await
        } else {
            self.unary(rule, call, ctx).await
        };

        if let Err(DispatchError::Upstream(status)) = &result {
            tracing::warn!(
                request_id = %ctx.request_id(),
                rpc = %rule.rpc_path,
                code = ?status.code(),
                message = %status.message(),
                "Upstream call failed"
            );
        }
        result
    }

    async fn unary(&self, rule: &TranslationRule, call: RpcRequest, ctx: &RequestContext) -> Result<Response<Body>, DispatchError> {
        let reply = self.upstream.unary(call, ctx).await?;
        let encoded = self.codec.encode_unary(rule, reply.payload)?;
        Ok(respond(&encoded.content_type, Body::from(encoded.body), &reply.metadata))
    }

    async fn stream(&self, rule: &TranslationRule, call: RpcRequest, ctx: &RequestContext) -> Result<Response<Body>, DispatchError> {
        let stream = self.upstream.server_streaming(call, ctx).await?;
        let encoded = ctx
            .guard(self.codec.encode_stream(rule, stream.messages, ctx.token().clone()))
            .await?;
        Ok(respond(&encoded.content_type, encoded.body, &stream.metadata))
    }
}

fn respond(content_type: &str, body: Body, metadata: &MetadataMap) -> Response<Body> {
    let mut response = Response::new(body);
    let content_type = HeaderValue::from_str(content_type).unwrap_or(HeaderValue::from_static(OCTET_STREAM));
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    apply_incoming(metadata, response.headers_mut());
    response
}

fn invalid(err: ParamError) -> DispatchError {
    DispatchError::InvalidArgument(err.to_string())
}
