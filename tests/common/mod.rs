//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use prost::Message;
use prost_reflect::{DynamicMessage, SerializeOptions};
use tonic::metadata::MetadataMap;
use tonic::{Code, Status};

use rpc_gateway::codec::PayloadCodec;
use rpc_gateway::routing::{GatewayRouter, Ruleset};
use rpc_gateway::upstream::{RequestContext, RpcRequest, RpcResponse, RpcStream, Upstream};

#[path = "../../src/test_fixtures.rs"]
mod fixtures;

// Each test binary uses a different subset.
#[allow(unused_imports)]
pub use fixtures::{demo_file_set, demo_pool, DEMO_RULESET};

/// What the mock backend does with each call.
#[derive(Clone)]
pub enum Behavior {
    Reply { payload: Bytes, metadata: MetadataMap },
    Fail(Status),
    Stream(Vec<Result<Bytes, Status>>),
    /// Never answers; returns once the request context is cancelled or
    /// its deadline passes.
    Hang,
}

/// In-process stand-in for the RPC backend.
pub struct MockUpstream {
    behavior: Mutex<Behavior>,
    calls: Mutex<Vec<RpcRequest>>,
    observed_cancel: AtomicBool,
}

impl MockUpstream {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: Mutex::new(Vec::new()),
            observed_cancel: AtomicBool::new(false),
        })
    }

    pub fn replying(message: &str, json: serde_json::Value) -> Arc<Self> {
        Self::new(Behavior::Reply {
            payload: encode(message, json),
            metadata: MetadataMap::new(),
        })
    }

    pub fn calls(&self) -> Vec<RpcRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn observed_cancel(&self) -> bool {
        self.observed_cancel.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.calls.lock().unwrap().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} upstream calls", n);
    }

    fn record(&self, request: RpcRequest) -> Behavior {
        self.calls.lock().unwrap().push(request);
        self.behavior.lock().unwrap().clone()
    }

    async fn hang(&self, ctx: &RequestContext) -> Status {
        let result = ctx
            .guard(std::future::pending::<Result<(), Status>>())
            .await;
        let status = match result {
            Err(status) => status,
            Ok(()) => Status::internal("pending future completed"),
        };
        if status.code() == Code::Cancelled {
            self.observed_cancel.store(true, Ordering::SeqCst);
        }
        status
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn unary(&self, request: RpcRequest, ctx: &RequestContext) -> Result<RpcResponse, Status> {
        match self.record(request) {
            Behavior::Reply { payload, metadata } => Ok(RpcResponse { metadata, payload }),
            Behavior::Fail(status) => Err(status),
            Behavior::Stream(_) => Err(Status::internal("unary call on a streaming mock")),
            Behavior::Hang => Err(self.hang(ctx).await),
        }
    }

    async fn server_streaming(&self, request: RpcRequest, ctx: &RequestContext) -> Result<RpcStream, Status> {
        match self.record(request) {
            Behavior::Stream(messages) => Ok(RpcStream {
                metadata: MetadataMap::new(),
                messages: futures_util::stream::iter(messages).boxed(),
            }),
            Behavior::Fail(status) => Err(status),
            Behavior::Reply { payload, metadata } => Ok(RpcStream {
                metadata,
                messages: futures_util::stream::iter(vec![Ok(payload)]).boxed(),
            }),
            Behavior::Hang => Err(self.hang(ctx).await),
        }
    }
}

pub fn ruleset() -> Ruleset {
    Ruleset::from_toml_str(DEMO_RULESET, demo_pool()).unwrap()
}

pub fn router(upstream: Arc<MockUpstream>) -> GatewayRouter {
    GatewayRouter::new(ruleset(), upstream, PayloadCodec::default(), 1024 * 1024)
}

/// Protobuf-encode a JSON description of `message`.
pub fn encode(message: &str, json: serde_json::Value) -> Bytes {
    let descriptor = demo_pool().get_message_by_name(message).unwrap();
    let message = DynamicMessage::deserialize(descriptor, json).unwrap();
    Bytes::from(message.encode_to_vec())
}

/// Decode protobuf bytes of `message` into JSON with proto field names.
pub fn decode(message: &str, bytes: &Bytes) -> serde_json::Value {
    let descriptor = demo_pool().get_message_by_name(message).unwrap();
    let message = DynamicMessage::decode(descriptor, bytes.clone()).unwrap();
    message
        .serialize_with_options(
            serde_json::value::Serializer,
            &SerializeOptions::new().use_proto_field_name(true),
        )
        .unwrap()
}

pub fn http_body(content_type: &str, data: &[u8]) -> Bytes {
    encode(
        "google.api.HttpBody",
        serde_json::json!({
            "content_type": content_type,
            "data": base64_encode(data),
        }),
    )
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}
