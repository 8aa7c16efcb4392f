//! Payload codec subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP body bytes ──decode.rs──▶ DynamicMessage (RPC input)
//! RPC output bytes ──encode.rs──▶ JSON | raw HttpBody bytes | NDJSON stream
//! RPC status ──status.rs──▶ HTTP status + JSON error body
//! HTTP headers ◀──metadata.rs──▶ RPC metadata
//! ```
//!
//! # Design Decisions
//! - Messages are handled reflectively; no generated types
//! - `google.api.HttpBody` bypasses JSON in both directions
//! - Decoding is all-or-nothing: a malformed body never yields a partial
//!   message

pub mod decode;
pub mod encode;
pub mod metadata;
pub mod status;

use prost_reflect::{Kind, MessageDescriptor, SerializeOptions};

use crate::config::CodecConfig;

/// Full name of the raw byte-stream message type.
pub const HTTP_BODY: &str = "google.api.HttpBody";

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// JSON marshaling options shared by every request.
#[derive(Debug, Clone, Copy)]
pub struct PayloadCodec {
    pub emit_defaults: bool,
    pub use_proto_names: bool,
}

impl PayloadCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            emit_defaults: config.emit_defaults,
            use_proto_names: config.use_proto_names,
        }
    }

    fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions::new()
            .use_proto_field_name(self.use_proto_names)
            .skip_default_fields(!self.emit_defaults)
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

pub fn is_http_body(message: &MessageDescriptor) -> bool {
    message.full_name() == HTTP_BODY
}

/// The message type behind a field, if it is `google.api.HttpBody`.
pub(crate) fn http_body_kind(kind: &Kind) -> Option<MessageDescriptor> {
    match kind {
        Kind::Message(message) if is_http_body(message) => Some(message.clone()),
        _ => None,
    }
}
