//! HTTP headers ↔ RPC metadata.
//!
//! Outgoing:
//! - `Grpc-Metadata-<key>` headers are forwarded as `<key>`
//! - permanent HTTP headers are forwarded as `grpcgateway-<name>`
//! - `x-forwarded-host` and `x-forwarded-for` are added
//!
//! Incoming: response metadata comes back as `Grpc-Metadata-<key>`.

use std::net::SocketAddr;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use base64::Engine;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue, KeyAndValueRef, MetadataMap};

pub const METADATA_HEADER_PREFIX: &str = "grpc-metadata-";
pub const PERMANENT_HEADER_PREFIX: &str = "grpcgateway-";

const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

const PERMANENT_HEADERS: &[&str] = &[
    "accept",
    "accept-charset",
    "accept-language",
    "accept-ranges",
    "authorization",
    "cache-control",
    "content-type",
    "cookie",
    "date",
    "expect",
    "from",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-schedule-tag-match",
    "if-unmodified-since",
    "max-forwards",
    "origin",
    "pragma",
    "referer",
    "user-agent",
    "via",
    "warning",
];

pub fn is_permanent_header(name: &str) -> bool {
    PERMANENT_HEADERS.contains(&name)
}

/// Metadata to send with the RPC for an incoming request.
pub fn outgoing(headers: &HeaderMap, peer: Option<SocketAddr>) -> MetadataMap {
    let mut metadata = MetadataMap::new();

    for (name, value) in headers {
        let name = name.as_str();
        let Ok(value) = value.to_str() else {
            tracing::debug!(header = %name, "Skipping non-ASCII header");
            continue;
        };

        if let Some(key) = name.strip_prefix(METADATA_HEADER_PREFIX) {
            append(&mut metadata, key, value);
        } else if is_permanent_header(name) {
            append(&mut metadata, &format!("{}{}", PERMANENT_HEADER_PREFIX, name), value);
        }
    }

    let host = headers.get(X_FORWARDED_HOST).or_else(|| headers.get(HOST));
    if let Some(host) = host.and_then(|h| h.to_str().ok()) {
        append(&mut metadata, X_FORWARDED_HOST, host);
    }

    if let Some(peer) = peer {
        let client = peer.ip().to_string();
        let forwarded = match headers.get(X_FORWARDED_FOR).and_then(|h| h.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, client),
            None => client,
        };
        append(&mut metadata, X_FORWARDED_FOR, &forwarded);
    }

    metadata
}

fn append(metadata: &mut MetadataMap, key: &str, value: &str) {
    if key.ends_with("-bin") {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(value)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(value));
        match (BinaryMetadataKey::from_bytes(key.as_bytes()), decoded) {
            (Ok(key), Ok(bytes)) => {
                metadata.append_bin(key, BinaryMetadataValue::from_bytes(&bytes));
            }
            _ => tracing::debug!(key = %key, "Skipping malformed binary metadata"),
        }
        return;
    }

    match (AsciiMetadataKey::from_bytes(key.as_bytes()), value.parse::<AsciiMetadataValue>()) {
        (Ok(key), Ok(value)) => {
            metadata.append(key, value);
        }
        _ => tracing::debug!(key = %key, "Skipping malformed metadata"),
    }
}

/// Copy RPC response metadata onto the HTTP response headers.
pub fn apply_incoming(metadata: &MetadataMap, headers: &mut HeaderMap) {
    for entry in metadata.iter() {
        let (key, encoded) = match entry {
            KeyAndValueRef::Ascii(key, value) => (key.as_str(), value.as_encoded_bytes()),
            KeyAndValueRef::Binary(key, value) => (key.as_str(), value.as_encoded_bytes()),
        };
        if key == "content-type" || key.starts_with("grpc-") {
            continue;
        }

        let name = HeaderName::from_bytes(format!("{}{}", METADATA_HEADER_PREFIX, key).as_bytes());
        match (name, HeaderValue::from_bytes(encoded)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(key = %key, "Skipping metadata not representable as a header"),
        }
    }
}
