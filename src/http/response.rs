//! Error responses.
//!
//! Every per-request failure becomes a JSON body
//! `{"error", "code", "message", "details"}` with the mapped HTTP status.
//! Metadata attached to an upstream error is returned as
//! `Grpc-Metadata-*` headers.

use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::codec::metadata::apply_incoming;
use crate::codec::status::{error_body, http_status};
use crate::error::DispatchError;

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let code = self.code();
        let message = self.to_string();
        let mut response = (http_status(code), Json(error_body(code, &message))).into_response();

        if let DispatchError::Upstream(status) = &self {
            apply_incoming(status.metadata(), response.headers_mut());
        }
        response
    }
}
