//! RPC output → HTTP response body.

use std::convert::Infallible;

use axum::body::Body;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{future, StreamExt};
use prost_reflect::{DynamicMessage, ReflectMessage, SerializeOptions};
use tokio_util::sync::CancellationToken;
use tonic::Status;

use crate::codec::status::error_body;
use crate::codec::{http_body_kind, is_http_body, PayloadCodec, JSON_CONTENT_TYPE, NDJSON_CONTENT_TYPE, OCTET_STREAM};
use crate::error::DispatchError;
use crate::routing::rules::TranslationRule;

/// A fully buffered response body.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub content_type: String,
    pub body: Bytes,
}

/// A streamed response body; headers can be sent before it completes.
pub struct EncodedStream {
    pub content_type: String,
    pub body: Body,
}

impl std::fmt::Debug for EncodedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedStream")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl PayloadCodec {
    /// Encode a unary RPC output.
    pub fn encode_unary(&self, rule: &TranslationRule, payload: Bytes) -> Result<Encoded, DispatchError> {
        let message = decode_output(rule, payload).map_err(|s| DispatchError::Internal(s.message().to_string()))?;

        if is_raw(rule) {
            let (content_type, body) = raw_parts(rule, &message);
            return Ok(Encoded {
                content_type: content_type.unwrap_or_else(|| OCTET_STREAM.to_string()),
                body,
            });
        }

        let value = self.to_json(rule, &message).map_err(|s| DispatchError::Internal(s.message().to_string()))?;
        let body = serde_json::to_vec(&value).map_err(|e| DispatchError::Internal(e.to_string()))?;
        Ok(Encoded {
            content_type: JSON_CONTENT_TYPE.to_string(),
            body: Bytes::from(body),
        })
    }

    /// Encode a server stream. The first message is awaited so that an
    /// immediate failure still produces a proper error status; later
    /// failures end the body. The stream stops when `token` is cancelled.
    pub async fn encode_stream(
        &self,
        rule: &TranslationRule,
        messages: BoxStream<'static, Result<Bytes, Status>>,
        token: CancellationToken,
    ) -> Result<EncodedStream, DispatchError> {
        let mut messages = messages.take_until(token.cancelled_owned()).boxed();

        let first = match messages.next().await {
            Some(Ok(bytes)) => Some(bytes),
            Some(Err(status)) => return Err(DispatchError::Upstream(status)),
            None => None,
        };

        if is_raw(rule) {
            return raw_stream(rule.clone(), first, messages);
        }

        let codec = *self;
        let rule = rule.clone();
        let lines = stream::iter(first.map(Ok))
            .chain(messages)
            .scan(false, move |failed, item| {
                if *failed {
                    return future::ready(None);
                }
                let line = match item.and_then(|bytes| codec.result_line(&rule, bytes)) {
                    Ok(line) => line,
                    Err(status) => {
                        *failed = true;
                        error_line(&status)
                    }
                };
                future::ready(Some(Ok::<_, Infallible>(line)))
            });

        Ok(EncodedStream {
            content_type: NDJSON_CONTENT_TYPE.to_string(),
            body: Body::from_stream(lines),
        })
    }

    fn result_line(&self, rule: &TranslationRule, bytes: Bytes) -> Result<Bytes, Status> {
        let message = decode_output(rule, bytes)?;
        let value = self.to_json(rule, &message)?;
        ndjson(&serde_json::json!({ "result": value }))
    }

    fn to_json(&self, rule: &TranslationRule, message: &DynamicMessage) -> Result<serde_json::Value, Status> {
        let Some(field) = &rule.response_body else {
            return serialize(message, &self.serialize_options());
        };

        // Serialize only the selected field so its name and defaults follow
        // the same options as a whole message would.
        let mut only = DynamicMessage::new(message.descriptor());
        only.set_field(field, message.get_field(field).into_owned());
        let key = if self.use_proto_names { field.name() } else { field.json_name() };

        let mut value = serialize(&only, &self.serialize_options())?;
        if let Some(selected) = value.as_object_mut().and_then(|o| o.remove(key)) {
            return Ok(selected);
        }
        let mut value = serialize(&only, &self.serialize_options().skip_default_fields(false))?;
        Ok(value
            .as_object_mut()
            .and_then(|o| o.remove(key))
            .unwrap_or(serde_json::Value::Null))
    }
}

fn raw_stream(
    rule: TranslationRule,
    first: Option<Bytes>,
    rest: BoxStream<'static, Result<Bytes, Status>>,
) -> Result<EncodedStream, DispatchError> {
    let first = match first {
        Some(bytes) => {
            let message = decode_output(&rule, bytes).map_err(|s| DispatchError::Internal(s.message().to_string()))?;
            Some(raw_parts(&rule, &message))
        }
        None => None,
    };
    let content_type = first
        .as_ref()
        .and_then(|(content_type, _)| content_type.clone())
        .unwrap_or_else(|| OCTET_STREAM.to_string());

    let chunks = stream::iter(first.map(|(_, data)| Ok(data))).chain(rest.map(move |item| {
        let message = decode_output(&rule, item?)?;
        Ok::<_, Status>(raw_parts(&rule, &message).1)
    }));

    Ok(EncodedStream {
        content_type,
        body: Body::from_stream(chunks),
    })
}

/// Whether the response is written as raw bytes instead of JSON.
pub fn is_raw(rule: &TranslationRule) -> bool {
    match &rule.response_body {
        None => is_http_body(&rule.output()),
        Some(field) => http_body_kind(&field.kind()).is_some(),
    }
}

fn decode_output(rule: &TranslationRule, bytes: Bytes) -> Result<DynamicMessage, Status> {
    DynamicMessage::decode(rule.output(), bytes)
        .map_err(|e| Status::internal(format!("undecodable {} from upstream: {}", rule.output().full_name(), e)))
}

/// Content type and data of an `HttpBody` output (or selected field).
fn raw_parts(rule: &TranslationRule, message: &DynamicMessage) -> (Option<String>, Bytes) {
    let body = match &rule.response_body {
        Some(field) => match message.get_field(field).as_message() {
            Some(inner) => inner.clone(),
            None => return (None, Bytes::new()),
        },
        None => message.clone(),
    };

    let content_type = body
        .get_field_by_name("content_type")
        .and_then(|v| v.as_str().map(str::to_string))
        .filter(|v| !v.is_empty());
    let data = body
        .get_field_by_name("data")
        .and_then(|v| v.as_bytes().cloned())
        .unwrap_or_default();
    (content_type, data)
}

fn serialize(message: &DynamicMessage, options: &SerializeOptions) -> Result<serde_json::Value, Status> {
    message
        .serialize_with_options(serde_json::value::Serializer, options)
        .map_err(|e| Status::internal(format!("cannot render response: {}", e)))
}

fn ndjson(value: &serde_json::Value) -> Result<Bytes, Status> {
    let mut line = serde_json::to_vec(value).map_err(|e| Status::internal(e.to_string()))?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

fn error_line(status: &Status) -> Bytes {
    let value = serde_json::json!({ "error": error_body(status.code(), status.message()) });
    let mut line = value.to_string().into_bytes();
    line.push(b'\n');
    Bytes::from(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::rules::Ruleset;
    use crate::test_fixtures::{demo_pool, DEMO_RULESET};
    use axum::http::Method;
    use prost::Message;
    use prost_reflect::Value;

    fn rule(method: Method, path: &str) -> TranslationRule {
        let rules = Ruleset::from_toml_str(DEMO_RULESET, demo_pool()).unwrap();
        rules.find(&method, path).unwrap().0.clone()
    }

    fn item(name: &str, count: i64) -> Bytes {
        let mut message = DynamicMessage::new(demo_pool().get_message_by_name("demo.v1.Item").unwrap());
        message.set_field_by_name("name", Value::String(name.into()));
        message.set_field_by_name("count", Value::I64(count));
        Bytes::from(message.encode_to_vec())
    }

    fn http_body(content_type: &str, data: &'static [u8]) -> Bytes {
        let mut message = DynamicMessage::new(demo_pool().get_message_by_name("google.api.HttpBody").unwrap());
        message.set_field_by_name("content_type", Value::String(content_type.into()));
        message.set_field_by_name("data", Value::Bytes(Bytes::from_static(data)));
        Bytes::from(message.encode_to_vec())
    }

    async fn collect(body: Body) -> Bytes {
        axum::body::to_bytes(body, usize::MAX).await.unwrap()
    }

    #[test]
    fn unary_json_omits_defaults() {
        let encoded = PayloadCodec::default()
            .encode_unary(&rule(Method::GET, "/v1/items/42"), item("widget", 0))
            .unwrap();
        assert_eq!(encoded.content_type, "application/json");
        assert_eq!(encoded.body, Bytes::from_static(br#"{"name":"widget"}"#));
    }

    #[test]
    fn emit_defaults_and_json_names() {
        let codec = PayloadCodec {
            emit_defaults: true,
            use_proto_names: false,
        };
        let encoded = codec.encode_unary(&rule(Method::GET, "/v1/items"), Bytes::new()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded.body).unwrap();
        assert_eq!(value["items"], serde_json::json!([]));
        assert_eq!(value["nextPageToken"], "");
    }

    #[test]
    fn response_body_selects_one_field() {
        let rules = Ruleset::from_toml_str(
            r#"
[[rules]]
selector = "demo.v1.Items.ListItems"
method = "GET"
pattern = "/v1/items"
response_body = "items"

[[rules]]
selector = "demo.v1.Items.ListItems"
method = "GET"
pattern = "/v1/items:token"
response_body = "next_page_token"
"#,
            demo_pool(),
        )
        .unwrap();

        let mut response = DynamicMessage::new(demo_pool().get_message_by_name("demo.v1.ListItemsResponse").unwrap());
        let first = DynamicMessage::decode(demo_pool().get_message_by_name("demo.v1.Item").unwrap(), item("a", 0)).unwrap();
        response.set_field_by_name("items", Value::List(vec![Value::Message(first)]));
        let payload = Bytes::from(response.encode_to_vec());

        let (items, _) = rules.find(&Method::GET, "/v1/items").unwrap();
        let encoded = PayloadCodec::default().encode_unary(items, payload.clone()).unwrap();
        assert_eq!(encoded.body, Bytes::from_static(br#"[{"name":"a"}]"#));

        let (token, _) = rules.find(&Method::GET, "/v1/items:token").unwrap();
        let encoded = PayloadCodec::default().encode_unary(token, payload).unwrap();
        assert_eq!(encoded.body, Bytes::from_static(br#""""#));
    }

    #[test]
    fn http_body_output_is_written_verbatim() {
        let data: &'static [u8] = &[0xff, 0x00, b'\n', 0x7f];
        let encoded = PayloadCodec::default()
            .encode_unary(&rule(Method::GET, "/v1/items/1:download"), http_body("image/png", data))
            .unwrap();
        assert_eq!(encoded.content_type, "image/png");
        assert_eq!(encoded.body.as_ref(), data);
    }

    #[test]
    fn garbage_from_upstream_is_internal() {
        let err = PayloadCodec::default()
            .encode_unary(&rule(Method::GET, "/v1/items/42"), Bytes::from_static(&[0xff, 0xff, 0xff]))
            .unwrap_err();
        assert!(matches!(err, DispatchError::Internal(_)));
    }

    #[tokio::test]
    async fn json_stream_is_newline_delimited_with_error_trailer() {
        let messages = stream::iter(vec![
            Ok(item("a", 1)),
            Ok(item("b", 2)),
            Err(Status::unavailable("backend went away")),
        ])
        .boxed();

        let encoded = PayloadCodec::default()
            .encode_stream(&rule(Method::GET, "/v1/items:watch"), messages, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(encoded.content_type, "application/x-ndjson");

        let body = collect(encoded.body).await;
        let lines: Vec<serde_json::Value> = body
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_slice(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["result"]["name"], "a");
        assert_eq!(lines[1]["result"]["count"], "2");
        assert_eq!(lines[2]["error"]["code"], 14);
    }

    #[tokio::test]
    async fn immediate_stream_failure_is_an_error() {
        let messages = stream::iter(vec![Err(Status::not_found("nothing"))]).boxed();
        let err = PayloadCodec::default()
            .encode_stream(&rule(Method::GET, "/v1/items:watch"), messages, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn raw_stream_keeps_chunks_and_first_content_type() {
        let messages = stream::iter(vec![
            Ok(http_body("text/csv", b"a,b\n")),
            Ok(http_body("", b"1,2\n")),
        ])
        .boxed();

        let encoded = PayloadCodec::default()
            .encode_stream(&rule(Method::GET, "/v1/items/1:stream"), messages, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(encoded.content_type, "text/csv");
        assert_eq!(collect(encoded.body).await, Bytes::from_static(b"a,b\n1,2\n"));
    }

    #[tokio::test]
    async fn cancelled_stream_ends() {
        let token = CancellationToken::new();
        token.cancel();
        let messages = stream::pending::<Result<Bytes, Status>>().boxed();
        let encoded = PayloadCodec::default()
            .encode_stream(&rule(Method::GET, "/v1/items:watch"), messages, token)
            .await
            .unwrap();
        assert!(collect(encoded.body).await.is_empty());
    }
}
