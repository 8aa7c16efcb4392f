//! HTTP body → RPC input message.

use bytes::Bytes;
use prost_reflect::{DynamicMessage, MessageDescriptor, Value};

use crate::codec::{http_body_kind, is_http_body};
use crate::error::DispatchError;
use crate::routing::rules::{BodyBinding, TranslationRule};

/// Build the RPC input message from the request body according to the
/// rule's body binding. Parameters are applied afterwards by the caller.
pub fn decode_body(rule: &TranslationRule, body: &Bytes, content_type: Option<&str>) -> Result<DynamicMessage, DispatchError> {
    let input = rule.input();

    match &rule.body {
        BodyBinding::None => {
            if !is_blank(body) {
                return Err(DispatchError::InvalidArgument(format!(
                    "{} {} does not accept a request body",
                    rule.method, rule.template
                )));
            }
            Ok(DynamicMessage::new(input))
        }
        BodyBinding::Whole => {
            if is_http_body(&input) {
                return http_body(input, body, content_type);
            }
            if is_blank(body) {
                return Ok(DynamicMessage::new(input));
            }
            from_json(input, body)
        }
        BodyBinding::Field(field) => {
            let mut message = DynamicMessage::new(input.clone());
            if let Some(target) = http_body_kind(&field.kind()) {
                let inner = http_body(target, body, content_type)?;
                message.set_field(field, Value::Message(inner));
                return Ok(message);
            }
            if is_blank(body) {
                return Ok(message);
            }

            // Wrap the body under the field's name so the input schema
            // validates it, scalars and lists included.
            let value: serde_json::Value = serde_json::from_slice(body).map_err(invalid_json)?;
            let mut wrapper = serde_json::Map::new();
            wrapper.insert(field.name().to_string(), value);
            DynamicMessage::deserialize(input, serde_json::Value::Object(wrapper)).map_err(invalid_json)
        }
    }
}

fn from_json(message: MessageDescriptor, body: &Bytes) -> Result<DynamicMessage, DispatchError> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    let decoded = DynamicMessage::deserialize(message, &mut deserializer).map_err(invalid_json)?;
    deserializer.end().map_err(invalid_json)?;
    Ok(decoded)
}

fn http_body(message: MessageDescriptor, body: &Bytes, content_type: Option<&str>) -> Result<DynamicMessage, DispatchError> {
    let mut raw = DynamicMessage::new(message);
    raw.try_set_field_by_name("data", Value::Bytes(body.clone()))
        .map_err(|e| DispatchError::Internal(e.to_string()))?;
    if let Some(content_type) = content_type {
        raw.try_set_field_by_name("content_type", Value::String(content_type.to_string()))
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
    }
    Ok(raw)
}

fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

fn invalid_json(err: serde_json::Error) -> DispatchError {
    DispatchError::InvalidArgument(format!("malformed request body: {}", err))
}
