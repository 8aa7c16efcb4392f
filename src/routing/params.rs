//! Path and query parameter extraction.
//!
//! # Responsibilities
//! - Resolve dotted field paths (`filter.owner`) against a message schema
//! - Convert raw strings to typed field values (string, integers, floats,
//!   bool, enum by name or number, base64 bytes)
//! - Assign values into a dynamic message, appending for repeated fields
//!
//! # Design Decisions
//! - Pure computation; nothing here suspends
//! - A conversion failure is reported before any upstream call
//! - Query parameters naming unknown fields are skipped, not rejected

use base64::Engine;
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, Value};
use thiserror::Error;
use url::form_urlencoded;

use crate::routing::rules::TranslationRule;

/// A parameter that does not fit its field.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("invalid value '{value}' for field '{field}': expected {expected}")]
    Type {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("field '{0}' cannot be set from a URL parameter")]
    NotScalar(String),

    #[error("field '{0}' is not repeated but was given more than once")]
    Repeated(String),
}

/// A typed value ready to be written at a field path.
#[derive(Debug, Clone)]
pub struct Binding {
    pub field_path: String,
    pub fields: Vec<FieldDescriptor>,
    pub value: Value,
}

impl Binding {
    /// Write the value into `message`.
    pub fn apply(self, message: &mut DynamicMessage) -> Result<(), ParamError> {
        let Some((last, parents)) = self.fields.split_last() else {
            return Ok(());
        };

        let mut target = message;
        for parent in parents {
            target = match target.get_field_mut(parent) {
                Value::Message(inner) => inner,
                _ => return Err(ParamError::NotScalar(self.field_path)),
            };
        }

        if last.is_list() {
            match target.get_field_mut(last) {
                Value::List(items) => items.push(self.value),
                _ => return Err(ParamError::NotScalar(self.field_path)),
            }
            Ok(())
        } else {
            target
                .try_set_field(last, self.value)
                .map_err(|_| ParamError::NotScalar(self.field_path))
        }
    }
}

/// Resolve `a.b.c` to the chain of field descriptors.
pub fn resolve_field_path(message: &MessageDescriptor, path: &str) -> Result<Vec<FieldDescriptor>, String> {
    let mut fields = Vec::new();
    let mut current = message.clone();
    let mut names = path.split('.').peekable();

    while let Some(name) = names.next() {
        let field = current
            .get_field_by_name(name)
            .or_else(|| current.get_field_by_json_name(name))
            .ok_or_else(|| format!("field '{}' not found in {}", path, message.full_name()))?;

        if names.peek().is_some() {
            current = match field.kind() {
                Kind::Message(inner) if !field.is_list() && !field.is_map() => inner,
                _ => return Err(format!("'{}' does not name a nested message field", path)),
            };
        }
        fields.push(field);
    }

    Ok(fields)
}

/// Dotted proto field names of a resolved chain.
pub fn canonical_path(fields: &[FieldDescriptor]) -> String {
    fields.iter().map(|f| f.name()).collect::<Vec<_>>().join(".")
}

/// Whether a field kind can be written from a single URL string.
pub fn is_scalar(kind: &Kind) -> bool {
    !matches!(kind, Kind::Message(_))
}

/// Convert a raw URL string into a value for `field`.
pub fn parse_value(field: &FieldDescriptor, raw: &str) -> Result<Value, ParamError> {
    let kind = field.kind();
    let mismatch = |expected: &'static str| ParamError::Type {
        field: field.name().to_string(),
        value: raw.to_string(),
        expected,
    };

    let value = match kind {
        Kind::String => Value::String(raw.to_string()),
        Kind::Bool => Value::Bool(parse_bool(raw).ok_or_else(|| mismatch("boolean"))?),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => {
            Value::I32(raw.parse().map_err(|_| mismatch("32-bit integer"))?)
        }
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => {
            Value::I64(raw.parse().map_err(|_| mismatch("64-bit integer"))?)
        }
        Kind::Uint32 | Kind::Fixed32 => {
            Value::U32(raw.parse().map_err(|_| mismatch("unsigned 32-bit integer"))?)
        }
        Kind::Uint64 | Kind::Fixed64 => {
            Value::U64(raw.parse().map_err(|_| mismatch("unsigned 64-bit integer"))?)
        }
        Kind::Float => Value::F32(raw.parse().map_err(|_| mismatch("float"))?),
        Kind::Double => Value::F64(raw.parse().map_err(|_| mismatch("double"))?),
        Kind::Bytes => Value::Bytes(decode_base64(raw).ok_or_else(|| mismatch("base64 bytes"))?.into()),
        Kind::Enum(enum_desc) => {
            let number = match enum_desc.get_value_by_name(raw) {
                Some(value) => value.number(),
                None => raw
                    .parse::<i32>()
                    .ok()
                    .filter(|n| enum_desc.get_value(*n).is_some())
                    .ok_or_else(|| mismatch("enum value"))?,
            };
            Value::EnumNumber(number)
        }
        Kind::Message(_) => return Err(ParamError::NotScalar(field.name().to_string())),
    };

    Ok(value)
}

/// Typed bindings for the path captures of a matched rule.
pub fn path_bindings(rule: &TranslationRule, captures: Vec<(String, String)>) -> Result<Vec<Binding>, ParamError> {
    captures
        .into_iter()
        .filter_map(|(field_path, raw)| {
            let binding = rule.path_binding(&field_path)?;
            Some((binding, raw))
        })
        .map(|(binding, raw)| {
            let last = binding
                .fields
                .last()
                .ok_or_else(|| ParamError::NotScalar(binding.field_path.clone()))?;
            Ok(Binding {
                field_path: binding.field_path.clone(),
                fields: binding.fields.clone(),
                value: parse_value(last, &raw)?,
            })
        })
        .collect()
}

/// Typed bindings for the query string of a matched rule.
pub fn query_bindings(rule: &TranslationRule, query: Option<&str>) -> Result<Vec<Binding>, ParamError> {
    let Some(query) = query else {
        return Ok(Vec::new());
    };

    let input = rule.input();
    let mut bindings: Vec<Binding> = Vec::new();

    for (key, raw) in form_urlencoded::parse(query.as_bytes()) {
        let fields = match resolve_field_path(&input, &key) {
            Ok(fields) => fields,
            Err(reason) => {
                tracing::debug!(param = %key, %reason, "Unknown query parameter ignored");
                continue;
            }
        };
        let Some(last) = fields.last() else { continue };

        // `pageSize` and `page_size` name the same field.
        let field_path = canonical_path(&fields);

        if let Some(allowed) = &rule.query {
            if !allowed.contains(&field_path) {
                tracing::debug!(param = %key, rule = %rule.selector, "Query parameter not declared, ignored");
                continue;
            }
        }
        if rule.shadows_query_param(&field_path) {
            tracing::debug!(param = %key, rule = %rule.selector, "Query parameter shadowed by path or body");
            continue;
        }

        if last.is_map() || !is_scalar(&last.kind()) {
            return Err(ParamError::NotScalar(field_path));
        }
        if !last.is_list() && bindings.iter().any(|b| b.field_path == field_path) {
            return Err(ParamError::Repeated(field_path));
        }

        let value = parse_value(last, &raw)?;
        bindings.push(Binding {
            field_path,
            fields,
            value,
        });
    }

    Ok(bindings)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn decode_base64(raw: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};

    STANDARD
        .decode(raw)
        .or_else(|_| URL_SAFE.decode(raw))
        .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
        .ok()
}
