//! Path template parsing and matching.
//!
//! # Responsibilities
//! - Parse `google.api.http` style templates (`/v1/{name=shelves/*}/books:get`)
//! - Match a concrete request path against a compiled template
//! - Capture variable values, percent-decoded
//!
//! # Design Decisions
//! - `**` is only allowed as the last segment, so matching is a single
//!   left-to-right scan with no backtracking
//! - Literal matching is case-sensitive
//! - No regex in the hot path

use std::fmt;

use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Error raised while parsing a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("empty segment in template: {0}")]
    EmptySegment(String),

    #[error("'**' must be the last segment: {0}")]
    DeepWildcardNotLast(String),

    #[error("unbalanced braces in template: {0}")]
    UnbalancedBraces(String),

    #[error("nested variables are not allowed: {0}")]
    NestedVariable(String),

    #[error("invalid field path '{field}' in template: {template}")]
    InvalidFieldPath { field: String, template: String },

    #[error("variable '{0}' bound more than once")]
    DuplicateVariable(String),
}

/// One segment of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Exact literal.
    Literal(String),
    /// `*`: exactly one segment.
    Wildcard,
    /// `**`: zero or more trailing segments.
    DeepWildcard,
}

/// A named variable spanning `start..end` of the segment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub field_path: String,
    start: usize,
    end: usize,
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
    variables: Vec<Variable>,
    verb: Option<String>,
}

impl PathTemplate {
    /// Parse a template string.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let body = raw
            .strip_prefix('/')
            .ok_or_else(|| TemplateError::MissingLeadingSlash(raw.to_string()))?;

        let (body, verb) = split_verb(body);

        let mut segments = Vec::new();
        let mut variables: Vec<Variable> = Vec::new();

        for token in tokenize(body, raw)? {
            match token {
                Token::Plain(text) => segments.push(parse_segment(&text, raw)?),
                Token::Variable { field_path, pattern } => {
                    if !is_field_path(&field_path) {
                        return Err(TemplateError::InvalidFieldPath {
                            field: field_path,
                            template: raw.to_string(),
                        });
                    }
                    if variables.iter().any(|v| v.field_path == field_path) {
                        return Err(TemplateError::DuplicateVariable(field_path));
                    }

                    let start = segments.len();
                    match pattern {
                        None => segments.push(Segment::Wildcard),
                        Some(pattern) => {
                            for part in pattern.split('/') {
                                segments.push(parse_segment(part, raw)?);
                            }
                        }
                    }
                    variables.push(Variable {
                        field_path,
                        start,
                        end: segments.len(),
                    });
                }
            }
        }

        if let Some(pos) = segments.iter().position(|s| *s == Segment::DeepWildcard) {
            if pos + 1 != segments.len() {
                return Err(TemplateError::DeepWildcardNotLast(raw.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            variables,
            verb: verb.map(str::to_string),
        })
    }

    /// Variables declared by the template, in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.field_path.as_str())
    }

    /// Match a request path, returning `(field_path, value)` captures.
    ///
    /// Returns `None` when the path does not match or a capture is not
    /// valid UTF-8 after percent-decoding.
    pub fn matches(&self, path: &str) -> Option<Vec<(String, String)>> {
        let path = path.strip_prefix('/')?;

        let path = match &self.verb {
            Some(verb) => {
                let (rest, found) = path.rsplit_once(':')?;
                if found != verb {
                    return None;
                }
                rest
            }
            None => path,
        };

        let parts: Vec<&str> = if path.is_empty() {
            Vec::new()
        } else {
            path.split('/').collect()
        };

        // Index into `parts` where each template segment begins.
        let mut offsets = Vec::with_capacity(self.segments.len() + 1);
        let mut cursor = 0;
        for segment in &self.segments {
            offsets.push(cursor);
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(cursor) != Some(&lit.as_str()) {
                        return None;
                    }
                    cursor += 1;
                }
                Segment::Wildcard => {
                    match parts.get(cursor) {
                        Some(part) if !part.is_empty() => cursor += 1,
                        _ => return None,
                    }
                }
                Segment::DeepWildcard => cursor = parts.len(),
            }
        }
        offsets.push(cursor);

        if cursor != parts.len() {
            return None;
        }

        let mut captures = Vec::with_capacity(self.variables.len());
        for var in &self.variables {
            let from = offsets[var.start];
            let to = offsets[var.end];
            let mut decoded = Vec::with_capacity(to - from);
            for part in &parts[from..to] {
                decoded.push(percent_decode_str(part).decode_utf8().ok()?.into_owned());
            }
            captures.push((var.field_path.clone(), decoded.join("/")));
        }

        Some(captures)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

enum Token {
    Plain(String),
    Variable {
        field_path: String,
        pattern: Option<String>,
    },
}

fn tokenize(body: &str, raw: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = body;

    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('{') {
            let close = inner
                .find('}')
                .ok_or_else(|| TemplateError::UnbalancedBraces(raw.to_string()))?;
            let content = &inner[..close];
            if content.contains('{') {
                return Err(TemplateError::NestedVariable(raw.to_string()));
            }
            let (field_path, pattern) = match content.split_once('=') {
                Some((field, pattern)) => (field.to_string(), Some(pattern.to_string())),
                None => (content.to_string(), None),
            };
            tokens.push(Token::Variable { field_path, pattern });

            rest = &inner[close + 1..];
            match rest.strip_prefix('/') {
                Some(after) if !after.is_empty() => rest = after,
                Some(_) => return Err(TemplateError::EmptySegment(raw.to_string())),
                None if rest.is_empty() => {}
                None => return Err(TemplateError::UnbalancedBraces(raw.to_string())),
            }
        } else {
            let end = rest.find('/').unwrap_or(rest.len());
            let text = &rest[..end];
            if text.contains('}') {
                return Err(TemplateError::UnbalancedBraces(raw.to_string()));
            }
            tokens.push(Token::Plain(text.to_string()));

            rest = &rest[end..];
            if let Some(after) = rest.strip_prefix('/') {
                if after.is_empty() {
                    return Err(TemplateError::EmptySegment(raw.to_string()));
                }
                rest = after;
            }
        }
    }

    Ok(tokens)
}

fn parse_segment(text: &str, raw: &str) -> Result<Segment, TemplateError> {
    match text {
        "" => Err(TemplateError::EmptySegment(raw.to_string())),
        "*" => Ok(Segment::Wildcard),
        "**" => Ok(Segment::DeepWildcard),
        lit if lit.contains('{') || lit.contains('}') => {
            Err(TemplateError::UnbalancedBraces(raw.to_string()))
        }
        lit => Ok(Segment::Literal(lit.to_string())),
    }
}

/// Split a trailing `:verb` off the last segment, ignoring colons inside
/// a variable.
fn split_verb(body: &str) -> (&str, Option<&str>) {
    let last_start = body.rfind('/').map(|i| i + 1).unwrap_or(0);
    let last = &body[last_start..];
    if last.contains('}') {
        // `{name}:verb` or `{name=**}:verb`
        if let Some(close) = body.rfind('}') {
            if let Some(verb) = body[close + 1..].strip_prefix(':') {
                return (&body[..=close], Some(verb));
            }
        }
        return (body, None);
    }
    match last.rsplit_once(':') {
        Some((_, verb)) => (&body[..body.len() - verb.len() - 1], Some(verb)),
        None => (body, None),
    }
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|ident| {
            let mut chars = ident.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
