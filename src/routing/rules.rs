//! Translation rules and the compiled ruleset.
//!
//! # Responsibilities
//! - Deserialize the ruleset file emitted by the schema compiler
//! - Resolve selectors and field paths against the descriptor pool
//! - Freeze the result as an immutable, ordered [`Ruleset`]
//!
//! # Design Decisions
//! - Every field path is resolved at load time; a bad rule fails startup
//!   instead of failing requests
//! - Declaration order is kept; lookup is first match wins

use std::fs;
use std::path::{Path, PathBuf};

use axum::http::Method;
use prost_reflect::{DescriptorError, DescriptorPool, FieldDescriptor, MessageDescriptor, MethodDescriptor};
use serde::Deserialize;
use thiserror::Error;

use crate::routing::params::{canonical_path, is_scalar, resolve_field_path};
use crate::routing::template::{PathTemplate, TemplateError};

/// Error loading or compiling a ruleset.
#[derive(Debug, Error)]
pub enum RulesetError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("ruleset does not name a descriptor_set")]
    MissingDescriptorSet,

    #[error("invalid descriptor set: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("rule #{index} ({selector}): {source}")]
    Template {
        index: usize,
        selector: String,
        source: TemplateError,
    },

    #[error("rule #{index} ({selector}): {reason}")]
    Rule {
        index: usize,
        selector: String,
        reason: String,
    },
}

/// On-disk ruleset file.
#[derive(Debug, Clone, Deserialize)]
pub struct RulesetFile {
    /// Path to the `FileDescriptorSet`, relative to the ruleset file.
    pub descriptor_set: Option<PathBuf>,

    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// One rule as written by the schema compiler.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    /// Fully qualified `<package>.<Service>.<Method>`.
    pub selector: String,

    /// HTTP method.
    pub method: String,

    /// Path template.
    pub pattern: String,

    /// `""` (no body), `"*"` (whole input) or a top-level input field.
    #[serde(default)]
    pub body: String,

    /// `""` (whole output) or a top-level output field.
    #[serde(default)]
    pub response_body: String,

    /// Optional allow-list of query parameter field paths.
    #[serde(default)]
    pub query: Option<Vec<String>>,
}

/// Where the HTTP body goes in the RPC input.
#[derive(Debug, Clone)]
pub enum BodyBinding {
    None,
    Whole,
    Field(FieldDescriptor),
}

/// A compiled path variable: the template name and the resolved field chain.
#[derive(Debug, Clone)]
pub struct PathBinding {
    pub field_path: String,
    pub fields: Vec<FieldDescriptor>,
}

/// A compiled translation rule.
#[derive(Debug, Clone)]
pub struct TranslationRule {
    pub selector: String,
    pub method: Method,
    pub template: PathTemplate,
    pub rpc: MethodDescriptor,
    /// gRPC request path, `/<package>.<Service>/<Method>`.
    pub rpc_path: String,
    pub path_bindings: Vec<PathBinding>,
    pub body: BodyBinding,
    pub response_body: Option<FieldDescriptor>,
    /// Query allow-list, in proto field names.
    pub query: Option<Vec<String>>,
}

impl TranslationRule {
    pub fn is_server_streaming(&self) -> bool {
        self.rpc.is_server_streaming()
    }

    pub fn input(&self) -> MessageDescriptor {
        self.rpc.input()
    }

    pub fn output(&self) -> MessageDescriptor {
        self.rpc.output()
    }

    /// Find the compiled binding for a template variable.
    pub fn path_binding(&self, field_path: &str) -> Option<&PathBinding> {
        self.path_bindings.iter().find(|b| b.field_path == field_path)
    }

    /// True if the query parameter is covered by the path or body binding.
    /// `field_path` is in proto field names.
    pub(crate) fn shadows_query_param(&self, field_path: &str) -> bool {
        let root = field_path.split('.').next().unwrap_or(field_path);
        let in_body = match &self.body {
            BodyBinding::None => false,
            BodyBinding::Whole => true,
            BodyBinding::Field(field) => field.name() == root,
        };
        in_body
            || self.path_bindings.iter().any(|b| {
                let bound = canonical_path(&b.fields);
                field_path == bound || field_path.starts_with(&format!("{}.", bound))
            })
    }
}

/// Immutable ordered ruleset.
#[derive(Debug, Clone)]
pub struct Ruleset {
    rules: Vec<TranslationRule>,
}

impl Ruleset {
    /// Load a ruleset file and the descriptor set it points to.
    pub fn load(path: &Path) -> Result<Self, RulesetError> {
        let content = read(path)?;
        let file: RulesetFile = toml::from_str(&content)?;

        let descriptor_path = file
            .descriptor_set
            .as_ref()
            .ok_or(RulesetError::MissingDescriptorSet)?;
        let descriptor_path = match path.parent() {
            Some(dir) if descriptor_path.is_relative() => dir.join(descriptor_path),
            _ => descriptor_path.clone(),
        };

        let bytes = fs::read(&descriptor_path).map_err(|source| RulesetError::Io {
            path: descriptor_path.clone(),
            source,
        })?;
        let pool = DescriptorPool::decode(bytes.as_slice())?;

        let ruleset = Self::compile(pool, file.rules)?;
        tracing::info!(
            path = %path.display(),
            descriptor_set = %descriptor_path.display(),
            rules = ruleset.len(),
            "Translation ruleset loaded"
        );
        Ok(ruleset)
    }

    /// Parse rules from TOML text against an already loaded pool.
    pub fn from_toml_str(content: &str, pool: DescriptorPool) -> Result<Self, RulesetError> {
        let file: RulesetFile = toml::from_str(content)?;
        Self::compile(pool, file.rules)
    }

    /// Compile rule specs, preserving their order.
    pub fn compile(pool: DescriptorPool, specs: Vec<RuleSpec>) -> Result<Self, RulesetError> {
        let rules = specs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| compile_rule(&pool, index, spec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// First rule whose method and path template match, with its captures.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&TranslationRule, Vec<(String, String)>)> {
        self.rules
            .iter()
            .filter(|rule| rule.method == *method)
            .find_map(|rule| rule.template.matches(path).map(|captures| (rule, captures)))
    }

    pub fn rules(&self) -> &[TranslationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn read(path: &Path) -> Result<String, RulesetError> {
    fs::read_to_string(path).map_err(|source| RulesetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn compile_rule(pool: &DescriptorPool, index: usize, spec: RuleSpec) -> Result<TranslationRule, RulesetError> {
    let fail = |reason: String| RulesetError::Rule {
        index,
        selector: spec.selector.clone(),
        reason,
    };

    let (service_name, method_name) = spec
        .selector
        .rsplit_once('.')
        .ok_or_else(|| fail("selector must be <service>.<method>".into()))?;
    let service = pool
        .get_service_by_name(service_name)
        .ok_or_else(|| fail(format!("unknown service '{}'", service_name)))?;
    let rpc = service
        .methods()
        .find(|m| m.name() == method_name)
        .ok_or_else(|| fail(format!("service has no method '{}'", method_name)))?;

    if rpc.is_client_streaming() {
        return Err(fail("client-streaming methods cannot be translated".into()));
    }

    let method = Method::from_bytes(spec.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| fail(format!("invalid HTTP method '{}'", spec.method)))?;

    let template = PathTemplate::parse(&spec.pattern).map_err(|source| RulesetError::Template {
        index,
        selector: spec.selector.clone(),
        source,
    })?;

    let input = rpc.input();
    let mut path_bindings = Vec::new();
    for field_path in template.variables() {
        let fields = resolve_field_path(&input, field_path).map_err(fail)?;
        if let Some(last) = fields.last() {
            if last.is_list() || last.is_map() || !is_scalar(&last.kind()) {
                return Err(fail(format!(
                    "path variable '{}' must bind a singular scalar field",
                    field_path
                )));
            }
        }
        path_bindings.push(PathBinding {
            field_path: field_path.to_string(),
            fields,
        });
    }

    let body = match spec.body.as_str() {
        "" => BodyBinding::None,
        "*" => BodyBinding::Whole,
        name => BodyBinding::Field(
            input
                .get_field_by_name(name)
                .ok_or_else(|| fail(format!("body field '{}' not found", name)))?,
        ),
    };

    let response_body = match spec.response_body.as_str() {
        "" => None,
        name => Some(
            rpc.output()
                .get_field_by_name(name)
                .ok_or_else(|| fail(format!("response_body field '{}' not found", name)))?,
        ),
    };

    let query = match &spec.query {
        Some(allowed) => Some(
            allowed
                .iter()
                .map(|field_path| resolve_field_path(&input, field_path).map(|fields| canonical_path(&fields)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(fail)?,
        ),
        None => None,
    };

    let rpc_path = format!("/{}/{}", service.full_name(), rpc.name());

    Ok(TranslationRule {
        selector: spec.selector,
        method,
        template,
        rpc,
        rpc_path,
        path_bindings,
        body,
        response_body,
        query,
    })
}
