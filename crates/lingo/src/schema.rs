//! Derivation and validation of tool parameter schemas.
//!
//! Tools describe their accepted arguments as a list of [`ParamSpec`]s; the
//! same derived schema is advertised to the remote model and used to validate
//! the argument map the model sends back before the tool runs.

use serde_json::{json, Map, Value};

use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Integer => "integer",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }

    fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(ParamKind::String),
            "integer" => Some(ParamKind::Integer),
            "number" => Some(ParamKind::Number),
            "boolean" => Some(ParamKind::Boolean),
            _ => None,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamKind::String => value.is_string(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Number => value.is_number(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

/// One parameter of a tool. A parameter with a default is optional; one
/// without is required.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub allowed: Option<Vec<String>>,
}

impl ParamSpec {
    pub fn required<N, D>(name: N, description: D, kind: ParamKind) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            default: None,
            allowed: None,
        }
    }

    pub fn optional<N, D>(name: N, description: D, kind: ParamKind, default: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Self {
            default: Some(default),
            ..Self::required(name, description, kind)
        }
    }

    /// Restrict a string parameter to an enumerated set of values
    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(allowed.iter().map(|s| s.to_string()).collect());
        self
    }
}

/// Derive the JSON schema advertised for a parameter list. Declaration order
/// is preserved so the same list always yields the same schema. An empty list
/// yields an object schema with no properties.
pub fn parameters_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        let mut field = Map::new();
        field.insert("type".to_string(), json!(param.kind.type_name()));
        if !param.description.is_empty() {
            field.insert("description".to_string(), json!(param.description));
        }
        if let Some(allowed) = &param.allowed {
            field.insert("enum".to_string(), json!(allowed));
        }
        if let Some(default) = &param.default {
            field.insert("default".to_string(), default.clone());
        }
        properties.insert(param.name.clone(), Value::Object(field));

        if param.default.is_none() {
            required.push(param.name.clone());
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Validate a decoded argument map against a derived schema.
///
/// Checks that arguments form an object, that every required field is
/// present, that present fields have the declared primitive type, that
/// enumerated fields take an allowed value, and that no undeclared field
/// sneaks through. Failures are `ToolArgumentError`.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> AgentResult<()> {
    let args = arguments.as_object().ok_or_else(|| {
        AgentError::ToolArgumentError(format!("expected an argument object, got: {}", arguments))
    })?;

    let properties = schema
        .get("properties")
        .and_then(|v| v.as_object())
        .ok_or_else(|| AgentError::Internal("schema has no properties object".to_string()))?;

    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for name in required.iter().filter_map(|v| v.as_str()) {
            if !args.contains_key(name) {
                return Err(AgentError::ToolArgumentError(format!(
                    "missing required argument '{}'",
                    name
                )));
            }
        }
    }

    for (name, value) in args {
        let field = properties.get(name).ok_or_else(|| {
            AgentError::ToolArgumentError(format!("unknown argument '{}'", name))
        })?;

        if let Some(expected) = field.get("type").and_then(|v| v.as_str()) {
            if let Some(kind) = ParamKind::from_type_name(expected) {
                if !kind.matches(value) {
                    return Err(AgentError::ToolArgumentError(format!(
                        "argument '{}' should be a {}, got: {}",
                        name, expected, value
                    )));
                }
            }
        }

        if let Some(allowed) = field.get("enum").and_then(|v| v.as_array()) {
            if !allowed.contains(value) {
                return Err(AgentError::ToolArgumentError(format!(
                    "argument '{}' must be one of {}, got: {}",
                    name,
                    json!(allowed),
                    value
                )));
            }
        }
    }

    Ok(())
}
