//! Parameter schemas attached to every tool.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Primitive-or-structured type tag of a tool parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string.
    String,
    /// Whole number.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
}

impl ParamType {
    /// Returns the lowercase tag used on the wire and in JSON schemas.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Returns `true` if the JSON value inhabits this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared tool input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    name: String,
    #[serde(rename = "type")]
    ty: ParamType,
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl ParamSpec {
    /// Declares a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            description: None,
        }
    }

    /// Declares an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            description: None,
        }
    }

    /// Attaches a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type tag.
    #[must_use]
    pub const fn ty(&self) -> ParamType {
        self.ty
    }

    /// Returns whether the parameter must be supplied.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Reasons a set of call arguments does not satisfy a schema.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// The arguments were not a JSON object.
    #[error("arguments must be a JSON object, got {found}")]
    NotAnObject {
        /// JSON type that was supplied instead.
        found: &'static str,
    },
    /// A required parameter was absent or null.
    #[error("missing required parameter `{name}`")]
    Missing {
        /// Parameter name.
        name: String,
    },
    /// A parameter had the wrong JSON type.
    #[error("parameter `{name}` must be of type {expected}, got {found}")]
    TypeMismatch {
        /// Parameter name.
        name: String,
        /// Declared type.
        expected: ParamType,
        /// JSON type that was supplied.
        found: &'static str,
    },
}

/// Ordered list of parameters accepted by a tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSchema(Vec<ParamSpec>);

impl ParameterSchema {
    /// Creates a schema without parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.0
    }

    /// Returns the number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the tool takes no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the first parameter name that is declared more than once.
    #[must_use]
    pub fn duplicate_name(&self) -> Option<&str> {
        self.0.iter().enumerate().find_map(|(idx, spec)| {
            self.0[..idx]
                .iter()
                .any(|earlier| earlier.name == spec.name)
                .then_some(spec.name.as_str())
        })
    }

    /// Checks call arguments against the schema.
    ///
    /// Extra keys that the schema does not declare are ignored so that newer
    /// callers can talk to older servers. `null` for an optional parameter is
    /// treated as absent.
    ///
    /// # Errors
    ///
    /// Returns the first [`ArgumentError`] encountered, in declaration order.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<(), ArgumentError> {
        for spec in &self.0 {
            match arguments.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ArgumentError::Missing {
                        name: spec.name.clone(),
                    });
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.ty.accepts(value) => {
                    return Err(ArgumentError::TypeMismatch {
                        name: spec.name.clone(),
                        expected: spec.ty,
                        found: json_type(value),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Renders the schema as a JSON Schema object for MCP clients.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for spec in &self.0 {
            let mut property = Map::new();
            property.insert("type".into(), Value::from(spec.ty.as_str()));
            if let Some(description) = &spec.description {
                property.insert("description".into(), Value::from(description.as_str()));
            }
            properties.insert(spec.name.clone(), Value::Object(property));
            if spec.required {
                required.push(Value::from(spec.name.as_str()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl From<Vec<ParamSpec>> for ParameterSchema {
    fn from(value: Vec<ParamSpec>) -> Self {
        Self(value)
    }
}

impl FromIterator<ParamSpec> for ParameterSchema {
    fn from_iter<T: IntoIterator<Item = ParamSpec>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Returns the JSON type name of a value.
#[must_use]
pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
