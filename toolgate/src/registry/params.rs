//! Typed parameter schemas, validated before any tool runs

use crate::error::{Error, Result};
use serde_json::{json, Map, Value};

/// Parameter type plus its constraints
#[derive(Debug, Clone)]
pub enum ParamKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Integer {
        min: i64,
        max: i64,
    },
    Number {
        min: f64,
        max: f64,
    },
    Boolean,
    Enum {
        values: Vec<String>,
    },
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParamField {
    pub name: String,
    pub description: String,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamField {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::String {
                min_len: None,
                max_len: None,
            },
            required: false,
            default: None,
        }
    }

    pub fn integer(name: &str, description: &str, min: i64, max: i64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Integer { min, max },
            required: false,
            default: None,
        }
    }

    pub fn number(name: &str, description: &str, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Number { min, max },
            required: false,
            default: None,
        }
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Boolean,
            required: false,
            default: None,
        }
    }

    pub fn enumeration(name: &str, description: &str, values: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: ParamKind::Enum {
                values: values.iter().map(|v| v.to_string()).collect(),
            },
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Set string length bounds; no effect on other kinds
    pub fn length(mut self, min: usize, max: usize) -> Self {
        if let ParamKind::String { min_len, max_len } = &mut self.kind {
            *min_len = Some(min);
            *max_len = Some(max);
        }
        self
    }

    fn check(&self, value: &Value) -> Result<()> {
        match &self.kind {
            ParamKind::String { min_len, max_len } => {
                let s = value.as_str().ok_or_else(|| {
                    Error::InvalidArgument(format!("Parameter '{}' must be a string", self.name))
                })?;
                let len = s.chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        return Err(Error::InvalidArgument(format!(
                            "Parameter '{}' must be at least {} characters",
                            self.name, min
                        )));
                    }
                }
                if let Some(max) = max_len {
                    if len > *max {
                        return Err(Error::InvalidArgument(format!(
                            "Parameter '{}' must be at most {} characters",
                            self.name, max
                        )));
                    }
                }
            }
            ParamKind::Integer { min, max } => {
                let n = value.as_i64().ok_or_else(|| {
                    Error::InvalidArgument(format!("Parameter '{}' must be an integer", self.name))
                })?;
                if n < *min || n > *max {
                    return Err(Error::InvalidArgument(format!(
                        "Parameter '{}' must be between {} and {}",
                        self.name, min, max
                    )));
                }
            }
            ParamKind::Number { min, max } => {
                let n = value.as_f64().ok_or_else(|| {
                    Error::InvalidArgument(format!("Parameter '{}' must be a number", self.name))
                })?;
                if n < *min || n > *max {
                    return Err(Error::InvalidArgument(format!(
                        "Parameter '{}' must be between {} and {}",
                        self.name, min, max
                    )));
                }
            }
            ParamKind::Boolean => {
                if !value.is_boolean() {
                    return Err(Error::InvalidArgument(format!(
                        "Parameter '{}' must be a boolean",
                        self.name
                    )));
                }
            }
            ParamKind::Enum { values } => {
                let s = value.as_str().ok_or_else(|| {
                    Error::InvalidArgument(format!("Parameter '{}' must be a string", self.name))
                })?;
                if !values.iter().any(|v| v == s) {
                    return Err(Error::InvalidArgument(format!(
                        "Parameter '{}' must be one of: {}",
                        self.name,
                        values.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    fn json_schema(&self) -> Value {
        let mut schema = match &self.kind {
            ParamKind::String { min_len, max_len } => {
                let mut s = json!({"type": "string"});
                if let Some(min) = min_len {
                    s["minLength"] = json!(min);
                }
                if let Some(max) = max_len {
                    s["maxLength"] = json!(max);
                }
                s
            }
            ParamKind::Integer { min, max } => {
                json!({"type": "integer", "minimum": min, "maximum": max})
            }
            ParamKind::Number { min, max } => {
                json!({"type": "number", "minimum": min, "maximum": max})
            }
            ParamKind::Boolean => json!({"type": "boolean"}),
            ParamKind::Enum { values } => json!({"type": "string", "enum": values}),
        };

        schema["description"] = json!(self.description);
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

/// Declared parameters for one tool
#[derive(Debug, Clone)]
pub struct ParamSchema {
    fields: Vec<ParamField>,
}

impl ParamSchema {
    pub fn new(fields: Vec<ParamField>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[ParamField] {
        &self.fields
    }

    /// Validate call arguments against the declared fields.
    ///
    /// Arguments must be an object (or absent). Missing required fields and
    /// any type or constraint violation are rejected; undeclared extra
    /// fields are ignored.
    pub fn validate(&self, args: &Value) -> Result<()> {
        let map: &Map<String, Value> = match args {
            Value::Object(map) => map,
            Value::Null => {
                for field in &self.fields {
                    if field.required {
                        return Err(Error::InvalidArgument(format!(
                            "Missing required parameter '{}'",
                            field.name
                        )));
                    }
                }
                return Ok(());
            }
            _ => {
                return Err(Error::InvalidArgument(
                    "Tool arguments must be an object".to_string(),
                ))
            }
        };

        for field in &self.fields {
            match map.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(Error::InvalidArgument(format!(
                            "Missing required parameter '{}'",
                            field.name
                        )));
                    }
                }
                Some(value) => field.check(value)?,
            }
        }

        Ok(())
    }

    /// Render as a JSON Schema object for the tool catalog
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();

        for field in &self.fields {
            properties.insert(field.name.clone(), field.json_schema());
            if field.required {
                required.push(field.name.clone());
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
