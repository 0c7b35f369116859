//! Document validators
//!
//! Declarative `$jsonSchema`-style validators attached to collections.
//! Validators are built in code and stored as JSON in the collection catalog.
//!
//! # Usage
//!
//! ```rust,ignore
//! let validator = Validator::new(
//!     SchemaRule::object()
//!         .title("Grade Document Validation")
//!         .required(["id_student", "score"])
//!         .property("score", SchemaRule::of(BsonType::Int).minimum(0.0).maximum(100.0)),
//! );
//! let violations = validator.validate(&document);
//! ```

use crate::db::store::Document;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Value types a rule can require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BsonType {
    Object,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    Double,
    String,
    Bool,
    Array,
}

impl BsonType {
    /// Check whether a JSON value has this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            BsonType::Object => value.is_object(),
            BsonType::Int => value
                .as_i64()
                .map(|i| i32::try_from(i).is_ok())
                .unwrap_or(false),
            BsonType::Long => value.as_i64().is_some(),
            BsonType::Double => value.is_f64(),
            BsonType::String => value.is_string(),
            BsonType::Bool => value.is_boolean(),
            BsonType::Array => value.is_array(),
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BsonType::Object => "object",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Double => "double",
            BsonType::String => "string",
            BsonType::Bool => "bool",
            BsonType::Array => "array",
        };
        f.write_str(name)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One node of a `$jsonSchema` declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRule {
    #[serde(rename = "bsonType")]
    pub bson_type: BsonType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Enumerated value domain
    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// Fields that must be present (objects only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Per-field rules (objects only); unlisted fields are allowed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaRule>,
}

impl SchemaRule {
    /// Rule requiring a value of the given type
    pub fn of(bson_type: BsonType) -> Self {
        Self {
            bson_type,
            title: None,
            description: None,
            allowed: Vec::new(),
            minimum: None,
            maximum: None,
            required: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Rule requiring an object
    pub fn object() -> Self {
        Self::of(BsonType::Object)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict the value to a fixed set of strings
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = values.into_iter().map(|v| Value::String(v.into())).collect();
        self
    }

    pub fn minimum(mut self, minimum: f64) -> Self {
        self.minimum = Some(minimum);
        self
    }

    pub fn maximum(mut self, maximum: f64) -> Self {
        self.maximum = Some(maximum);
        self
    }

    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn property(mut self, name: impl Into<String>, rule: SchemaRule) -> Self {
        self.properties.insert(name.into(), rule);
        self
    }

    fn check(&self, path: &str, value: &Value, out: &mut Vec<String>) {
        if !self.bson_type.matches(value) {
            out.push(format!(
                "{}: expected {}, found {}",
                path,
                self.bson_type,
                describe(value)
            ));
            return;
        }

        if !self.allowed.is_empty() && !self.allowed.contains(value) {
            out.push(format!("{}: value {} is not one of the allowed values", path, value));
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.minimum {
                if n < min {
                    out.push(format!("{}: {} is below minimum {}", path, n, min));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    out.push(format!("{}: {} is above maximum {}", path, n, max));
                }
            }
        }

        if let Value::Object(map) = value {
            self.check_object(path, map, out);
        }
    }

    fn check_object(&self, path: &str, map: &Document, out: &mut Vec<String>) {
        let child = |name: &str| {
            if path.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", path, name)
            }
        };

        for field in &self.required {
            if !map.contains_key(field) {
                out.push(format!("{}: required field missing", child(field)));
            }
        }

        for (name, rule) in &self.properties {
            if let Some(value) = map.get(name) {
                rule.check(&child(name), value, out);
            }
        }
    }
}

/// Collection validator (`{"$jsonSchema": {...}}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    #[serde(rename = "$jsonSchema")]
    pub json_schema: SchemaRule,
}

impl Validator {
    pub fn new(json_schema: SchemaRule) -> Self {
        Self { json_schema }
    }

    /// Validate a document; returns one message per violation (empty when valid)
    pub fn validate(&self, doc: &Document) -> Vec<String> {
        let mut violations = Vec::new();
        if self.json_schema.bson_type != BsonType::Object {
            violations.push(format!(
                "validator root must be an object rule, found {}",
                self.json_schema.bson_type
            ));
            return violations;
        }
        self.json_schema.check_object("", doc, &mut violations);
        violations
    }
}

/// Which writes are validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationLevel {
    Off,
    #[default]
    Strict,
}

/// What happens to a document that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    /// Reject the write
    #[default]
    Error,
    /// Accept the write and log a warning
    Warn,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Off => "off",
            ValidationLevel::Strict => "strict",
        }
    }
}

impl FromStr for ValidationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "off" => Ok(ValidationLevel::Off),
            "strict" => Ok(ValidationLevel::Strict),
            other => Err(Error::InvalidInput(format!("unknown validation level '{}'", other))),
        }
    }
}

impl ValidationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationAction::Error => "error",
            ValidationAction::Warn => "warn",
        }
    }
}

impl FromStr for ValidationAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(ValidationAction::Error),
            "warn" => Ok(ValidationAction::Warn),
            other => Err(Error::InvalidInput(format!("unknown validation action '{}'", other))),
        }
    }
}

/// Validator settings attached to a collection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionOptions {
    pub validator: Option<Validator>,
    pub validation_level: ValidationLevel,
    pub validation_action: ValidationAction,
}

impl CollectionOptions {
    /// Strict, rejecting validator
    pub fn with_validator(validator: Validator) -> Self {
        Self {
            validator: Some(validator),
            validation_level: ValidationLevel::Strict,
            validation_action: ValidationAction::Error,
        }
    }

    /// Violations for a write, or empty when validation does not apply
    pub fn violations(&self, doc: &Document) -> Vec<String> {
        match (&self.validator, self.validation_level) {
            (Some(validator), ValidationLevel::Strict) => validator.validate(doc),
            _ => Vec::new(),
        }
    }
}
