//! Loosely-typed raw values
//!
//! Extract collections are schema-less: the same field may hold an integer
//! in one document, a string such as `"?"` in the next, and be missing in a
//! third. [`Loose`] captures that as a tagged union, and its conversions are
//! total: they report failure instead of panicking, leaving the
//! drop/sentinel/default decision to the field policy.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::hash::{Hash, Hasher};

/// A raw field value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Loose {
    /// Missing or explicit null
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    /// Arrays and objects; never convertible
    Nested(Value),
}

/// Result of converting a raw value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion<T> {
    Value(T),
    /// Input was missing or null
    Null,
    /// Input was present but not convertible
    Failed,
}

impl<T> Conversion<T> {
    /// The converted value, if any
    pub fn into_option(self) -> Option<T> {
        match self {
            Conversion::Value(value) => Some(value),
            Conversion::Null | Conversion::Failed => None,
        }
    }
}

impl From<Value> for Loose {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Loose::Null,
            Value::Bool(b) => Loose::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Loose::Int(i),
                None => n.as_f64().map(Loose::Double).unwrap_or(Loose::Null),
            },
            Value::String(s) => Loose::Text(s),
            nested => Loose::Nested(nested),
        }
    }
}

impl<'de> Deserialize<'de> for Loose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Loose::from)
    }
}

impl Loose {
    pub fn is_null(&self) -> bool {
        matches!(self, Loose::Null)
    }

    /// Convert to a 32-bit integer
    ///
    /// Doubles truncate toward zero, booleans map to 1/0, strings must be a
    /// plain base-10 integer literal. Out-of-range values fail.
    pub fn to_int(&self) -> Conversion<i32> {
        match self {
            Loose::Null => Conversion::Null,
            Loose::Bool(b) => Conversion::Value(i32::from(*b)),
            Loose::Int(i) => i32::try_from(*i)
                .map(Conversion::Value)
                .unwrap_or(Conversion::Failed),
            Loose::Double(f) => {
                let truncated = f.trunc();
                if f.is_finite()
                    && truncated >= f64::from(i32::MIN)
                    && truncated <= f64::from(i32::MAX)
                {
                    Conversion::Value(truncated as i32)
                } else {
                    Conversion::Failed
                }
            }
            Loose::Text(s) => s
                .parse::<i32>()
                .map(Conversion::Value)
                .unwrap_or(Conversion::Failed),
            Loose::Nested(_) => Conversion::Failed,
        }
    }

    /// Convert to a finite double
    pub fn to_double(&self) -> Conversion<f64> {
        let value = match self {
            Loose::Null => return Conversion::Null,
            Loose::Bool(b) => f64::from(u8::from(*b)),
            Loose::Int(i) => *i as f64,
            Loose::Double(f) => *f,
            Loose::Text(s) => match s.parse::<f64>() {
                Ok(f) => f,
                Err(_) => return Conversion::Failed,
            },
            Loose::Nested(_) => return Conversion::Failed,
        };

        if value.is_finite() {
            Conversion::Value(value)
        } else {
            Conversion::Failed
        }
    }

    /// Truthiness: numbers are true when non-zero, any string is true,
    /// missing is false
    pub fn to_bool(&self) -> bool {
        match self {
            Loose::Null => false,
            Loose::Bool(b) => *b,
            Loose::Int(i) => *i != 0,
            Loose::Double(f) => *f != 0.0,
            Loose::Text(_) => true,
            Loose::Nested(_) => true,
        }
    }

    /// Text form of a scalar; `None` for missing and nested values
    pub fn to_text(&self) -> Option<String> {
        match self {
            Loose::Null | Loose::Nested(_) => None,
            Loose::Bool(b) => Some(b.to_string()),
            Loose::Int(i) => Some(i.to_string()),
            Loose::Double(f) => Some(f.to_string()),
            Loose::Text(s) => Some(s.clone()),
        }
    }

    /// Key used for equality joins
    pub fn join_key(&self) -> JoinKey {
        match self {
            Loose::Null => JoinKey::Null,
            Loose::Bool(b) => JoinKey::Bool(*b),
            Loose::Int(i) => JoinKey::number(*i as f64),
            Loose::Double(f) => JoinKey::number(*f),
            Loose::Text(s) => JoinKey::Text(s.clone()),
            Loose::Nested(v) => JoinKey::Nested(v.to_string()),
        }
    }
}

/// Hashable equality key for joins
///
/// Numbers compare by numeric value across integer and double
/// representations; a number never equals a string; null equals null.
#[derive(Debug, Clone)]
pub enum JoinKey {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Nested(String),
}

impl JoinKey {
    fn number(f: f64) -> Self {
        // -0.0 and 0.0 must hash alike
        JoinKey::Number(if f == 0.0 { 0.0 } else { f })
    }
}

impl PartialEq for JoinKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JoinKey::Null, JoinKey::Null) => true,
            (JoinKey::Bool(a), JoinKey::Bool(b)) => a == b,
            (JoinKey::Number(a), JoinKey::Number(b)) => a.to_bits() == b.to_bits(),
            (JoinKey::Text(a), JoinKey::Text(b)) => a == b,
            (JoinKey::Nested(a), JoinKey::Nested(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for JoinKey {}

impl Hash for JoinKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            JoinKey::Null => {}
            JoinKey::Bool(b) => b.hash(state),
            JoinKey::Number(f) => f.to_bits().hash(state),
            JoinKey::Text(s) | JoinKey::Nested(s) => s.hash(state),
        }
    }
}
