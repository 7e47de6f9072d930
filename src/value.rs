// Copyright 2025 Cowboy AI, LLC.

//! Dynamic values stored in instance fields and carried by events
//!
//! `Value` is the currency of the runtime: property defaults, constructor
//! arguments, event payloads and slot contents are all values. Identity
//! comparison (`Value::is`) follows `Object.is` semantics: primitives compare
//! by content, arrays/maps/objects by reference, `NaN` is the same as `NaN`
//! and `+0.0` differs from `-0.0`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::instance::Obj;

/// A dynamically typed runtime value
#[derive(Clone, Default)]
pub enum Value {
    /// Never set / no value
    #[default]
    Undefined,
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Immutable string
    Str(Rc<str>),
    /// Shared array (compared by reference)
    Array(Rc<Vec<Value>>),
    /// Shared string-keyed map (compared by reference)
    Map(Rc<BTreeMap<String, Value>>),
    /// Instance of a composed class (compared by reference)
    Object(Obj),
}

impl Value {
    /// Build a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Rc::from(s.as_ref()))
    }

    /// Build an array value
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(Rc::new(items.into_iter().collect()))
    }

    /// Build a map value
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Identity comparison (`Object.is`)
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a.to_bits() == b.to_bits()
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// True for `Undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Empty in the sense of a `required` property: undefined, null,
    /// empty string or empty array
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// False for undefined, null, `false`, zero, NaN and the empty string
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Integer view; floats are truncated
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    /// Numeric view
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Array view
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Map view
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries.as_ref()),
            _ => None,
        }
    }

    /// Object view
    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Short name of the variant, used in messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Undefined => 0,
            Value::Null => 1,
            Value::Bool(_) => 2,
            Value::Int(_) | Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::Array(_) => 5,
            Value::Map(_) => 6,
            Value::Object(_) => 7,
        }
    }

    /// Total order used by `Property::compare`: values of different kinds
    /// order by kind, numbers compare numerically, arrays lexicographically
    /// and objects through their declared properties.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (a, b) if a.rank() == 3 && b.rank() == 3 => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or_else(|| x.is_nan().cmp(&y.is_nan()))
            }
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(a), Value::Map(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(a), Value::Object(b)) => a.compare_to(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    /// Convert to JSON; `Undefined` becomes `null`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Object(obj) => obj.to_json(),
        }
    }

    /// Convert from JSON; integers that fit `i64` stay integers
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::str(s),
            serde_json::Value::Array(items) => Value::array(items.iter().map(Value::from_json)),
            serde_json::Value::Object(entries) => Value::map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v))),
            ),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality: arrays and maps compare element-wise, objects
    /// by identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            _ => self.is(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Array(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.iter()).finish(),
            Value::Object(obj) => write!(f, "Object({})", obj.class().name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Str(s) => f.write_str(s),
            Value::Object(obj) => write!(f, "{}", obj.class().name()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Rc::from(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(Rc::new(v))
    }
}

impl From<Obj> for Value {
    fn from(v: Obj) -> Self {
        Value::Object(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_semantics() {
        assert!(Value::Float(f64::NAN).is(&Value::Float(f64::NAN)));
        assert!(!Value::Float(0.0).is(&Value::Float(-0.0)));
        assert!(Value::str("a").is(&Value::str("a")));
        assert!(!Value::Int(1).is(&Value::Float(1.0)));

        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert!(!a.is(&b));
        assert!(a.is(&a.clone()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_truthy() {
        assert!(Value::Undefined.is_empty());
        assert!(Value::str("").is_empty());
        assert!(!Value::Int(0).is_empty());
        assert!(!Value::Int(0).truthy());
        assert!(Value::str("x").truthy());
    }

    #[test]
    fn test_compare_orders_numbers_across_variants() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Undefined.compare(&Value::Int(0)), Ordering::Less);
        assert_eq!(
            Value::array(vec![Value::Int(1), Value::Int(2)]).compare(&Value::array(vec![Value::Int(1)])),
            Ordering::Greater
        );
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null, true]});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
        assert_eq!(Value::Undefined.to_json(), serde_json::Value::Null);

        let parsed: Value = serde_json::from_str("42").unwrap();
        assert!(parsed.is(&Value::Int(42)));
    }
}
