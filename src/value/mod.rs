//! # Value Type System
//!
//! The closed set of values that flow through the query engine: JSON-style
//! primitives, lists and maps, object groupings and object lists from the
//! entity model, custom semantic values (timestamp, link, ref, money, ...),
//! parsed chains, and a distinguished absorbing null.
//!
//! `AbsorbingNull` is not regular null: any operator that reads it as context
//! or as an argument returns it unchanged, which lets a missing optional
//! field short-circuit an entire pipeline instead of raising.
//!
//! ## Usage
//!
//! ```rust
//! use quarry::value::Value;
//!
//! let parsed = Value::from_json(&serde_json::json!({"a": 1, "b": [true]}))?;
//! assert!(quarry::value::is_dict(&parsed));
//! # Ok::<(), quarry::entity::EntityError>(())
//! ```

pub mod custom;

pub use custom::CustomValue;

use std::collections::BTreeMap;
use std::fmt;

use crate::chain::Chain;
use crate::entity::{EntityError, Grouping, ObjectList};

/// A value in the query engine's unified data space.
#[derive(Debug, Clone)]
pub enum Value {
    /// Regular null (JSON `null`).
    Null,
    /// Distinguished null that short-circuits every operator reading it.
    AbsorbingNull,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// All raw objects sharing one id, merged across sources.
    Grouping(Grouping),
    /// A uniqueness-validated collection of groupings.
    Objects(ObjectList),
    /// A typed semantic value beyond the JSON primitives.
    Custom(CustomValue),
    /// A parsed-but-unevaluated operator pipeline.
    Chain(Chain),
}

impl Value {
    /// Human-readable type name used in operator error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::AbsorbingNull => "AbsorbingNone",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Grouping(_) => "ObjectGrouping",
            Value::Objects(_) => "ObjectList",
            Value::Custom(_) => "CustomValue",
            Value::Chain(_) => "Chain",
        }
    }

    /// Convert a JSON value into the engine's value domain.
    ///
    /// Maps carrying a `__sa_type__` tag are promoted to [`CustomValue`]
    /// variants; the promotion recurses through lists and maps.
    pub fn from_json(json: &serde_json::Value) -> Result<Value, EntityError> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(EntityError::InvalidValue(format!(
                        "number out of range: {n}"
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(items) => Ok(Value::List(
                items.iter().map(Value::from_json).collect::<Result<_, _>>()?,
            )),
            serde_json::Value::Object(map) => {
                if map.contains_key(custom::TAG_KEY) {
                    CustomValue::from_json_map(map).map(Value::Custom)
                } else {
                    let mut values = BTreeMap::new();
                    for (key, value) in map {
                        values.insert(key.clone(), Value::from_json(value)?);
                    }
                    Ok(Value::Map(values))
                }
            }
        }
    }

    /// Convert back to JSON. Custom values re-emit their tagged map form;
    /// groupings and object lists emit their members' raw objects; chains
    /// emit their canonical text.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::AbsorbingNull => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json_value).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
            Value::Custom(c) => c.to_json_value(),
            Value::Grouping(g) => serde_json::Value::Array(
                g.members().iter().map(|o| o.to_json_value()).collect(),
            ),
            Value::Objects(list) => serde_json::Value::Array(
                list.iter()
                    .flat_map(|g| g.members().iter().map(|o| o.to_json_value()))
                    .collect(),
            ),
            Value::Chain(chain) => serde_json::Value::String(chain.to_string()),
        }
    }

    /// Boolean coercion used by `and`, `or` and `any`. Both nulls are false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null | Value::AbsorbingNull => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Objects(list) => !list.is_empty(),
            Value::Grouping(_) | Value::Custom(_) | Value::Chain(_) => true,
        }
    }

    /// Literal form used when printing chains canonically: strings are
    /// double-quoted, everything else uses its display form.
    pub fn to_query_literal(&self) -> String {
        match self {
            Value::String(s) => format!("\"{s}\""),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    /// Structural equality with numeric promotion: `Int(1) == Float(1.0)`.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::AbsorbingNull, Value::AbsorbingNull) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Grouping(a), Value::Grouping(b)) => a == b,
            (Value::Objects(a), Value::Objects(b)) => a == b,
            (Value::Custom(a), Value::Custom(b)) => a == b,
            (Value::Chain(a), Value::Chain(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::AbsorbingNull => write!(f, "AbsorbingNone"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.to_query_literal())?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {}", value.to_query_literal())?;
                }
                write!(f, "}}")
            }
            Value::Grouping(g) => write!(f, "{g}"),
            Value::Objects(list) => write!(f, "{list}"),
            Value::Custom(c) => write!(f, "{}", c.to_text()),
            Value::Chain(chain) => write!(f, "{chain}"),
        }
    }
}

// ============================================================================
// Validators
// ============================================================================
//
// Named predicates referenced by the operator argument schemas. Composites
// exist where an operator accepts several shapes for one slot.

pub fn anything(_: &Value) -> bool {
    true
}

pub fn is_absorbing_null(value: &Value) -> bool {
    matches!(value, Value::AbsorbingNull)
}

pub fn is_bool(value: &Value) -> bool {
    matches!(value, Value::Bool(_))
}

pub fn is_int(value: &Value) -> bool {
    matches!(value, Value::Int(_))
}

pub fn is_string(value: &Value) -> bool {
    matches!(value, Value::String(_))
}

pub fn is_list(value: &Value) -> bool {
    matches!(value, Value::List(_))
}

pub fn is_dict(value: &Value) -> bool {
    matches!(value, Value::Map(_))
}

pub fn is_chain(value: &Value) -> bool {
    matches!(value, Value::Chain(_))
}

pub fn is_object_grouping(value: &Value) -> bool {
    matches!(value, Value::Grouping(_))
}

pub fn is_object_list(value: &Value) -> bool {
    matches!(value, Value::Objects(_))
}

pub fn is_single_object_list(value: &Value) -> bool {
    matches!(value, Value::Objects(list) if list.len() == 1)
}

/// A plain semantic value: everything except chains, groupings and lists of
/// objects. These are the values providers can contribute as properties.
pub fn is_valid_sa_type(value: &Value) -> bool {
    match value {
        Value::Chain(_) | Value::Grouping(_) | Value::Objects(_) => false,
        Value::List(items) => items.iter().all(is_valid_sa_type),
        Value::Map(map) => map.values().all(is_valid_sa_type),
        _ => true,
    }
}

/// A semantic value or an object list (anything an operator may return,
/// short of a grouping or an unevaluated chain).
pub fn is_valid_primitive(value: &Value) -> bool {
    is_valid_sa_type(value) || is_object_list(value)
}

/// A primitive or an unevaluated chain.
pub fn is_valid_querytype(value: &Value) -> bool {
    is_valid_primitive(value) || is_chain(value)
}

/// Context accepted by field operators: one object or a plain map.
pub fn is_field_context(value: &Value) -> bool {
    is_single_object_list(value) || is_object_grouping(value) || is_dict(value)
}

/// Context accepted by `count` and `slice`.
pub fn is_countable(value: &Value) -> bool {
    is_object_list(value) || is_list(value)
}

/// Context accepted by `filter` and `map`.
pub fn is_iterable(value: &Value) -> bool {
    is_object_list(value) || is_list(value)
}

/// Context accepted by `select`.
pub fn is_selectable(value: &Value) -> bool {
    is_object_grouping(value) || is_object_list(value) || is_dict(value)
}

/// Context accepted by `includes`.
pub fn is_list_or_string(value: &Value) -> bool {
    is_list(value) || is_string(value)
}

/// Context accepted by `filter_by_source`.
pub fn is_objects_or_grouping(value: &Value) -> bool {
    is_object_list(value) || is_object_grouping(value)
}

/// Context accepted by `to_json`: anything already evaluated.
pub fn is_json_convertible(value: &Value) -> bool {
    !is_chain(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_roundtrip_for_primitives() {
        let json = json!({"a": 1, "b": [true, "x"], "c": {"d": null}});
        let value = Value::from_json(&json).expect("valid json");
        assert_eq!(value.to_json_value(), json);
    }

    #[test]
    fn tagged_maps_promote_to_custom_values() {
        let json = json!({"__sa_type__": "email", "email": "a@b.co"});
        let value = Value::from_json(&json).expect("valid custom");
        assert!(matches!(value, Value::Custom(CustomValue::Email { .. })));
        assert_eq!(value.to_json_value(), json);
    }

    #[test]
    fn numeric_promotion_in_equality() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Float(3.5));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn absorbing_null_is_not_regular_null() {
        assert_ne!(Value::Null, Value::AbsorbingNull);
        assert_eq!(Value::AbsorbingNull.to_string(), "AbsorbingNone");
        assert!(!Value::AbsorbingNull.truthy());
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(2).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::String(String::new()).truthy());
        assert!(Value::List(vec![Value::Null]).truthy());
        assert!(!Value::List(vec![]).truthy());
    }

    #[test]
    fn sa_type_excludes_object_containers() {
        assert!(is_valid_sa_type(&Value::Int(1)));
        assert!(is_valid_sa_type(&Value::List(vec![Value::String("x".into())])));
        assert!(!is_valid_sa_type(&Value::Objects(
            crate::entity::ObjectList::new(vec![])
        )));
        assert!(is_valid_primitive(&Value::Objects(
            crate::entity::ObjectList::new(vec![])
        )));
    }
}
