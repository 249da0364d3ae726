//! # Entity Model
//!
//! Raw objects as providers contribute them, groupings that bundle every
//! contribution sharing an id, and uniqueness-validated object lists.
//!
//! A raw object is a JSON map with three reserved keys (`__id__`,
//! `__types__`, `__source__`); everything else becomes a property. The same
//! logical id may arrive from several providers; [`Grouping`] merges those
//! contributions on read and reports conflicts instead of silently picking a
//! winner.

mod grouping;
mod list;

pub use grouping::{group_objects, regroup_objects, ungroup_objects, Grouping};
pub use list::ObjectList;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use thiserror::Error;

use crate::error::QueryError;
use crate::state::QueryState;
use crate::value::Value;

/// Reserved key carrying the object id.
pub const ID_KEY: &str = "__id__";
/// Reserved key carrying the object's type list.
pub const TYPES_KEY: &str = "__types__";
/// Reserved key carrying the contributing source.
pub const SOURCE_KEY: &str = "__source__";

/// Errors raised while ingesting objects or assembling groupings.
#[derive(Debug, Clone, Error)]
pub enum EntityError {
    #[error("object is missing required key {0}")]
    MissingKey(&'static str),

    #[error("object key {key} has the wrong shape: {reason}")]
    InvalidKey { key: &'static str, reason: String },

    #[error("invalid property value: {0}")]
    InvalidValue(String),

    #[error("unknown custom value tag: {0}")]
    UnknownCustomTag(String),

    #[error("invalid {tag} value: {reason}")]
    InvalidCustomValue { tag: &'static str, reason: String },

    #[error("grouping mixes ids: {0}")]
    MixedIds(String),

    #[error("grouping has multiple objects from source {0}")]
    DuplicateSource(String),

    #[error("grouping must contain at least one object")]
    EmptyGrouping,

    #[error("duplicate objects in list: {0}")]
    DuplicateObjects(String),
}

/// One provider's contribution for one object: an id, one or more types, the
/// contributing source and a bag of properties.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObject {
    id: String,
    types: Vec<String>,
    source: String,
    properties: BTreeMap<String, Value>,
}

impl RawObject {
    /// Ingest one wire object (§ object JSON format). Reserved keys are
    /// promoted to typed fields; property values are normalized recursively,
    /// promoting `__sa_type__` maps to custom values.
    pub fn from_json(json: &serde_json::Value) -> Result<RawObject, EntityError> {
        let map = json.as_object().ok_or_else(|| EntityError::InvalidValue(
            format!("object must be a JSON map, got: {json}"),
        ))?;

        let id = map
            .get(ID_KEY)
            .ok_or(EntityError::MissingKey(ID_KEY))?
            .as_str()
            .ok_or_else(|| EntityError::InvalidKey {
                key: ID_KEY,
                reason: "must be a string".to_string(),
            })?
            .to_string();

        let types_json = map
            .get(TYPES_KEY)
            .ok_or(EntityError::MissingKey(TYPES_KEY))?
            .as_array()
            .ok_or_else(|| EntityError::InvalidKey {
                key: TYPES_KEY,
                reason: "must be a list of strings".to_string(),
            })?;
        let types = types_json
            .iter()
            .map(|t| {
                t.as_str().map(str::to_string).ok_or_else(|| EntityError::InvalidKey {
                    key: TYPES_KEY,
                    reason: "must be a list of strings".to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if types.is_empty() {
            return Err(EntityError::InvalidKey {
                key: TYPES_KEY,
                reason: "must not be empty".to_string(),
            });
        }

        let source = map
            .get(SOURCE_KEY)
            .ok_or(EntityError::MissingKey(SOURCE_KEY))?
            .as_str()
            .ok_or_else(|| EntityError::InvalidKey {
                key: SOURCE_KEY,
                reason: "must be a string".to_string(),
            })?
            .to_string();

        let mut properties = BTreeMap::new();
        for (key, value) in map {
            if key == ID_KEY || key == TYPES_KEY || key == SOURCE_KEY {
                continue;
            }
            properties.insert(key.clone(), Value::from_json(value)?);
        }

        Ok(RawObject {
            id,
            types,
            source,
            properties,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn types(&self) -> &[String] {
        &self.types
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// `(id, type)` pairs claimed by this object.
    pub fn id_types(&self) -> BTreeSet<(String, String)> {
        self.types
            .iter()
            .map(|t| (self.id.clone(), t.clone()))
            .collect()
    }

    /// `(id, type, source)` triples claimed by this object. These are the
    /// units the uniqueness invariant is stated over.
    pub fn unique_ids(&self) -> BTreeSet<(String, String, String)> {
        self.types
            .iter()
            .map(|t| (self.id.clone(), t.clone(), self.source.clone()))
            .collect()
    }

    /// Whether the object answers for `field`, including the reserved keys.
    pub fn has_field(&self, field: &str) -> bool {
        field == ID_KEY
            || field == TYPES_KEY
            || field == SOURCE_KEY
            || self.properties.contains_key(field)
    }

    /// Read a field, resolving custom values against the query state.
    /// Reserved keys answer with their typed contents.
    pub fn get_field(&self, field: &str, state: &mut QueryState) -> Result<Value, QueryError> {
        match field {
            ID_KEY => return Ok(Value::String(self.id.clone())),
            TYPES_KEY => {
                return Ok(Value::List(
                    self.types.iter().cloned().map(Value::String).collect(),
                ))
            }
            SOURCE_KEY => return Ok(Value::String(self.source.clone())),
            _ => {}
        }
        let value = self.properties.get(field).ok_or_else(|| {
            QueryError::field(format!("Field '{field}' not found in object {}", self.id))
        })?;
        match value {
            Value::Custom(custom) => custom.resolve(state),
            other => Ok(other.clone()),
        }
    }

    /// The full map form (reserved keys plus properties), custom values kept.
    pub fn as_map(&self) -> BTreeMap<String, Value> {
        let mut map = self.properties.clone();
        map.insert(ID_KEY.to_string(), Value::String(self.id.clone()));
        map.insert(
            TYPES_KEY.to_string(),
            Value::List(self.types.iter().cloned().map(Value::String).collect()),
        );
        map.insert(SOURCE_KEY.to_string(), Value::String(self.source.clone()));
        map
    }

    /// The wire JSON form, custom values re-tagged.
    pub fn to_json_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(ID_KEY.to_string(), self.id.clone().into());
        map.insert(TYPES_KEY.to_string(), self.types.clone().into());
        map.insert(SOURCE_KEY.to_string(), self.source.clone().into());
        for (key, value) in &self.properties {
            map.insert(key.clone(), value.to_json_value());
        }
        serde_json::Value::Object(map)
    }
}

/// Parse a batch of wire objects, skipping invalid ones with a warning.
/// Providers are federated peers; one malformed object must not poison the
/// whole feed.
pub fn parse_objects(objects: &[serde_json::Value], origin: &str) -> Vec<Arc<RawObject>> {
    let mut parsed = Vec::with_capacity(objects.len());
    for json in objects {
        match RawObject::from_json(json) {
            Ok(object) => parsed.push(Arc::new(object)),
            Err(error) => {
                tracing::warn!(origin, %error, "skipping invalid object");
            }
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn employee() -> serde_json::Value {
        json!({
            "__id__": "e1",
            "__types__": ["employee", "person"],
            "__source__": "hr",
            "name": "Alice",
            "level": 4
        })
    }

    #[test]
    fn ingests_reserved_keys_and_properties() {
        let obj = RawObject::from_json(&employee()).expect("valid object");
        assert_eq!(obj.id(), "e1");
        assert_eq!(obj.types(), ["employee", "person"]);
        assert_eq!(obj.source(), "hr");
        assert_eq!(obj.properties().len(), 2);
        assert!(obj.has_field("name"));
        assert!(obj.has_field("__id__"));
        assert!(!obj.has_field("missing"));
    }

    #[test]
    fn rejects_missing_or_malformed_reserved_keys() {
        let missing = json!({"__types__": ["a"], "__source__": "s"});
        assert!(matches!(
            RawObject::from_json(&missing),
            Err(EntityError::MissingKey(ID_KEY))
        ));

        let empty_types = json!({"__id__": "x", "__types__": [], "__source__": "s"});
        assert!(RawObject::from_json(&empty_types).is_err());

        let bad_types = json!({"__id__": "x", "__types__": ["a", 3], "__source__": "s"});
        assert!(RawObject::from_json(&bad_types).is_err());
    }

    #[test]
    fn unique_ids_cover_the_type_cross_product() {
        let obj = RawObject::from_json(&employee()).expect("valid object");
        let uids = obj.unique_ids();
        assert_eq!(uids.len(), 2);
        assert!(uids.contains(&("e1".into(), "employee".into(), "hr".into())));
        assert!(uids.contains(&("e1".into(), "person".into(), "hr".into())));
    }

    #[test]
    fn json_roundtrip_preserves_custom_values() {
        let json = json!({
            "__id__": "e2",
            "__types__": ["employee"],
            "__source__": "hr",
            "mail": {"__sa_type__": "email", "email": "a@b.co"}
        });
        let obj = RawObject::from_json(&json).expect("valid object");
        assert_eq!(obj.to_json_value(), json);
    }

    #[test]
    fn parse_objects_skips_invalid_entries() {
        let batch = vec![employee(), json!({"nope": true})];
        let parsed = parse_objects(&batch, "test");
        assert_eq!(parsed.len(), 1);
    }
}
