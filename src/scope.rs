//! # Scope Tracker
//!
//! A [`Scope`] is an abstract demand on one provider: "objects of type T,
//! restricted to these fields, optionally pre-filtered by these conditions,
//! optionally limited to these (id, type) pairs". [`Scopes`] is a set of
//! them with the four narrowing operations operators apply as a query runs,
//! so that after evaluation the set describes exactly the typed slices the
//! query still needs.
//!
//! Scopes are pure values: every "mutator" returns a new set. Equality and
//! hashing cover all fields and are insensitive to the ordering of
//! conditions and id_types, which lets the driver diff needed scopes against
//! downloaded scopes across iterations.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::chain::Chain;
use crate::value::Value;

/// Field restriction of a scope: everything, or a named subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSet {
    All,
    Named(Vec<String>),
}

impl FieldSet {
    pub fn contains(&self, field: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Named(fields) => fields.iter().any(|f| f == field),
        }
    }

    fn sorted(&self) -> Vec<&str> {
        match self {
            FieldSet::All => vec!["*"],
            FieldSet::Named(fields) => {
                let mut sorted: Vec<&str> = fields.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                sorted
            }
        }
    }
}

impl Serialize for FieldSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldSet::All => serializer.serialize_str("*"),
            FieldSet::Named(fields) => fields.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Star(String),
            Named(Vec<String>),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Star(s) if s == "*" => Ok(FieldSet::All),
            Raw::Star(s) => Err(serde::de::Error::custom(format!(
                "fields must be \"*\" or a list of names, got \"{s}\""
            ))),
            Raw::Named(fields) => Ok(FieldSet::Named(fields)),
        }
    }
}

/// A provider-side pre-filter: `field op value` with literal `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: String,
    pub value: Value,
}

impl Condition {
    pub fn equals(field: impl Into<String>, value: Value) -> Condition {
        Condition {
            field: field.into(),
            op: "==".to_string(),
            value,
        }
    }

    /// Stable rendering used for display and for scope equality/hashing.
    fn render(&self) -> String {
        format!("[.{} {} '{}']", self.field, self.op, self.value.to_json_value())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// A typed, field-restricted, optionally conditioned demand for data from
/// one provider.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Name of the provider that advertised this scope.
    pub provider: String,
    pub type_name: String,
    pub fields: FieldSet,
    /// Fields the provider can evaluate conditions over.
    pub filtering_fields: Vec<String>,
    /// Whether the provider wants to know which (id, type) pairs the query
    /// already holds before it answers.
    pub needs_id_types: bool,
    pub conditions: Vec<Condition>,
    pub id_types: BTreeSet<(String, String)>,
}

impl Scope {
    /// Copy with conditions and id_types dropped; what a query starts from.
    pub fn copy_fresh(&self) -> Scope {
        let mut fresh = self.clone();
        fresh.conditions = Vec::new();
        fresh.id_types = BTreeSet::new();
        fresh
    }

    /// Canonical form backing equality and hashing: ordering of conditions
    /// and id_types must not matter.
    fn canonical_key(&self) -> String {
        let mut conditions: Vec<String> = self.conditions.iter().map(Condition::render).collect();
        conditions.sort_unstable();
        let mut filtering: Vec<&str> = self.filtering_fields.iter().map(String::as_str).collect();
        filtering.sort_unstable();
        let id_types: Vec<String> = self
            .id_types
            .iter()
            .map(|(id, t)| format!("{id}\u{1}{t}"))
            .collect();
        format!(
            "{}\u{2}{}\u{2}{:?}\u{2}{:?}\u{2}{}\u{2}{:?}\u{2}{:?}",
            self.provider,
            self.type_name,
            self.fields.sorted(),
            filtering,
            self.needs_id_types,
            conditions,
            id_types,
        )
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Scope) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for Scope {}

impl Hash for Scope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.type_name, self.provider)?;
        for condition in &self.conditions {
            write!(f, "{condition}")?;
        }
        if let FieldSet::Named(fields) = &self.fields {
            write!(f, "[{}]", fields.join(", "))?;
        }
        if !self.id_types.is_empty() {
            write!(f, " ({} id types)", self.id_types.len())?;
        }
        Ok(())
    }
}

/// The set of scopes a running query still needs.
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    scopes: HashSet<Scope>,
}

impl Scopes {
    pub fn empty() -> Scopes {
        Scopes {
            scopes: HashSet::new(),
        }
    }

    /// A fresh set from provider-advertised scope templates: conditions and
    /// id_types dropped.
    pub fn fresh(templates: &[Scope]) -> Scopes {
        Scopes {
            scopes: templates.iter().map(Scope::copy_fresh).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn contains(&self, scope: &Scope) -> bool {
        self.scopes.contains(scope)
    }

    /// For every scope that wants id_types, replace its id_types with the
    /// subset of `id_types` matching the scope's type. Other scopes pass
    /// through unchanged.
    pub fn set_id_types(&self, id_types: &BTreeSet<(String, String)>) -> Scopes {
        let scopes = self
            .scopes
            .iter()
            .map(|scope| {
                let mut updated = scope.clone();
                if updated.needs_id_types {
                    updated.id_types = id_types
                        .iter()
                        .filter(|(_, t)| *t == updated.type_name)
                        .cloned()
                        .collect();
                }
                updated
            })
            .collect();
        Scopes { scopes }
    }

    /// Keep only scopes of the given type.
    pub fn filter_type(&self, type_name: &str) -> Scopes {
        let scopes = self
            .scopes
            .iter()
            .filter(|s| s.type_name == type_name)
            .cloned()
            .collect();
        Scopes { scopes }
    }

    /// Intersect every scope's fields with `fields`; scopes left with no
    /// fields drop out. `"*"` scopes pass through untouched.
    pub fn filter_fields(&self, fields: &[String]) -> Scopes {
        let mut scopes = HashSet::new();
        for scope in &self.scopes {
            match &scope.fields {
                FieldSet::All => {
                    scopes.insert(scope.clone());
                }
                FieldSet::Named(own) => {
                    let intersection: Vec<String> = own
                        .iter()
                        .filter(|f| fields.contains(f))
                        .cloned()
                        .collect();
                    if !intersection.is_empty() {
                        let mut narrowed = scope.clone();
                        narrowed.fields = FieldSet::Named(intersection);
                        scopes.insert(narrowed);
                    }
                }
            }
        }
        Scopes { scopes }
    }

    /// Append a condition to every scope.
    pub fn add_condition(&self, condition: &Condition) -> Scopes {
        let scopes = self
            .scopes
            .iter()
            .map(|scope| {
                let mut updated = scope.clone();
                updated.conditions.push(condition.clone());
                updated
            })
            .collect();
        Scopes { scopes }
    }

    pub fn union(&self, other: &Scopes) -> Scopes {
        let mut scopes = self.scopes.clone();
        scopes.extend(other.scopes.iter().cloned());
        Scopes { scopes }
    }

    /// Scopes in this set not yet present in `downloaded`.
    pub fn missing_from(&self, downloaded: &HashSet<Scope>) -> HashSet<Scope> {
        self.scopes.difference(downloaded).cloned().collect()
    }
}

impl fmt::Display for Scopes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scopes.is_empty() {
            return write!(f, "Scopes([])");
        }
        let mut lines: Vec<String> = self.scopes.iter().map(Scope::to_string).collect();
        lines.sort_unstable();
        write!(f, "Scopes(\n    {}\n)", lines.join(",\n    "))
    }
}

/// Recognize the one condition shape providers can pre-filter on:
/// `equals(get_field(field), literal)`. Anything else is not extractable.
pub fn chain_to_condition(chain: &Chain) -> Option<Condition> {
    if chain.nodes.len() != 1 {
        return None;
    }
    let equals_node = &chain.nodes[0];
    if equals_node.operator.name != "equals" || equals_node.arguments.len() != 2 {
        return None;
    }
    let Value::Chain(field_chain) = &equals_node.arguments[0] else {
        return None;
    };
    if field_chain.nodes.len() != 1 {
        return None;
    }
    let get_field_node = &field_chain.nodes[0];
    if get_field_node.operator.name != "get_field" || get_field_node.arguments.is_empty() {
        return None;
    }
    let Value::String(field) = &get_field_node.arguments[0] else {
        return None;
    };
    let value = &equals_node.arguments[1];
    if matches!(value, Value::Chain(_)) {
        return None;
    }
    Some(Condition::equals(field.clone(), value.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(type_name: &str, fields: FieldSet) -> Scope {
        Scope {
            provider: "p1".to_string(),
            type_name: type_name.to_string(),
            fields,
            filtering_fields: vec![],
            needs_id_types: false,
            conditions: vec![],
            id_types: BTreeSet::new(),
        }
    }

    fn named(fields: &[&str]) -> FieldSet {
        FieldSet::Named(fields.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn equality_ignores_condition_and_id_type_order() {
        let mut a = scope("employee", named(&["id", "name"]));
        let mut b = a.clone();
        a.conditions = vec![
            Condition::equals("x", Value::Int(1)),
            Condition::equals("y", Value::Int(2)),
        ];
        b.conditions = vec![
            Condition::equals("y", Value::Int(2)),
            Condition::equals("x", Value::Int(1)),
        ];
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn fields_order_does_not_matter() {
        let a = scope("t", named(&["a", "b"]));
        let b = scope("t", named(&["b", "a"]));
        assert_eq!(a, b);
    }

    #[test]
    fn copy_fresh_drops_conditions_and_id_types() {
        let mut s = scope("t", FieldSet::All);
        s.conditions.push(Condition::equals("f", Value::Int(1)));
        s.id_types.insert(("a".into(), "t".into()));
        let fresh = s.copy_fresh();
        assert!(fresh.conditions.is_empty());
        assert!(fresh.id_types.is_empty());
        assert_ne!(s, fresh);
    }

    #[test]
    fn filter_type_keeps_only_matching() {
        let scopes = Scopes::fresh(&[scope("employee", FieldSet::All), scope("customer", FieldSet::All)]);
        let narrowed = scopes.filter_type("employee");
        assert_eq!(narrowed.len(), 1);
        assert!(narrowed.iter().all(|s| s.type_name == "employee"));
    }

    #[test]
    fn filter_fields_intersects_and_drops_empty() {
        let scopes = Scopes::fresh(&[
            scope("a", named(&["x", "y"])),
            scope("b", named(&["z"])),
            scope("c", FieldSet::All),
        ]);
        let narrowed = scopes.filter_fields(&["x".to_string()]);
        assert_eq!(narrowed.len(), 2);
        for s in narrowed.iter() {
            match s.type_name.as_str() {
                "a" => assert_eq!(s.fields, named(&["x"])),
                "c" => assert_eq!(s.fields, FieldSet::All),
                other => panic!("scope {other} should have been dropped"),
            }
        }
    }

    #[test]
    fn set_id_types_only_touches_scopes_that_want_them() {
        let mut wants = scope("employee", FieldSet::All);
        wants.needs_id_types = true;
        let scopes = Scopes::fresh(&[wants, scope("customer", FieldSet::All)]);

        let mut ids = BTreeSet::new();
        ids.insert(("e1".to_string(), "employee".to_string()));
        ids.insert(("c1".to_string(), "customer".to_string()));

        let updated = scopes.set_id_types(&ids);
        for s in updated.iter() {
            if s.type_name == "employee" {
                assert_eq!(s.id_types.len(), 1);
                assert!(s.id_types.contains(&("e1".to_string(), "employee".to_string())));
            } else {
                assert!(s.id_types.is_empty());
            }
        }
    }

    #[test]
    fn add_condition_reaches_every_scope() {
        let scopes = Scopes::fresh(&[scope("a", FieldSet::All), scope("b", FieldSet::All)]);
        let cond = Condition::equals("dept", Value::String("sales".into()));
        let updated = scopes.add_condition(&cond);
        assert!(updated.iter().all(|s| s.conditions == vec![cond.clone()]));
    }

    #[test]
    fn fieldset_serde_forms() {
        let all: FieldSet = serde_json::from_str("\"*\"").expect("star form");
        assert_eq!(all, FieldSet::All);
        let named_set: FieldSet = serde_json::from_str("[\"a\",\"b\"]").expect("list form");
        assert_eq!(named_set, named(&["a", "b"]));
        assert_eq!(serde_json::to_string(&FieldSet::All).expect("serialize"), "\"*\"");
        assert!(serde_json::from_str::<FieldSet>("\"x\"").is_err());
    }
}
