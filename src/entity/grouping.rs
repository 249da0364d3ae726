//! Object groupings: every provider contribution for one id, merged on read.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::entity::{EntityError, RawObject};
use crate::error::QueryError;
use crate::state::QueryState;
use crate::value::Value;

/// A bundle of raw objects sharing one id, at most one per source.
///
/// The derived sets (`types`, `id_types`, `unique_ids`, `sources`) are
/// computed once at construction and never mutated. The two overlay maps
/// (`field_overrides`, `selected_fields`) are the only mutable-by-operator
/// state, and operators clone the grouping before touching them.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    members: Vec<Arc<RawObject>>,
    field_overrides: BTreeMap<String, Value>,
    selected_fields: Option<BTreeSet<String>>,
    types: BTreeSet<String>,
    id_types: BTreeSet<(String, String)>,
    unique_ids: BTreeSet<(String, String, String)>,
    sources: BTreeSet<String>,
}

impl Grouping {
    /// Build a grouping, validating the same-id and distinct-source
    /// invariants and computing the derived sets.
    pub fn new(members: Vec<Arc<RawObject>>) -> Result<Grouping, EntityError> {
        Grouping::with_overlays(members, BTreeMap::new(), None)
    }

    fn with_overlays(
        members: Vec<Arc<RawObject>>,
        field_overrides: BTreeMap<String, Value>,
        selected_fields: Option<BTreeSet<String>>,
    ) -> Result<Grouping, EntityError> {
        if members.is_empty() {
            return Err(EntityError::EmptyGrouping);
        }
        let ids: BTreeSet<&str> = members.iter().map(|o| o.id()).collect();
        if ids.len() > 1 {
            let ids: Vec<&str> = ids.into_iter().collect();
            return Err(EntityError::MixedIds(ids.join(", ")));
        }
        let mut sources = BTreeSet::new();
        for member in &members {
            if !sources.insert(member.source().to_string()) {
                return Err(EntityError::DuplicateSource(member.source().to_string()));
            }
        }

        let types = members
            .iter()
            .flat_map(|o| o.types().iter().cloned())
            .collect();
        let id_types = members.iter().flat_map(|o| o.id_types()).collect();
        let unique_ids = members.iter().flat_map(|o| o.unique_ids()).collect();

        Ok(Grouping {
            members,
            field_overrides,
            selected_fields,
            types,
            id_types,
            unique_ids,
            sources,
        })
    }

    pub fn id(&self) -> &str {
        self.members[0].id()
    }

    pub fn members(&self) -> &[Arc<RawObject>] {
        &self.members
    }

    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn id_types(&self) -> &BTreeSet<(String, String)> {
        &self.id_types
    }

    pub fn unique_ids(&self) -> &BTreeSet<(String, String, String)> {
        &self.unique_ids
    }

    pub fn sources(&self) -> &BTreeSet<String> {
        &self.sources
    }

    pub fn has_id_type(&self, id_type: &(String, String)) -> bool {
        self.id_types.contains(id_type)
    }

    /// Group header used in rendering: `#id (type1,type2 @src1@src2)`.
    pub fn name(&self) -> String {
        let types: Vec<&str> = self.types.iter().map(String::as_str).collect();
        let sources: Vec<&str> = self.sources.iter().map(String::as_str).collect();
        format!("#{} ({} @{})", self.id(), types.join(","), sources.join("@"))
    }

    /// Drop both overlays. Done once per query so leftover selections from a
    /// previous query never leak into the next.
    pub fn reset_overlays(&mut self) {
        if !self.field_overrides.is_empty() || self.selected_fields.is_some() {
            self.field_overrides = BTreeMap::new();
            self.selected_fields = None;
        }
    }

    pub fn has_overlays(&self) -> bool {
        !self.field_overrides.is_empty() || self.selected_fields.is_some()
    }

    /// Keep only members from the wanted sources; `None` when none match.
    pub fn select_sources(&self, sources: &BTreeSet<String>) -> Option<Grouping> {
        let members: Vec<Arc<RawObject>> = self
            .members
            .iter()
            .filter(|o| sources.contains(o.source()))
            .cloned()
            .collect();
        if members.is_empty() {
            return None;
        }
        // A subset of a valid grouping stays valid.
        Grouping::with_overlays(
            members,
            self.field_overrides.clone(),
            self.selected_fields.clone(),
        )
        .ok()
    }

    /// Property names visible through the selection overlay.
    pub fn fields(&self) -> BTreeSet<String> {
        let mut all: BTreeSet<String> = self
            .members
            .iter()
            .flat_map(|o| o.properties().keys().cloned())
            .collect();
        if let Some(selected) = &self.selected_fields {
            all = all.intersection(selected).cloned().collect();
        }
        all
    }

    /// Clone with the selection overlay widened by `fields`.
    pub fn select_fields(&self, fields: BTreeSet<String>) -> Grouping {
        let selected = match &self.selected_fields {
            Some(existing) => existing.union(&fields).cloned().collect(),
            None => fields,
        };
        let mut clone = self.clone();
        clone.selected_fields = Some(selected);
        clone
    }

    /// Clone with one field pinned to a value, shadowing every source.
    pub fn override_field(&self, field: impl Into<String>, value: Value) -> Grouping {
        let mut clone = self.clone();
        clone.field_overrides.insert(field.into(), value);
        clone
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.field_overrides.contains_key(field)
            || self.members.iter().any(|o| o.has_field(field))
    }

    /// Read a field through the merge rule.
    ///
    /// Collect the field from every member that has it. A list or map can
    /// only come from a single contributor; scalars deduplicate, and more
    /// than one surviving distinct value is a conflict the caller must
    /// resolve by picking a source.
    pub fn get_field(&self, field: &str, state: &mut QueryState) -> Result<Value, QueryError> {
        if let Some(value) = self.field_overrides.get(field) {
            return Ok(value.clone());
        }

        let mut values = Vec::new();
        for member in &self.members {
            if member.has_field(field) {
                values.push(member.get_field(field, state)?);
            }
        }
        if values.is_empty() {
            return Err(QueryError::field(format!(
                "Object {self} has no field \"{field}\""
            )));
        }

        let any_container = values
            .iter()
            .any(|v| matches!(v, Value::List(_) | Value::Map(_)));
        if any_container {
            if values.len() > 1 {
                return Err(QueryError::merge(format!(
                    "Field \"{field}\" of {self} has multiple definitions of list or dict \
                     from different sources. These can't be reconciled, please pick a source."
                )));
            }
            return Ok(values.into_iter().next().unwrap_or(Value::Null));
        }

        let mut distinct: Vec<Value> = Vec::new();
        for value in values {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }
        if distinct.len() > 1 {
            return Err(QueryError::merge(format!(
                "Field \"{field}\" of {self} has multiple conflicting definitions \
                 from different sources. Please pick a source."
            )));
        }
        Ok(distinct.into_iter().next().unwrap_or(Value::Null))
    }

    /// Every member's value for the field, in member order, skipping the
    /// merge rule entirely.
    pub fn get_all_field_values(
        &self,
        field: &str,
        state: &mut QueryState,
    ) -> Result<Vec<Value>, QueryError> {
        if let Some(value) = self.field_overrides.get(field) {
            return Ok(vec![value.clone()]);
        }
        let mut values = Vec::new();
        for member in &self.members {
            if member.has_field(field) {
                values.push(member.get_field(field, state)?);
            }
        }
        Ok(values)
    }

    /// The merged read view as a map: id, union of types, sources, and every
    /// visible field read through the merge rule (conflicts propagate).
    pub fn merged_view(&self, state: &mut QueryState) -> Result<BTreeMap<String, Value>, QueryError> {
        if self.members.len() == 1 && !self.has_overlays() {
            return Ok(self.members[0].as_map());
        }
        let mut map = BTreeMap::new();
        map.insert(
            crate::entity::ID_KEY.to_string(),
            Value::String(self.id().to_string()),
        );
        map.insert(
            crate::entity::TYPES_KEY.to_string(),
            Value::List(self.types.iter().cloned().map(Value::String).collect()),
        );
        map.insert(
            "__sources__".to_string(),
            Value::List(self.sources.iter().cloned().map(Value::String).collect()),
        );
        for field in self.fields() {
            let value = self.get_field(&field, state)?;
            map.insert(field, value);
        }
        Ok(map)
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<&str> = self.types.iter().map(String::as_str).collect();
        let sources: Vec<&str> = self.sources.iter().map(String::as_str).collect();
        write!(f, "Obj({}#{}@{})", types.join(","), self.id(), sources.join("@"))
    }
}

/// Bundle raw objects into groupings by id, preserving first-seen order.
pub fn group_objects(objects: Vec<Arc<RawObject>>) -> Result<Vec<Grouping>, EntityError> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: BTreeMap<String, Vec<Arc<RawObject>>> = BTreeMap::new();
    for object in objects {
        let id = object.id().to_string();
        if !by_id.contains_key(&id) {
            order.push(id.clone());
        }
        by_id.entry(id).or_default().push(object);
    }
    order
        .into_iter()
        .map(|id| {
            let members = by_id.remove(&id).unwrap_or_default();
            Grouping::new(members)
        })
        .collect()
}

/// Flatten groupings back to their raw members, preserving order.
pub fn ungroup_objects(groupings: &[Grouping]) -> Vec<Arc<RawObject>> {
    groupings
        .iter()
        .flat_map(|g| g.members.iter().cloned())
        .collect()
}

/// Re-bundle groupings after a merge may have brought the same id in from
/// two collections.
pub fn regroup_objects(groupings: &[Grouping]) -> Result<Vec<Grouping>, EntityError> {
    group_objects(ungroup_objects(groupings))
}
